//! Sum-of-pairs scoring of a finished alignment

use super::error::{MsaError, Result};
use super::substitution::SubstitutionModel;

/// Sum of `score(x, y)` over every unordered pair of rows and every column,
/// gap against gap included.
pub fn sum_of_pairs<S: AsRef<[u8]>>(rows: &[S], model: &SubstitutionModel) -> Result<i64> {
    let width = rows.first().map_or(0, |r| r.as_ref().len());
    if let Some(bad) = rows.iter().position(|r| r.as_ref().len() != width) {
        return Err(MsaError::DegenerateInput(format!(
            "aligned row {} has length {}, expected {}",
            bad,
            rows[bad].as_ref().len(),
            width
        )));
    }

    let mut total = 0i64;
    for (i, a) in rows.iter().enumerate() {
        for b in &rows[i + 1..] {
            total += pair_score(a.as_ref(), b.as_ref(), model)?;
        }
    }
    Ok(total)
}

fn pair_score(a: &[u8], b: &[u8], model: &SubstitutionModel) -> Result<i64> {
    a.iter()
        .zip(b)
        .map(|(&x, &y)| model.score(x, y).map(i64::from))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::msa::substitution::Objective;

    #[test]
    fn test_two_rows_equal_pairwise_score() {
        let model = SubstitutionModel::uniform(b"ABCD", 0, 3, 1, Objective::Minimize).unwrap();
        assert_eq!(sum_of_pairs(&["AB-DC", "ABCD-"], &model).unwrap(), 2);
    }

    #[test]
    fn test_gap_gap_columns_are_scored() {
        let model = SubstitutionModel::uniform(b"AC", 1, -1, -2, Objective::Maximize).unwrap();
        // gap/gap scores as a match: (0,1) = 1 + 1 + 1, (0,2) = (1,2) = 1 - 2 - 1
        let rows = ["A-C", "A-C", "AAA"];
        assert_eq!(sum_of_pairs(&rows, &model).unwrap(), 3 - 2 - 2);

        let blosum = SubstitutionModel::blosum62();
        let gap_gap = blosum.score(b'-', b'-').unwrap();
        assert_eq!(sum_of_pairs(&["A-", "A-"], &blosum).unwrap(), 4 + i64::from(gap_gap));
    }

    #[test]
    fn test_blosum_three_rows() {
        let model = SubstitutionModel::blosum62();
        // W/W 11, W/A -3 twice, gap against K -4 twice, gap/gap 1
        let rows = ["WK", "W-", "A-"];
        let expected = (11 - 4) + (-3 - 4) + (-3 + 1);
        assert_eq!(sum_of_pairs(&rows, &model).unwrap(), expected);
    }

    #[test]
    fn test_ragged_rows_rejected() {
        let model = SubstitutionModel::blosum62();
        assert!(sum_of_pairs(&["MK", "M"], &model).is_err());
    }

    #[test]
    fn test_unknown_symbol_is_lookup_error() {
        let model = SubstitutionModel::uniform(b"AC", 1, -1, -2, Objective::Maximize).unwrap();
        let err = sum_of_pairs(&["AG", "AC"], &model);
        assert!(matches!(err, Err(MsaError::ScoreLookup { .. })));
    }

    #[test]
    fn test_empty_and_single() {
        let model = SubstitutionModel::blosum62();
        let none: [&str; 0] = [];
        assert_eq!(sum_of_pairs(&none, &model).unwrap(), 0);
        assert_eq!(sum_of_pairs(&["MKV"], &model).unwrap(), 0);
    }
}
