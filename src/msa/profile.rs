//! Profiles of aligned groups and profile-profile alignment
//!
//! A [`Profile`] is the column-wise symbol distribution of an already aligned
//! group. [`ProfileAligner`] merges two profiles with the same DP as the
//! pairwise aligner, scoring cells by expected substitution score.

use super::error::{MsaError, Result};
use super::pairwise::{DpTable, Step};
use super::substitution::{SubstitutionModel, GAP};

/// Aligned member strings plus their per-column symbol frequencies.
///
/// Never mutated after construction; a merge builds a new profile.
#[derive(Debug, Clone)]
pub struct Profile {
    ids: Vec<String>,
    rows: Vec<Vec<u8>>,
    len: usize,
    /// Symbols per column (residues + gap), in model index order.
    stride: usize,
    /// Column-major frequency table: column `c` occupies `c * stride..(c + 1) * stride`.
    freqs: Vec<f64>,
    gap_index: usize,
    /// Model index -> symbol, kept so lookups by symbol need no model.
    symbols: Vec<u8>,
}

impl Profile {
    /// Build a profile from equal-length aligned rows.
    pub fn new(ids: Vec<String>, rows: Vec<Vec<u8>>, model: &SubstitutionModel) -> Result<Self> {
        if rows.is_empty() {
            return Err(MsaError::Input("a profile needs at least one member".to_string()));
        }
        if ids.len() != rows.len() {
            return Err(MsaError::DegenerateInput(format!(
                "{} ids for {} profile rows",
                ids.len(),
                rows.len()
            )));
        }
        let len = rows[0].len();
        if let Some((id, row)) = ids.iter().zip(&rows).find(|(_, r)| r.len() != len) {
            return Err(MsaError::DegenerateInput(format!(
                "profile row '{}' has length {}, expected {}",
                id,
                row.len(),
                len
            )));
        }

        let stride = model.symbol_count();
        let mut counts = vec![0usize; len * stride];
        for row in &rows {
            for (col, &c) in row.iter().enumerate() {
                let idx = model.index_of(c).ok_or(MsaError::ScoreLookup {
                    a: c as char,
                    b: GAP as char,
                })?;
                counts[col * stride + idx] += 1;
            }
        }

        let members = rows.len() as f64;
        let freqs = counts.into_iter().map(|c| c as f64 / members).collect();

        Ok(Self {
            ids,
            rows,
            len,
            stride,
            freqs,
            gap_index: model.gap_index(),
            symbols: (0..stride).map(|i| model.symbol(i)).collect(),
        })
    }

    /// Trivial one-member profile for an ungapped input sequence.
    pub fn from_sequence(id: &str, seq: &[u8], model: &SubstitutionModel) -> Result<Self> {
        model.validate_sequence(id, seq)?;
        Self::new(vec![id.to_string()], vec![seq.to_vec()], model)
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn member_count(&self) -> usize {
        self.rows.len()
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn rows(&self) -> &[Vec<u8>] {
        &self.rows
    }

    pub fn members(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.ids
            .iter()
            .map(String::as_str)
            .zip(self.rows.iter().map(Vec::as_slice))
    }

    pub fn into_members(self) -> (Vec<String>, Vec<Vec<u8>>) {
        (self.ids, self.rows)
    }

    /// Fraction of members with `symbol` in `column`; 0 for symbols the model lacks.
    pub fn frequency(&self, symbol: u8, column: usize) -> f64 {
        match self.symbols.iter().position(|&s| s == symbol) {
            Some(idx) => self.freqs[column * self.stride + idx],
            None => 0.0,
        }
    }

    /// All frequencies of one column, indexed like the model's symbols.
    pub fn column_frequencies(&self, column: usize) -> &[f64] {
        &self.freqs[column * self.stride..(column + 1) * self.stride]
    }

    /// Non-zero residue frequencies of one column, gap excluded.
    fn residue_terms(&self, column: usize) -> Vec<(usize, f64)> {
        self.column_frequencies(column)
            .iter()
            .enumerate()
            .filter(|&(idx, &f)| idx != self.gap_index && f > 0.0)
            .map(|(idx, &f)| (idx, f))
            .collect()
    }
}

/// Result of merging two profiles.
#[derive(Debug, Clone)]
pub struct ProfileAlignment {
    pub score: f64,
    pub profile: Profile,
}

/// Needleman-Wunsch over profile columns using expected scores.
#[derive(Debug, Clone, Copy)]
pub struct ProfileAligner<'m> {
    model: &'m SubstitutionModel,
}

impl<'m> ProfileAligner<'m> {
    pub fn new(model: &'m SubstitutionModel) -> Self {
        Self { model }
    }

    /// Expected score of aligning column `i` of `p` against a pure gap column.
    pub fn gap_cost(&self, p: &Profile, i: usize) -> f64 {
        let gap = self.model.gap_index();
        p.residue_terms(i)
            .into_iter()
            .map(|(r, f)| f * self.model.score_by_index(r, gap) as f64)
            .sum()
    }

    /// Expected substitution score between column `i` of `p1` and column `j` of `p2`.
    pub fn pair_cost(&self, p1: &Profile, p2: &Profile, i: usize, j: usize) -> f64 {
        let right = p2.residue_terms(j);
        self.expected_pair(&p1.residue_terms(i), &right)
    }

    fn expected_pair(&self, left: &[(usize, f64)], right: &[(usize, f64)]) -> f64 {
        let mut total = 0.0;
        for &(r1, f1) in left {
            for &(r2, f2) in right {
                total += f1 * f2 * self.model.score_by_index(r1, r2) as f64;
            }
        }
        total
    }

    /// Align `p1` against `p2` and return the merged profile, `p1`'s members first.
    pub fn align(&self, p1: &Profile, p2: &Profile) -> Result<ProfileAlignment> {
        let stride = self.model.symbol_count();
        if p1.stride != stride || p2.stride != stride {
            return Err(MsaError::DegenerateInput(
                "profiles were built with a different substitution model".to_string(),
            ));
        }

        let left: Vec<Vec<(usize, f64)>> = (0..p1.len()).map(|i| p1.residue_terms(i)).collect();
        let right: Vec<Vec<(usize, f64)>> = (0..p2.len()).map(|j| p2.residue_terms(j)).collect();
        let left_gap: Vec<f64> = (0..p1.len()).map(|i| self.gap_cost(p1, i)).collect();
        let right_gap: Vec<f64> = (0..p2.len()).map(|j| self.gap_cost(p2, j)).collect();

        let table = DpTable::fill(
            p1.len(),
            p2.len(),
            self.model.objective(),
            |i| left_gap[i],
            |j| right_gap[j],
            |i, j| self.expected_pair(&left[i], &right[j]),
        );
        let ops = table.traceback()?;

        let mut rows = Vec::with_capacity(p1.member_count() + p2.member_count());
        rows.extend(p1.rows().iter().map(|r| regap(r, &ops, true)));
        rows.extend(p2.rows().iter().map(|r| regap(r, &ops, false)));
        let mut ids = p1.ids().to_vec();
        ids.extend_from_slice(p2.ids());

        log::debug!(
            "merged profiles of {} and {} members into {} columns",
            p1.member_count(),
            p2.member_count(),
            ops.len()
        );

        Ok(ProfileAlignment {
            score: table.final_score(),
            profile: Profile::new(ids, rows, self.model)?,
        })
    }
}

/// Extend one member row along the chosen moves. `first` selects which side
/// of the alignment the row belongs to.
fn regap(row: &[u8], ops: &[Step], first: bool) -> Vec<u8> {
    let mut out = Vec::with_capacity(ops.len());
    let mut col = 0;
    for &op in ops {
        let consumes = match op {
            Step::Substitute => true,
            Step::Delete => first,
            Step::Insert => !first,
            Step::Start => continue,
        };
        if consumes {
            out.push(row[col]);
            col += 1;
        } else {
            out.push(GAP);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::msa::pairwise::PairwiseAligner;
    use crate::msa::substitution::Objective;
    use approx::assert_abs_diff_eq;

    fn dna() -> SubstitutionModel {
        SubstitutionModel::uniform(b"ACGT", 1, -1, -2, Objective::Maximize).unwrap()
    }

    fn ids(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_frequencies_sum_to_one() {
        let model = dna();
        let p = Profile::new(
            ids(&["a", "b", "c"]),
            vec![b"AC-T".to_vec(), b"ACGT".to_vec(), b"-CGA".to_vec()],
            &model,
        )
        .unwrap();
        assert_eq!(p.len(), 4);
        assert_eq!(p.member_count(), 3);
        for col in 0..p.len() {
            let total: f64 = p.column_frequencies(col).iter().sum();
            assert_abs_diff_eq!(total, 1.0, epsilon = 1e-9);
        }
        assert_abs_diff_eq!(p.frequency(b'A', 0), 2.0 / 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(p.frequency(b'-', 0), 1.0 / 3.0, epsilon = 1e-12);
        assert_eq!(p.frequency(b'N', 0), 0.0);
    }

    #[test]
    fn test_rejects_ragged_rows() {
        let model = dna();
        let err = Profile::new(ids(&["a", "b"]), vec![b"ACG".to_vec(), b"AC".to_vec()], &model);
        assert!(matches!(err, Err(MsaError::DegenerateInput(_))));
    }

    #[test]
    fn test_expected_costs() {
        let model = dna();
        let aligner = ProfileAligner::new(&model);
        let p1 = Profile::new(ids(&["a", "b"]), vec![b"A".to_vec(), b"-".to_vec()], &model);
        let p2 = Profile::new(ids(&["c", "d"]), vec![b"A".to_vec(), b"C".to_vec()], &model);
        let (p1, p2) = (p1.unwrap(), p2.unwrap());
        assert_abs_diff_eq!(aligner.gap_cost(&p1, 0), -1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(aligner.gap_cost(&p2, 0), -2.0, epsilon = 1e-12);
        // 0.5 * (0.5 * 1 + 0.5 * -1) for the A half, nothing for the gap half
        assert_abs_diff_eq!(aligner.pair_cost(&p1, &p2, 0, 0), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_single_members_reduce_to_pairwise() {
        let cases: Vec<(SubstitutionModel, &[u8], &[u8])> = vec![
            (SubstitutionModel::blosum62(), &b"HEAGAWGHEE"[..], &b"PAWHEAE"[..]),
            (SubstitutionModel::blosum62(), &b"MKTAYIAKQR"[..], &b"MKTAYIAKQRQISFVKSHFSRQ"[..]),
            (dna(), &b"ACGT"[..], &b"ACT"[..]),
            (
                SubstitutionModel::uniform(&b"ABCD"[..], 0, 3, 1, Objective::Minimize).unwrap(),
                &b"ABDC"[..],
                &b"ABCD"[..],
            ),
        ];
        for (model, v, w) in cases {
            let pair = PairwiseAligner::new(&model).align(v, w).unwrap();
            let p1 = Profile::from_sequence("v", v, &model).unwrap();
            let p2 = Profile::from_sequence("w", w, &model).unwrap();
            let merged = ProfileAligner::new(&model).align(&p1, &p2).unwrap();
            assert_eq!(merged.score, pair.score as f64);
            assert_eq!(merged.profile.rows()[0], pair.aligned_v);
            assert_eq!(merged.profile.rows()[1], pair.aligned_w);
            assert_eq!(merged.profile.ids(), &["v".to_string(), "w".to_string()]);
        }
    }

    #[test]
    fn test_merge_keeps_members_intact() {
        let model = SubstitutionModel::blosum62();
        let p1 = Profile::new(
            ids(&["a", "b"]),
            vec![b"MKV-LA".to_vec(), b"MKVSLA".to_vec()],
            &model,
        )
        .unwrap();
        let p2 = Profile::new(
            ids(&["c", "d", "e"]),
            vec![b"MRVLA".to_vec(), b"MKILA".to_vec(), b"M-VLA".to_vec()],
            &model,
        )
        .unwrap();
        let merged = ProfileAligner::new(&model).align(&p1, &p2).unwrap().profile;
        assert_eq!(merged.member_count(), 5);
        assert!(merged.len() >= 6);
        assert!(merged.rows().iter().all(|r| r.len() == merged.len()));

        let originals = p1.rows().iter().chain(p2.rows());
        for (merged_row, original) in merged.rows().iter().zip(originals) {
            let a: Vec<u8> = merged_row.iter().copied().filter(|&c| c != GAP).collect();
            let b: Vec<u8> = original.iter().copied().filter(|&c| c != GAP).collect();
            assert_eq!(a, b);
        }
        for col in 0..merged.len() {
            let total: f64 = merged.column_frequencies(col).iter().sum();
            assert_abs_diff_eq!(total, 1.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_raw_sequence_must_be_ungapped() {
        let model = dna();
        assert!(matches!(
            Profile::from_sequence("a", b"A-C", &model),
            Err(MsaError::Input(_))
        ));
        assert!(matches!(
            Profile::from_sequence("a", b"ANC", &model),
            Err(MsaError::Input(_))
        ));
        // aligned rows may carry gaps
        assert!(Profile::new(ids(&["a"]), vec![b"A-C".to_vec()], &model).is_ok());
    }

    #[test]
    fn test_model_mismatch_is_degenerate() {
        let dna = dna();
        let protein = SubstitutionModel::blosum62();
        let p1 = Profile::from_sequence("a", b"ACG", &dna).unwrap();
        let p2 = Profile::from_sequence("b", b"ACG", &dna).unwrap();
        assert!(ProfileAligner::new(&protein).align(&p1, &p2).is_err());
    }
}
