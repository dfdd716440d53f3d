//! Needleman-Wunsch global alignment of two raw sequences
//!
//! The DP fill and traceback here are shared with the profile aligner: both
//! fill the same table shape with the same tie-break, only the per-cell
//! scores differ.

use std::ops::Add;

use super::error::{MsaError, Result};
use super::substitution::{Objective, SubstitutionModel, GAP};

/// Back-pointer stored with every DP cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Start,
    /// Gap in the first input, residue from the second.
    Insert,
    /// Residue from the first input, gap in the second.
    Delete,
    /// One residue from each input.
    Substitute,
}

/// Pick the best of the three moves under `objective`.
///
/// Ties resolve SUBSTITUTE over DELETE over INSERT. Both aligners go through
/// this one function so the rule cannot drift between them.
pub(crate) fn choose_step<T: PartialOrd + Copy>(
    objective: Objective,
    substitute: T,
    delete: T,
    insert: T,
) -> (T, Step) {
    let mut best = (substitute, Step::Substitute);
    if objective.improves(delete, best.0) {
        best = (delete, Step::Delete);
    }
    if objective.improves(insert, best.0) {
        best = (insert, Step::Insert);
    }
    best
}

/// Full `(m + 1) x (n + 1)` score and back-pointer table.
pub(crate) struct DpTable<T> {
    rows: usize,
    cols: usize,
    values: Vec<T>,
    steps: Vec<Step>,
}

impl<T> DpTable<T>
where
    T: Copy + Default + PartialOrd + Add<Output = T>,
{
    /// Fill the table for inputs of length `m` and `n`.
    ///
    /// `delete_cost(i)` scores position `i` of the first input against a gap,
    /// `insert_cost(j)` scores a gap against position `j` of the second, and
    /// `pair_cost(i, j)` scores the two positions against each other.
    pub(crate) fn fill(
        m: usize,
        n: usize,
        objective: Objective,
        delete_cost: impl Fn(usize) -> T,
        insert_cost: impl Fn(usize) -> T,
        pair_cost: impl Fn(usize, usize) -> T,
    ) -> Self {
        let rows = m + 1;
        let cols = n + 1;
        let mut values = vec![T::default(); rows * cols];
        let mut steps = vec![Step::Start; rows * cols];

        for i in 1..rows {
            values[i * cols] = values[(i - 1) * cols] + delete_cost(i - 1);
            steps[i * cols] = Step::Delete;
        }
        for j in 1..cols {
            values[j] = values[j - 1] + insert_cost(j - 1);
            steps[j] = Step::Insert;
        }

        let insert_costs: Vec<T> = (0..n).map(&insert_cost).collect();
        for i in 1..rows {
            let del = delete_cost(i - 1);
            for j in 1..cols {
                let here = i * cols + j;
                let insert = values[here - 1] + insert_costs[j - 1];
                let delete = values[here - cols] + del;
                let substitute = values[here - cols - 1] + pair_cost(i - 1, j - 1);
                let (value, step) = choose_step(objective, substitute, delete, insert);
                values[here] = value;
                steps[here] = step;
            }
        }

        Self {
            rows,
            cols,
            values,
            steps,
        }
    }

    /// Optimal score of the whole alignment.
    pub(crate) fn final_score(&self) -> T {
        self.values[self.rows * self.cols - 1]
    }

    /// Follow back-pointers from the last cell to START and return the moves
    /// in left-to-right order.
    pub(crate) fn traceback(&self) -> Result<Vec<Step>> {
        let mut i = self.rows - 1;
        let mut j = self.cols - 1;
        let mut ops = Vec::with_capacity(i + j);

        loop {
            let step = self.steps[i * self.cols + j];
            match step {
                Step::Start => break,
                Step::Insert if j > 0 => j -= 1,
                Step::Delete if i > 0 => i -= 1,
                Step::Substitute if i > 0 && j > 0 => {
                    i -= 1;
                    j -= 1;
                }
                _ => {
                    return Err(MsaError::DegenerateInput(format!(
                        "back-pointer {:?} leaves the table at ({}, {})",
                        step, i, j
                    )))
                }
            }
            ops.push(step);
        }

        ops.reverse();
        Ok(ops)
    }
}

/// Result of aligning two sequences.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairwiseAlignment {
    pub score: i32,
    pub aligned_v: Vec<u8>,
    pub aligned_w: Vec<u8>,
}

impl PairwiseAlignment {
    pub fn len(&self) -> usize {
        self.aligned_v.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aligned_v.is_empty()
    }
}

/// Global aligner with linear gap scores taken from the substitution model.
#[derive(Debug, Clone, Copy)]
pub struct PairwiseAligner<'m> {
    model: &'m SubstitutionModel,
}

impl<'m> PairwiseAligner<'m> {
    pub fn new(model: &'m SubstitutionModel) -> Self {
        Self { model }
    }

    pub fn model(&self) -> &'m SubstitutionModel {
        self.model
    }

    /// Optimal global alignment of `v` against `w`, with traceback.
    pub fn align(&self, v: &[u8], w: &[u8]) -> Result<PairwiseAlignment> {
        let vi = self.resolve(v)?;
        let wi = self.resolve(w)?;
        let model = self.model;
        let gap = model.gap_index();

        let table = DpTable::fill(
            v.len(),
            w.len(),
            model.objective(),
            |i| model.score_by_index(vi[i], gap),
            |j| model.score_by_index(gap, wi[j]),
            |i, j| model.score_by_index(vi[i], wi[j]),
        );

        let ops = table.traceback()?;
        let mut aligned_v = Vec::with_capacity(ops.len());
        let mut aligned_w = Vec::with_capacity(ops.len());
        let (mut i, mut j) = (0, 0);
        for op in ops {
            match op {
                Step::Substitute => {
                    aligned_v.push(v[i]);
                    aligned_w.push(w[j]);
                    i += 1;
                    j += 1;
                }
                Step::Delete => {
                    aligned_v.push(v[i]);
                    aligned_w.push(GAP);
                    i += 1;
                }
                Step::Insert => {
                    aligned_v.push(GAP);
                    aligned_w.push(w[j]);
                    j += 1;
                }
                Step::Start => {}
            }
        }

        Ok(PairwiseAlignment {
            score: table.final_score(),
            aligned_v,
            aligned_w,
        })
    }

    /// Optimal global score only, in two rows of memory.
    pub fn score(&self, v: &[u8], w: &[u8]) -> Result<i32> {
        let vi = self.resolve(v)?;
        let wi = self.resolve(w)?;
        let model = self.model;
        let objective = model.objective();
        let gap = model.gap_index();
        let n = w.len();

        let insert_costs: Vec<i32> = wi.iter().map(|&b| model.score_by_index(gap, b)).collect();
        let mut prev = vec![0i32; n + 1];
        let mut curr = vec![0i32; n + 1];
        for j in 1..=n {
            prev[j] = prev[j - 1] + insert_costs[j - 1];
        }

        for &a in &vi {
            let del = model.score_by_index(a, gap);
            curr[0] = prev[0] + del;
            for j in 1..=n {
                let substitute = prev[j - 1] + model.score_by_index(a, wi[j - 1]);
                let delete = prev[j] + del;
                let insert = curr[j - 1] + insert_costs[j - 1];
                curr[j] = choose_step(objective, substitute, delete, insert).0;
            }
            std::mem::swap(&mut prev, &mut curr);
        }
        Ok(prev[n])
    }

    /// Model indices of a raw sequence; the gap symbol is not a residue.
    fn resolve(&self, seq: &[u8]) -> Result<Vec<usize>> {
        seq.iter()
            .enumerate()
            .map(|(pos, &c)| {
                if c == GAP {
                    return Err(MsaError::Input(format!(
                        "raw sequence has a gap at position {}",
                        pos + 1
                    )));
                }
                self.model.index_of(c).ok_or(MsaError::ScoreLookup {
                    a: c as char,
                    b: GAP as char,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bio::alignment::pairwise::Aligner;

    fn strip_gaps(s: &[u8]) -> Vec<u8> {
        s.iter().copied().filter(|&c| c != GAP).collect()
    }

    fn column_sum(model: &SubstitutionModel, a: &[u8], b: &[u8]) -> i32 {
        a.iter()
            .zip(b)
            .map(|(&x, &y)| model.score(x, y).unwrap())
            .sum()
    }

    #[test]
    fn test_min_cost_scenario() {
        let model = SubstitutionModel::uniform(b"ABCD", 0, 3, 1, Objective::Minimize).unwrap();
        let aln = PairwiseAligner::new(&model).align(b"ABDC", b"ABCD").unwrap();
        assert_eq!(aln.score, 2);
        assert_eq!(aln.len(), 5);
        assert_eq!(aln.aligned_v.iter().filter(|&&c| c == GAP).count(), 1);
        assert_eq!(aln.aligned_w.iter().filter(|&&c| c == GAP).count(), 1);
        assert_eq!(aln.aligned_v, b"AB-DC");
        assert_eq!(aln.aligned_w, b"ABCD-");
    }

    #[test]
    fn test_identical_sequences() {
        let model = SubstitutionModel::blosum62();
        let aln = PairwiseAligner::new(&model).align(b"MKV", b"MKV").unwrap();
        assert_eq!(aln.aligned_v, b"MKV");
        assert_eq!(aln.aligned_w, b"MKV");
        assert_eq!(aln.score, 5 + 5 + 4);
    }

    #[test]
    fn test_deletion_in_second() {
        let model = SubstitutionModel::uniform(b"ACGT", 1, -1, -2, Objective::Maximize).unwrap();
        let aln = PairwiseAligner::new(&model).align(b"ACGT", b"ACT").unwrap();
        assert_eq!(aln.score, 1);
        assert_eq!(aln.aligned_v, b"ACGT");
        assert_eq!(aln.aligned_w, b"AC-T");
    }

    #[test]
    fn test_alignment_properties_blosum() {
        let model = SubstitutionModel::blosum62();
        let aligner = PairwiseAligner::new(&model);
        let pairs: [(&[u8], &[u8]); 4] = [
            (&b"HEAGAWGHEE"[..], &b"PAWHEAE"[..]),
            (&b"MKTAYIAKQR"[..], &b"MKTAYIAKQRQISFVKSHFSRQ"[..]),
            (&b"W"[..], &b"ACDEFGHIKLMNPQRSTVWY"[..]),
            (&b"GGGGG"[..], &b"CCC"[..]),
        ];
        for (v, w) in pairs {
            let aln = aligner.align(v, w).unwrap();
            assert_eq!(aln.aligned_v.len(), aln.aligned_w.len());
            assert!(aln.len() >= v.len().max(w.len()));
            assert_eq!(strip_gaps(&aln.aligned_v), v);
            assert_eq!(strip_gaps(&aln.aligned_w), w);
            assert_eq!(aln.score, column_sum(&model, &aln.aligned_v, &aln.aligned_w));
            assert_eq!(aln.score, aligner.score(v, w).unwrap());
            assert_eq!(aln.score, aligner.score(w, v).unwrap());
        }
    }

    #[test]
    fn test_score_matches_bio_global() {
        let model = SubstitutionModel::blosum62();
        let aligner = PairwiseAligner::new(&model);
        let x = b"MEEPQSDPSVEPPLSQETFSDLWKLLPENNV";
        let y = b"MEESQSDISLELPLSQETFSGLWKLLPPEDI";
        let score_fn = |a: u8, b: u8| model.score(a, b).unwrap();
        let mut oracle = Aligner::with_capacity(x.len(), y.len(), 0, -4, &score_fn);
        let expected = oracle.global(x, y).score;
        assert_eq!(aligner.score(x, y).unwrap(), expected);
        assert_eq!(aligner.align(x, y).unwrap().score, expected);
    }

    #[test]
    fn test_unknown_residue_fails() {
        let model = SubstitutionModel::uniform(b"ACGT", 1, -1, -2, Objective::Maximize).unwrap();
        let aligner = PairwiseAligner::new(&model);
        assert!(matches!(
            aligner.align(b"ACGU", b"ACGT"),
            Err(MsaError::ScoreLookup { a: 'U', .. })
        ));
        assert!(aligner.score(b"ACGT", b"N").is_err());
    }

    #[test]
    fn test_gap_in_raw_sequence_is_input_error() {
        let model = SubstitutionModel::blosum62();
        let aligner = PairwiseAligner::new(&model);
        assert!(matches!(aligner.align(b"A-C", b"AC"), Err(MsaError::Input(_))));
        assert!(matches!(aligner.align(b"AC", b"A-C"), Err(MsaError::Input(_))));
        assert!(matches!(aligner.score(b"A-C", b"AC"), Err(MsaError::Input(_))));
    }

    #[test]
    fn test_tie_break_prefers_substitute_then_delete() {
        assert_eq!(choose_step(Objective::Maximize, 1, 1, 1).1, Step::Substitute);
        assert_eq!(choose_step(Objective::Maximize, 0, 1, 1).1, Step::Delete);
        assert_eq!(choose_step(Objective::Maximize, 0, 0, 1).1, Step::Insert);
        assert_eq!(choose_step(Objective::Minimize, 2.0, 1.0, 1.0).1, Step::Delete);
    }
}
