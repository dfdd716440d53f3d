//! Progressive alignment along a guide tree
//!
//! Profiles are built bottom-up in post order. Each internal node consumes
//! the profiles of its two children, so at most one profile per pending
//! subtree is alive at any time. Different tree topologies over the same
//! leaves may produce different alignments; the result is a heuristic.

use super::distance::{DistanceMatrix, DistanceMetric};
use super::error::{MsaError, Result};
use super::fasta::SequenceSet;
use super::guide_tree::{neighbor_joining, GuideTree};
use super::profile::{Profile, ProfileAligner};
use super::substitution::SubstitutionModel;
use super::types::MultipleAlignment;

/// Final profile of a progressive run together with the tree that produced it.
#[derive(Debug, Clone)]
pub struct ProgressiveAlignment {
    pub tree: GuideTree,
    pub profile: Profile,
    /// DP score of the root merge; 0 for a single sequence.
    pub score: f64,
}

impl ProgressiveAlignment {
    /// Aligned rows in the order the sequences were supplied.
    pub fn to_alignment(&self, sequences: &SequenceSet) -> MultipleAlignment {
        MultipleAlignment::from_bytes(self.profile.ids().to_vec(), self.profile.rows().to_vec())
            .sorted_by_names(&sequences.names)
    }
}

pub struct ProgressiveAligner<'m> {
    model: &'m SubstitutionModel,
}

impl<'m> ProgressiveAligner<'m> {
    pub fn new(model: &'m SubstitutionModel) -> Self {
        Self { model }
    }

    /// Build distances with `metric`, cluster them and merge along the tree.
    pub fn align(
        &self,
        sequences: &SequenceSet,
        metric: &dyn DistanceMetric,
    ) -> Result<ProgressiveAlignment> {
        self.validate(sequences)?;
        let distances = DistanceMatrix::compute(sequences, metric)?;
        let tree = neighbor_joining(&distances)?;
        log::info!(
            "guide tree built: {} leaves, {} joins",
            tree.leaf_count(),
            tree.internal_count()
        );
        self.merge_along(sequences, tree, |_, _| {})
    }

    /// Merge along an existing tree. `on_merge(done, total)` is called after
    /// every profile merge.
    pub fn align_tree(
        &self,
        sequences: &SequenceSet,
        tree: GuideTree,
        on_merge: impl FnMut(usize, usize),
    ) -> Result<ProgressiveAlignment> {
        self.validate(sequences)?;
        self.merge_along(sequences, tree, on_merge)
    }

    /// Post-order merge over sequences that already passed [`Self::validate`].
    fn merge_along(
        &self,
        sequences: &SequenceSet,
        tree: GuideTree,
        mut on_merge: impl FnMut(usize, usize),
    ) -> Result<ProgressiveAlignment> {
        if tree.leaf_count() != sequences.len() {
            return Err(MsaError::DegenerateInput(format!(
                "guide tree has {} leaves for {} sequences",
                tree.leaf_count(),
                sequences.len()
            )));
        }

        let aligner = ProfileAligner::new(self.model);
        let total = tree.internal_count();
        let mut done = 0;
        let mut score = 0.0;
        let mut profiles: Vec<Option<Profile>> = vec![None; tree.node_count()];

        for id in tree.post_order() {
            let node = tree.node(id);
            let profile = match (node.children(), node.sequence_index()) {
                (None, Some(idx)) => Profile::from_sequence(
                    &sequences.names[idx],
                    &sequences.sequences[idx],
                    self.model,
                )?,
                (Some((left, right)), _) => {
                    let (p1, p2) = match (profiles[left].take(), profiles[right].take()) {
                        (Some(p1), Some(p2)) => (p1, p2),
                        _ => {
                            return Err(MsaError::DegenerateInput(format!(
                                "children of node {} were not aligned before it",
                                id
                            )))
                        }
                    };
                    let merged = aligner.align(&p1, &p2)?;
                    done += 1;
                    on_merge(done, total);
                    score = merged.score;
                    merged.profile
                }
                (None, None) => {
                    return Err(MsaError::DegenerateInput(format!(
                        "leaf node {} has no sequence",
                        id
                    )))
                }
            };
            profiles[id] = Some(profile);
        }

        let profile = profiles[tree.root()].take().ok_or_else(|| {
            MsaError::DegenerateInput("guide tree root produced no profile".to_string())
        })?;
        log::info!(
            "progressive alignment done: {} sequences, {} columns",
            profile.member_count(),
            profile.len()
        );
        Ok(ProgressiveAlignment {
            tree,
            profile,
            score,
        })
    }

    fn validate(&self, sequences: &SequenceSet) -> Result<()> {
        if sequences.is_empty() {
            return Err(MsaError::Input("no sequences to align".to_string()));
        }
        for (name, seq) in sequences.iter() {
            self.model.validate_sequence(name, seq)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::msa::distance::{AlignmentScoreDistance, EditDistance};
    use crate::msa::guide_tree::GuideTreeBuilder;
    use crate::msa::pairwise::PairwiseAligner;
    use crate::msa::substitution::{Objective, GAP};

    fn set(seqs: &[(&str, &str)]) -> SequenceSet {
        let mut s = SequenceSet::new();
        for (n, q) in seqs {
            s.push(*n, q.as_bytes()).unwrap();
        }
        s
    }

    fn ungapped(row: &str) -> String {
        row.chars().filter(|&c| c != GAP as char).collect()
    }

    fn assert_valid(aln: &MultipleAlignment, input: &SequenceSet) {
        assert_eq!(aln.names, input.names);
        let width = aln.column_count();
        assert!(width >= input.max_len());
        for (row, seq) in aln.rows.iter().zip(&input.sequences) {
            assert_eq!(row.len(), width);
            assert_eq!(ungapped(row).as_bytes(), seq.as_slice());
        }
    }

    #[test]
    fn test_protein_family() {
        let model = SubstitutionModel::blosum62();
        let input = set(&[
            ("human", "MGDVEKGKKIFVQKCAQCHTVEK"),
            ("horse", "MGDVEKGKKIFVQKCAQCHTVE"),
            ("yeast", "MTEFKAGSAKKGATLFKTRCLQCHTVEK"),
            ("fly", "MGVPAGDVEKGKKLFVQRCAQCHTVEA"),
        ]);
        let metric = AlignmentScoreDistance::new(PairwiseAligner::new(&model));
        let result = ProgressiveAligner::new(&model).align(&input, &metric).unwrap();
        assert_eq!(result.tree.leaf_count(), 4);
        assert_eq!(result.profile.member_count(), 4);
        assert_valid(&result.to_alignment(&input), &input);
    }

    #[test]
    fn test_two_sequences_match_pairwise() {
        let model = SubstitutionModel::uniform(b"ABCD", 0, 3, 1, Objective::Minimize).unwrap();
        let input = set(&[("A", "ABDC"), ("B", "ABCD")]);
        let result = ProgressiveAligner::new(&model)
            .align(&input, &EditDistance)
            .unwrap();
        assert_eq!(result.score, 2.0);
        let aln = result.to_alignment(&input);
        assert_eq!(aln.rows, vec!["AB-DC", "ABCD-"]);
    }

    #[test]
    fn test_single_sequence_is_trivial() {
        let model = SubstitutionModel::blosum62();
        let input = set(&[("only", "MKV")]);
        let result = ProgressiveAligner::new(&model)
            .align(&input, &EditDistance)
            .unwrap();
        assert_eq!(result.score, 0.0);
        assert_eq!(result.to_alignment(&input).rows, vec!["MKV"]);
    }

    #[test]
    fn test_empty_set_is_input_error() {
        let model = SubstitutionModel::blosum62();
        let err = ProgressiveAligner::new(&model).align(&SequenceSet::new(), &EditDistance);
        assert!(matches!(err, Err(MsaError::Input(_))));
    }

    #[test]
    fn test_unknown_residue_is_input_error() {
        let model = SubstitutionModel::uniform(b"AT", 0, 1, 1, Objective::Minimize).unwrap();
        let input = set(&[("a", "AAT"), ("b", "AGT")]);
        let err = ProgressiveAligner::new(&model).align(&input, &EditDistance);
        assert!(matches!(err, Err(MsaError::Input(_))));
    }

    #[test]
    fn test_merge_order_follows_tree() {
        let model = SubstitutionModel::uniform(b"AT", 0, 1, 1, Objective::Minimize).unwrap();
        let input = set(&[("A", "AAAA"), ("B", "AAAA"), ("C", "TTTT"), ("D", "AATT")]);
        let mut builder = GuideTreeBuilder::new(4).unwrap();
        let cd = builder.join(2, 3).unwrap();
        let ab = builder.join(0, 1).unwrap();
        builder.join(ab, cd).unwrap();
        let tree = builder.finish().unwrap();

        let mut calls = Vec::new();
        let result = ProgressiveAligner::new(&model)
            .align_tree(&input, tree, |done, total| calls.push((done, total)))
            .unwrap();
        assert_eq!(calls, vec![(1, 3), (2, 3), (3, 3)]);
        assert_eq!(result.profile.ids(), &["A", "B", "C", "D"]);
        assert_valid(&result.to_alignment(&input), &input);
    }

    #[test]
    fn test_align_tree_checks_residues() {
        let model = SubstitutionModel::uniform(b"AT", 0, 1, 1, Objective::Minimize).unwrap();
        let input = set(&[("a", "AT"), ("b", "A-T")]);
        let mut builder = GuideTreeBuilder::new(2).unwrap();
        builder.join(0, 1).unwrap();
        let tree = builder.finish().unwrap();
        let mut merges = 0;
        let err = ProgressiveAligner::new(&model).align_tree(&input, tree, |_, _| merges += 1);
        assert!(matches!(err, Err(MsaError::Input(_))));
        assert_eq!(merges, 0);
    }

    #[test]
    fn test_tree_size_mismatch() {
        let model = SubstitutionModel::blosum62();
        let input = set(&[("a", "MKV"), ("b", "MKI"), ("c", "MRV")]);
        let mut builder = GuideTreeBuilder::new(2).unwrap();
        builder.join(0, 1).unwrap();
        let tree = builder.finish().unwrap();
        let err = ProgressiveAligner::new(&model).align_tree(&input, tree, |_, _| {});
        assert!(matches!(err, Err(MsaError::DegenerateInput(_))));
    }
}
