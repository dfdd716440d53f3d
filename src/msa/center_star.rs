//! Center-star multiple alignment
//!
//! The sequence closest to all others is picked as the center and every other
//! sequence is aligned against it pairwise. The pairwise alignments are then
//! merged in a single pass: each center slot (before every center residue and
//! after the last one) gets the widest insertion any pairwise alignment put
//! there, and shorter insertions are padded with gaps.

use super::distance::{DistanceMatrix, DistanceMetric};
use super::error::{MsaError, Result};
use super::fasta::SequenceSet;
use super::pairwise::PairwiseAligner;
use super::substitution::{SubstitutionModel, GAP};
use super::types::MultipleAlignment;

#[derive(Debug, Clone)]
pub struct CenterStarAlignment {
    /// Input index of the center sequence.
    pub center: usize,
    pub alignment: MultipleAlignment,
}

/// One non-center sequence laid out against the center's slots.
struct Projection {
    /// `inserts[k]`: residues placed before center residue `k`; the last entry
    /// holds residues after the final center residue.
    inserts: Vec<Vec<u8>>,
    /// Symbol opposite each center residue (a residue or a gap).
    opposite: Vec<u8>,
}

impl Projection {
    fn from_pairwise(center_len: usize, aligned_center: &[u8], aligned_other: &[u8]) -> Self {
        let mut inserts = vec![Vec::new(); center_len + 1];
        let mut opposite = Vec::with_capacity(center_len);
        for (&c, &o) in aligned_center.iter().zip(aligned_other) {
            if c == GAP {
                inserts[opposite.len()].push(o);
            } else {
                opposite.push(o);
            }
        }
        Self { inserts, opposite }
    }
}

pub struct CenterStarAligner<'m> {
    aligner: PairwiseAligner<'m>,
}

impl<'m> CenterStarAligner<'m> {
    pub fn new(model: &'m SubstitutionModel) -> Self {
        Self {
            aligner: PairwiseAligner::new(model),
        }
    }

    pub fn align(
        &self,
        sequences: &SequenceSet,
        metric: &dyn DistanceMetric,
    ) -> Result<CenterStarAlignment> {
        self.validate(sequences)?;
        let distances = DistanceMatrix::compute(sequences, metric)?;
        let center = distances
            .most_central()
            .ok_or_else(|| MsaError::Input("no sequences to align".to_string()))?;
        log::info!("center sequence: '{}'", sequences.names[center]);
        self.merge_on(sequences, center)
    }

    /// Align every sequence against `sequences[center]` and merge.
    pub fn align_to_center(
        &self,
        sequences: &SequenceSet,
        center: usize,
    ) -> Result<CenterStarAlignment> {
        self.validate(sequences)?;
        self.merge_on(sequences, center)
    }

    fn merge_on(&self, sequences: &SequenceSet, center: usize) -> Result<CenterStarAlignment> {
        let center_seq = sequences.sequences.get(center).ok_or_else(|| {
            MsaError::Input(format!("center index {} out of range", center))
        })?;
        let n = center_seq.len();

        let mut projections = Vec::with_capacity(sequences.len());
        for (idx, seq) in sequences.sequences.iter().enumerate() {
            if idx == center {
                projections.push(Projection {
                    inserts: vec![Vec::new(); n + 1],
                    opposite: center_seq.clone(),
                });
                continue;
            }
            let pair = self.aligner.align(center_seq, seq)?;
            projections.push(Projection::from_pairwise(n, &pair.aligned_v, &pair.aligned_w));
        }

        let widths: Vec<usize> = (0..=n)
            .map(|k| projections.iter().map(|p| p.inserts[k].len()).max().unwrap_or(0))
            .collect();

        let total_width = n + widths.iter().sum::<usize>();
        let rows = projections
            .iter()
            .map(|p| {
                let mut row = Vec::with_capacity(total_width);
                for k in 0..=n {
                    row.extend_from_slice(&p.inserts[k]);
                    row.resize(row.len() + widths[k] - p.inserts[k].len(), GAP);
                    if k < n {
                        row.push(p.opposite[k]);
                    }
                }
                row
            })
            .collect();

        log::info!(
            "center-star alignment done: {} sequences, {} columns",
            sequences.len(),
            total_width
        );
        Ok(CenterStarAlignment {
            center,
            alignment: MultipleAlignment::from_bytes(sequences.names.clone(), rows),
        })
    }

    fn validate(&self, sequences: &SequenceSet) -> Result<()> {
        if sequences.is_empty() {
            return Err(MsaError::Input("no sequences to align".to_string()));
        }
        let model = self.aligner.model();
        for (name, seq) in sequences.iter() {
            model.validate_sequence(name, seq)?;
        }
        Ok(())
    }
}
