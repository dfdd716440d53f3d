//! All-pairs dissimilarities for guide-tree construction

use rayon::prelude::*;

use super::error::{MsaError, Result};
use super::fasta::SequenceSet;
use super::pairwise::PairwiseAligner;

/// How two raw sequences are turned into a dissimilarity.
pub trait DistanceMetric: Sync {
    fn distance(&self, v: &[u8], w: &[u8]) -> Result<f64>;

    fn name(&self) -> &'static str;
}

/// Optimal global alignment score, flipped so that better alignments are closer.
pub struct AlignmentScoreDistance<'m> {
    aligner: PairwiseAligner<'m>,
}

impl<'m> AlignmentScoreDistance<'m> {
    pub fn new(aligner: PairwiseAligner<'m>) -> Self {
        Self { aligner }
    }
}

impl DistanceMetric for AlignmentScoreDistance<'_> {
    fn distance(&self, v: &[u8], w: &[u8]) -> Result<f64> {
        let score = self.aligner.score(v, w)?;
        Ok(self
            .aligner
            .model()
            .objective()
            .score_to_distance(score as f64))
    }

    fn name(&self) -> &'static str {
        "alignment score"
    }
}

/// Unit-cost Levenshtein distance.
pub struct EditDistance;

impl DistanceMetric for EditDistance {
    fn distance(&self, v: &[u8], w: &[u8]) -> Result<f64> {
        Ok(edit_distance(v, w) as f64)
    }

    fn name(&self) -> &'static str {
        "edit distance"
    }
}

/// Minimum number of single-residue insertions, deletions and substitutions
/// turning `v` into `w`.
pub fn edit_distance(v: &[u8], w: &[u8]) -> usize {
    let mut prev: Vec<usize> = (0..=w.len()).collect();
    let mut curr = vec![0; w.len() + 1];
    for (i, &a) in v.iter().enumerate() {
        curr[0] = i + 1;
        for (j, &b) in w.iter().enumerate() {
            let substitute = prev[j] + usize::from(a != b);
            curr[j + 1] = substitute.min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[w.len()]
}

/// Symmetric `k x k` matrix of dissimilarities, read-only once built.
#[derive(Debug, Clone)]
pub struct DistanceMatrix {
    names: Vec<String>,
    values: Vec<f64>,
}

impl DistanceMatrix {
    /// Compute every unordered pair once, in parallel on the current rayon
    /// pool, and mirror it. The diagonal is the metric applied to each
    /// sequence against itself.
    pub fn compute(sequences: &SequenceSet, metric: &dyn DistanceMetric) -> Result<Self> {
        let k = sequences.len();
        let pairs: Vec<(usize, usize)> = (0..k).flat_map(|i| (i..k).map(move |j| (i, j))).collect();

        let computed: Vec<(usize, usize, f64)> = pairs
            .par_iter()
            .map(|&(i, j)| {
                metric
                    .distance(&sequences.sequences[i], &sequences.sequences[j])
                    .map(|d| (i, j, d))
            })
            .collect::<Result<_>>()?;

        let mut values = vec![0.0; k * k];
        for (i, j, d) in computed {
            if !d.is_finite() {
                return Err(MsaError::DegenerateInput(format!(
                    "non-finite distance between '{}' and '{}'",
                    sequences.names[i], sequences.names[j]
                )));
            }
            values[i * k + j] = d;
            values[j * k + i] = d;
        }

        log::info!(
            "computed {} pairwise distances ({})",
            k * k.saturating_sub(1) / 2,
            metric.name()
        );
        Ok(Self {
            names: sequences.names.clone(),
            values,
        })
    }

    /// Build from a full row-major matrix; it must be square and symmetric.
    pub fn from_rows(names: Vec<String>, rows: &[Vec<f64>]) -> Result<Self> {
        let k = names.len();
        if rows.len() != k || rows.iter().any(|r| r.len() != k) {
            return Err(MsaError::DegenerateInput(format!(
                "distance matrix must be {0} x {0}",
                k
            )));
        }
        for i in 0..k {
            for j in 0..k {
                if !rows[i][j].is_finite() || rows[i][j] != rows[j][i] {
                    return Err(MsaError::DegenerateInput(format!(
                        "distance matrix is not symmetric and finite at ({}, {})",
                        i, j
                    )));
                }
            }
        }
        Ok(Self {
            names,
            values: rows.iter().flatten().copied().collect(),
        })
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.values[i * self.names.len() + j]
    }

    /// Index with the minimum sum of distances to all others; ties go to the
    /// earliest index.
    pub fn most_central(&self) -> Option<usize> {
        let k = self.len();
        let mut best: Option<(usize, f64)> = None;
        for i in 0..k {
            let total: f64 = (0..k).filter(|&j| j != i).map(|j| self.get(i, j)).sum();
            if best.map_or(true, |(_, b)| total < b) {
                best = Some((i, total));
            }
        }
        best.map(|(i, _)| i)
    }
}
