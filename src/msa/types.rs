//! Data types for alignment runs

use serde::{Deserialize, Serialize};

use super::fasta::write_fasta;

/// Multiple-alignment strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MsaMethod {
    /// Neighbor-joining guide tree, then bottom-up profile merges
    Progressive,
    /// Every sequence aligned against the most central one
    CenterStar,
}

impl Default for MsaMethod {
    fn default() -> Self {
        Self::Progressive
    }
}

impl MsaMethod {
    pub fn description(&self) -> &'static str {
        match self {
            Self::Progressive => "Progressive (neighbor-joining guide tree)",
            Self::CenterStar => "Center star",
        }
    }
}

/// How sequence dissimilarity is measured for clustering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DistancePolicy {
    /// Optimal global alignment score under the active model
    AlignmentScore,
    /// Unit-cost Levenshtein distance
    EditDistance,
}

impl Default for DistancePolicy {
    fn default() -> Self {
        Self::AlignmentScore
    }
}

impl DistancePolicy {
    pub fn description(&self) -> &'static str {
        match self {
            Self::AlignmentScore => "Alignment score",
            Self::EditDistance => "Edit distance",
        }
    }
}

/// Substitution model selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ScoringChoice {
    /// Built-in BLOSUM62 with gap score -4
    Blosum62,
    /// Identity scoring over a user alphabet
    Uniform {
        alphabet: String,
        match_score: i32,
        mismatch_score: i32,
        gap_score: i32,
        minimize: bool,
    },
    /// Table loaded from a file
    Custom { name: String },
}

impl Default for ScoringChoice {
    fn default() -> Self {
        Self::Blosum62
    }
}

impl ScoringChoice {
    /// The match 0 / mismatch 3 / indel 1 cost model.
    pub fn unit_costs(alphabet: &str) -> Self {
        Self::Uniform {
            alphabet: alphabet.to_string(),
            match_score: 0,
            mismatch_score: 3,
            gap_score: 1,
            minimize: true,
        }
    }

    pub fn description(&self) -> String {
        match self {
            Self::Blosum62 => "BLOSUM62 (gap -4)".to_string(),
            Self::Uniform {
                match_score,
                mismatch_score,
                gap_score,
                minimize,
                ..
            } => format!(
                "Uniform (match {}, mismatch {}, gap {}, {})",
                match_score,
                mismatch_score,
                gap_score,
                if *minimize { "minimize" } else { "maximize" }
            ),
            Self::Custom { name } => format!("Custom table '{}'", name),
        }
    }
}

/// Thread count configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ThreadCount {
    /// Use all available CPU cores
    Auto,
    /// Use a specific number of threads
    Fixed(usize),
}

impl Default for ThreadCount {
    fn default() -> Self {
        Self::Auto
    }
}

impl ThreadCount {
    /// Get the actual number of threads to use
    pub fn get_count(&self) -> usize {
        match self {
            Self::Auto => std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            Self::Fixed(n) => (*n).max(1),
        }
    }
}

/// Parameters for one alignment run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlignmentParams {
    pub method: MsaMethod,
    pub distance: DistancePolicy,
    pub scoring: ScoringChoice,
    pub thread_count: ThreadCount,
}

/// Equal-length aligned rows, one per input sequence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultipleAlignment {
    pub names: Vec<String>,
    pub rows: Vec<String>,
}

impl MultipleAlignment {
    pub fn from_bytes(names: Vec<String>, rows: Vec<Vec<u8>>) -> Self {
        let rows = rows
            .into_iter()
            .map(|r| String::from_utf8_lossy(&r).into_owned())
            .collect();
        Self { names, rows }
    }

    /// Reorder rows to follow `order`; names missing from `order` keep
    /// their relative position at the end.
    pub fn sorted_by_names(mut self, order: &[String]) -> Self {
        let rank = |name: &str| order.iter().position(|n| n == name).unwrap_or(usize::MAX);
        let mut paired: Vec<(String, String)> =
            self.names.drain(..).zip(self.rows.drain(..)).collect();
        paired.sort_by_key(|(name, _)| rank(name));
        let (names, rows) = paired.into_iter().unzip();
        Self { names, rows }
    }

    pub fn sequence_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.rows.first().map_or(0, String::len)
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|i| self.rows[i].as_str())
    }

    /// `id: aligned` per line.
    pub fn to_labeled_text(&self) -> String {
        let mut out = String::new();
        for (name, row) in self.names.iter().zip(&self.rows) {
            out.push_str(name);
            out.push_str(": ");
            out.push_str(row);
            out.push('\n');
        }
        out
    }

    /// One aligned string per line.
    pub fn to_plain_text(&self) -> String {
        let mut out = self.rows.join("\n");
        if !out.is_empty() {
            out.push('\n');
        }
        out
    }

    pub fn to_fasta(&self) -> String {
        write_fasta(&self.names, &self.rows)
    }
}

/// Complete run output, saved and loaded as JSON
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MsaResults {
    pub params: AlignmentParams,
    pub model_name: String,
    pub alignment: MultipleAlignment,
    pub sum_of_pairs: i64,
    /// Final DP score of the root merge (progressive) or `None`.
    pub merge_score: Option<f64>,
    /// Index of the center sequence for center-star runs.
    pub center: Option<usize>,
    pub guide_tree_dot: Option<String>,
    pub guide_tree_newick: Option<String>,
}

impl MsaResults {
    pub fn alignment_length(&self) -> usize {
        self.alignment.column_count()
    }

    pub fn total_sequences(&self) -> usize {
        self.alignment.sequence_count()
    }
}

/// Pipeline stage reported to the UI
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Distances,
    GuideTree,
    Merging,
    Scoring,
    Done,
}

/// Progress update during a run
#[derive(Debug, Clone)]
pub struct ProgressUpdate {
    pub stage: Stage,
    pub completed: usize,
    pub total: usize,
    pub message: String,
}

impl ProgressUpdate {
    pub fn fraction(&self) -> f32 {
        if self.total == 0 {
            0.0
        } else {
            self.completed as f32 / self.total as f32
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> MultipleAlignment {
        MultipleAlignment::from_bytes(
            vec!["b".to_string(), "a".to_string()],
            vec![b"AB-DC".to_vec(), b"ABCD-".to_vec()],
        )
    }

    #[test]
    fn test_text_outputs() {
        let aln = sample();
        assert_eq!(aln.to_labeled_text(), "b: AB-DC\na: ABCD-\n");
        assert_eq!(aln.to_plain_text(), "AB-DC\nABCD-\n");
        assert_eq!(aln.to_fasta(), ">b\nAB-DC\n>a\nABCD-\n");
        assert_eq!(aln.column_count(), 5);
        assert_eq!(aln.get("a"), Some("ABCD-"));
    }

    #[test]
    fn test_sorted_by_names() {
        let order = vec!["a".to_string(), "b".to_string()];
        let aln = sample().sorted_by_names(&order);
        assert_eq!(aln.names, order);
        assert_eq!(aln.rows[0], "ABCD-");
    }

    #[test]
    fn test_params_json_roundtrip_keeps_choice() {
        let params = AlignmentParams {
            method: MsaMethod::CenterStar,
            distance: DistancePolicy::EditDistance,
            scoring: ScoringChoice::unit_costs("ABCD"),
            thread_count: ThreadCount::Fixed(2),
        };
        let json = serde_json::to_string(&params).unwrap();
        let back: AlignmentParams = serde_json::from_str(&json).unwrap();
        assert_eq!(back, params);
    }

    #[test]
    fn test_fixed_thread_count_is_at_least_one() {
        assert_eq!(ThreadCount::Fixed(0).get_count(), 1);
        assert!(ThreadCount::Auto.get_count() >= 1);
    }
}
