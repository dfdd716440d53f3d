//! Substitution models: residue/gap scoring tables shared by every aligner
//!
//! A model is loaded once, treated as immutable, and passed by reference into
//! the pairwise, profile and center-star aligners as well as the sum-of-pairs
//! scorer.

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::error::{MsaError, Result};

/// Gap symbol used in every aligned string.
pub const GAP: u8 = b'-';

/// Whether the model's numbers are similarities to maximize or costs to minimize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Objective {
    #[default]
    Maximize,
    Minimize,
}

impl Objective {
    /// True when `candidate` is strictly better than `incumbent`.
    ///
    /// Equal values never improve, which is what gives earlier candidates
    /// precedence on ties.
    pub fn improves<T: PartialOrd>(self, candidate: T, incumbent: T) -> bool {
        match self {
            Self::Maximize => candidate > incumbent,
            Self::Minimize => candidate < incumbent,
        }
    }

    /// Turn an optimal alignment score into a dissimilarity for clustering.
    pub fn score_to_distance(self, score: f64) -> f64 {
        match self {
            Self::Maximize => -score,
            Self::Minimize => score,
        }
    }
}

/// Symmetric score lookup over an alphabet plus the gap symbol.
#[derive(Debug, Clone)]
pub struct SubstitutionModel {
    name: String,
    /// Symbol for each dense index; the gap is always present.
    symbols: Vec<u8>,
    /// Byte value -> dense index.
    lookup: Vec<Option<usize>>,
    /// Row-major `symbols.len()` x `symbols.len()` table.
    scores: Vec<i32>,
    gap_index: usize,
    objective: Objective,
}

impl SubstitutionModel {
    fn from_parts(
        name: String,
        symbols: Vec<u8>,
        scores: Vec<i32>,
        objective: Objective,
    ) -> Result<Self> {
        let mut lookup = vec![None; 256];
        for (idx, &sym) in symbols.iter().enumerate() {
            if lookup[sym as usize].is_some() {
                return Err(MsaError::Parse(format!(
                    "duplicate symbol '{}' in substitution table",
                    sym as char
                )));
            }
            lookup[sym as usize] = Some(idx);
        }
        let gap_index = lookup[GAP as usize].ok_or_else(|| {
            MsaError::Parse("substitution table has no gap ('-') row/column".to_string())
        })?;

        Ok(Self {
            name,
            symbols,
            lookup,
            scores,
            gap_index,
            objective,
        })
    }

    /// Parse a whitespace-separated square table.
    ///
    /// The first non-comment line lists the column symbols; each following
    /// line is a row symbol followed by one integer per column. Rows may come
    /// in any order but every header symbol needs exactly one row.
    pub fn from_table_str(name: &str, text: &str) -> Result<Self> {
        let mut lines = text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && !l.starts_with('#'));

        let header = lines
            .next()
            .ok_or_else(|| MsaError::Parse("substitution table is empty".to_string()))?;
        let symbols = header
            .split_whitespace()
            .map(parse_symbol)
            .collect::<Result<Vec<u8>>>()?;
        let dim = symbols.len();

        let mut column_of = vec![None; 256];
        for (idx, &sym) in symbols.iter().enumerate() {
            column_of[sym as usize] = Some(idx);
        }

        let mut rows: Vec<Option<Vec<i32>>> = vec![None; dim];
        for (line_no, line) in lines.enumerate() {
            let mut fields = line.split_whitespace();
            let row_sym = match fields.next() {
                Some(f) => parse_symbol(f)?,
                None => continue,
            };
            let row_idx = column_of[row_sym as usize].ok_or_else(|| {
                MsaError::Parse(format!(
                    "row symbol '{}' does not appear in the header",
                    row_sym as char
                ))
            })?;
            let values = fields
                .map(|f| {
                    f.parse::<i32>().map_err(|_| {
                        MsaError::Parse(format!(
                            "non-integer score '{}' in row '{}'",
                            f, row_sym as char
                        ))
                    })
                })
                .collect::<Result<Vec<i32>>>()?;
            if values.len() != dim {
                return Err(MsaError::Parse(format!(
                    "row '{}' (data line {}) has {} scores, expected {}",
                    row_sym as char,
                    line_no + 1,
                    values.len(),
                    dim
                )));
            }
            if rows[row_idx].replace(values).is_some() {
                return Err(MsaError::Parse(format!(
                    "duplicate row for symbol '{}'",
                    row_sym as char
                )));
            }
        }

        let mut scores = Vec::with_capacity(dim * dim);
        for (idx, row) in rows.into_iter().enumerate() {
            let row = row.ok_or_else(|| MsaError::ScoreLookup {
                a: symbols[idx] as char,
                b: symbols[idx] as char,
            })?;
            scores.extend(row);
        }

        for i in 0..dim {
            for j in (i + 1)..dim {
                if scores[i * dim + j] != scores[j * dim + i] {
                    return Err(MsaError::Parse(format!(
                        "asymmetric scores for ('{}', '{}'): {} vs {}",
                        symbols[i] as char,
                        symbols[j] as char,
                        scores[i * dim + j],
                        scores[j * dim + i]
                    )));
                }
            }
        }

        let model = Self::from_parts(name.to_string(), symbols, scores, Objective::Maximize)?;
        log::debug!(
            "loaded substitution table '{}' with {} residues",
            model.name,
            model.residue_count()
        );
        Ok(model)
    }

    /// Load a table from disk; the file stem becomes the model name.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "custom".to_string());
        Self::from_table_str(&name, &text)
    }

    /// BLOSUM62 over the 20 amino acids plus B, Z, X, with -4 for any
    /// residue against a gap.
    pub fn blosum62() -> Self {
        Self::from_table_str("BLOSUM62", BLOSUM62_TABLE)
            .expect("built-in BLOSUM62 table is well formed")
    }

    /// One score for identical residues, one for different residues, one for
    /// any residue against a gap (gap/gap scores as a match).
    pub fn uniform(
        alphabet: &[u8],
        match_score: i32,
        mismatch_score: i32,
        gap_score: i32,
        objective: Objective,
    ) -> Result<Self> {
        let mut symbols: Vec<u8> = Vec::with_capacity(alphabet.len() + 1);
        for &c in alphabet {
            let c = c.to_ascii_uppercase();
            if c == GAP || c.is_ascii_whitespace() {
                return Err(MsaError::Input(format!(
                    "'{}' cannot be used as a residue symbol",
                    c as char
                )));
            }
            if !symbols.contains(&c) {
                symbols.push(c);
            }
        }
        if symbols.is_empty() {
            return Err(MsaError::Input("alphabet is empty".to_string()));
        }
        symbols.push(GAP);

        let dim = symbols.len();
        let gap = dim - 1;
        let mut scores = vec![0; dim * dim];
        for i in 0..dim {
            for j in 0..dim {
                scores[i * dim + j] = if i == j {
                    match_score
                } else if i == gap || j == gap {
                    gap_score
                } else {
                    mismatch_score
                };
            }
        }

        Self::from_parts(
            format!("uniform({}/{}/{})", match_score, mismatch_score, gap_score),
            symbols,
            scores,
            objective,
        )
    }

    pub fn with_objective(mut self, objective: Objective) -> Self {
        self.objective = objective;
        self
    }

    pub fn objective(&self) -> Objective {
        self.objective
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of symbols including the gap.
    pub fn symbol_count(&self) -> usize {
        self.symbols.len()
    }

    /// Number of residue symbols (the gap excluded).
    pub fn residue_count(&self) -> usize {
        self.symbols.len() - 1
    }

    pub fn gap_index(&self) -> usize {
        self.gap_index
    }

    pub fn symbol(&self, index: usize) -> u8 {
        self.symbols[index]
    }

    pub fn index_of(&self, symbol: u8) -> Option<usize> {
        self.lookup[symbol as usize]
    }

    /// Residue symbols in table order.
    pub fn residues(&self) -> impl Iterator<Item = u8> + '_ {
        self.symbols.iter().copied().filter(|&s| s != GAP)
    }

    /// Score for a symbol pair; either side may be the gap.
    pub fn score(&self, a: u8, b: u8) -> Result<i32> {
        match (self.index_of(a), self.index_of(b)) {
            (Some(i), Some(j)) => Ok(self.score_by_index(i, j)),
            _ => Err(MsaError::ScoreLookup {
                a: a as char,
                b: b as char,
            }),
        }
    }

    /// Score by dense indices obtained from [`Self::index_of`].
    pub fn score_by_index(&self, i: usize, j: usize) -> i32 {
        self.scores[i * self.symbols.len() + j]
    }

    /// Reject sequences with symbols outside the residue alphabet.
    pub fn validate_sequence(&self, name: &str, seq: &[u8]) -> Result<()> {
        if let Some(pos) = seq
            .iter()
            .position(|&c| c == GAP || self.index_of(c).is_none())
        {
            return Err(MsaError::Input(format!(
                "sequence '{}' has symbol '{}' at position {} outside the {} alphabet",
                name,
                seq[pos] as char,
                pos + 1,
                self.name
            )));
        }
        Ok(())
    }
}

fn parse_symbol(field: &str) -> Result<u8> {
    match field.as_bytes() {
        [c] if c.is_ascii_graphic() => Ok(c.to_ascii_uppercase()),
        _ => Err(MsaError::Parse(format!(
            "'{}' is not a single-character symbol",
            field
        ))),
    }
}

const BLOSUM62_TABLE: &str = "\
     A  R  N  D  C  Q  E  G  H  I  L  K  M  F  P  S  T  W  Y  V  B  Z  X  -
A    4 -1 -2 -2  0 -1 -1  0 -2 -1 -1 -1 -1 -2 -1  1  0 -3 -2  0 -2 -1  0 -4
R   -1  5  0 -2 -3  1  0 -2  0 -3 -2  2 -1 -3 -2 -1 -1 -3 -2 -3 -1  0 -1 -4
N   -2  0  6  1 -3  0  0  0  1 -3 -3  0 -2 -3 -2  1  0 -4 -2 -3  3  0 -1 -4
D   -2 -2  1  6 -3  0  2 -1 -1 -3 -4 -1 -3 -3 -1  0 -1 -4 -3 -3  4  1 -1 -4
C    0 -3 -3 -3  9 -3 -4 -3 -3 -1 -1 -3 -1 -2 -3 -1 -1 -2 -2 -1 -3 -3 -2 -4
Q   -1  1  0  0 -3  5  2 -2  0 -3 -2  1  0 -3 -1  0 -1 -2 -1 -2  0  3 -1 -4
E   -1  0  0  2 -4  2  5 -2  0 -3 -3  1 -2 -3 -1  0 -1 -3 -2 -2  1  4 -1 -4
G    0 -2  0 -1 -3 -2 -2  6 -2 -4 -4 -2 -3 -3 -2  0 -2 -2 -3 -3 -1 -2 -1 -4
H   -2  0  1 -1 -3  0  0 -2  8 -3 -3 -1 -2 -1 -2 -1 -2 -2  2 -3  0  0 -1 -4
I   -1 -3 -3 -3 -1 -3 -3 -4 -3  4  2 -3  1  0 -3 -2 -1 -3 -1  3 -3 -3 -1 -4
L   -1 -2 -3 -4 -1 -2 -3 -4 -3  2  4 -2  2  0 -3 -2 -1 -2 -1  1 -4 -3 -1 -4
K   -1  2  0 -1 -3  1  1 -2 -1 -3 -2  5 -1 -3 -1  0 -1 -3 -2 -2  0  1 -1 -4
M   -1 -1 -2 -3 -1  0 -2 -3 -2  1  2 -1  5  0 -2 -1 -1 -1 -1  1 -3 -1 -1 -4
F   -2 -3 -3 -3 -2 -3 -3 -3 -1  0  0 -3  0  6 -4 -2 -2  1  3 -1 -3 -3 -1 -4
P   -1 -2 -2 -1 -3 -1 -1 -2 -2 -3 -3 -1 -2 -4  7 -1 -1 -4 -3 -2 -2 -1 -2 -4
S    1 -1  1  0 -1  0  0  0 -1 -2 -2  0 -1 -2 -1  4  1 -3 -2 -2  0  0  0 -4
T    0 -1  0 -1 -1 -1 -1 -2 -2 -1 -1 -1 -1 -2 -1  1  5 -2 -2  0 -1 -1  0 -4
W   -3 -3 -4 -4 -2 -2 -3 -2 -2 -3 -2 -3 -1  1 -4 -3 -2 11  2 -3 -4 -3 -2 -4
Y   -2 -2 -2 -3 -2 -1 -2 -3  2 -1 -1 -2 -1  3 -3 -2 -2  2  7 -1 -3 -2 -1 -4
V    0 -3 -3 -3 -1 -2 -2 -3 -3  3  1 -2  1 -1 -2 -2  0 -3 -1  4 -3 -2 -1 -4
B   -2 -1  3  4 -3  0  1 -1  0 -3 -4  0 -3 -3 -2  0 -1 -4 -3 -3  4  1 -1 -4
Z   -1  0  0  1 -3  3  4 -2  0 -3 -3  1 -1 -3 -1  0 -1 -3 -2 -2  1  4 -1 -4
X    0 -1 -1 -1 -2 -1 -1 -1 -1 -1 -1 -1 -1 -1 -2  0  0 -2 -1 -1 -1 -1 -1 -4
-   -4 -4 -4 -4 -4 -4 -4 -4 -4 -4 -4 -4 -4 -4 -4 -4 -4 -4 -4 -4 -4 -4 -4  1
";

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_blosum62_lookup() {
        let m = SubstitutionModel::blosum62();
        assert_eq!(m.residue_count(), 23);
        assert_eq!(m.score(b'A', b'A').unwrap(), 4);
        assert_eq!(m.score(b'W', b'W').unwrap(), 11);
        assert_eq!(m.score(b'A', b'-').unwrap(), -4);
        assert_eq!(m.score(b'-', b'W').unwrap(), -4);
        assert_eq!(m.score(b'E', b'Q').unwrap(), m.score(b'Q', b'E').unwrap());
    }

    #[test]
    fn test_blosum62_is_symmetric() {
        let m = SubstitutionModel::blosum62();
        for i in 0..m.symbol_count() {
            for j in 0..m.symbol_count() {
                assert_eq!(m.score_by_index(i, j), m.score_by_index(j, i));
            }
        }
    }

    #[test]
    fn test_unknown_symbol_is_lookup_error() {
        let m = SubstitutionModel::blosum62();
        assert!(matches!(
            m.score(b'J', b'A'),
            Err(MsaError::ScoreLookup { a: 'J', b: 'A' })
        ));
    }

    #[test]
    fn test_parse_small_table() {
        let text = "# toy\n   A  C  -\nA  1 -1 -2\nC -1  1 -2\n- -2 -2  0\n";
        let m = SubstitutionModel::from_table_str("toy", text).unwrap();
        assert_eq!(m.residues().collect::<Vec<_>>(), b"AC".to_vec());
        assert_eq!(m.score(b'C', b'-').unwrap(), -2);
        assert_eq!(m.objective(), Objective::Maximize);
    }

    #[test]
    fn test_missing_row_is_rejected() {
        let text = "   A  C  -\nA  1 -1 -2\n- -2 -2  0\n";
        assert!(matches!(
            SubstitutionModel::from_table_str("toy", text),
            Err(MsaError::ScoreLookup { a: 'C', b: 'C' })
        ));
    }

    #[test]
    fn test_short_row_is_rejected() {
        let text = "   A  C  -\nA  1 -1\nC -1  1 -2\n- -2 -2  0\n";
        assert!(matches!(
            SubstitutionModel::from_table_str("toy", text),
            Err(MsaError::Parse(_))
        ));
    }

    #[test]
    fn test_asymmetric_table_is_rejected() {
        let text = "   A  C  -\nA  1  0 -2\nC -1  1 -2\n- -2 -2  0\n";
        assert!(matches!(
            SubstitutionModel::from_table_str("toy", text),
            Err(MsaError::Parse(_))
        ));
    }

    #[test]
    fn test_table_without_gap_is_rejected() {
        let text = "   A  C\nA  1 -1\nC -1  1\n";
        assert!(SubstitutionModel::from_table_str("toy", text).is_err());
    }

    #[test]
    fn test_from_path() {
        let mut file = tempfile::Builder::new().suffix(".txt").tempfile().unwrap();
        write!(file, "  A -\nA 2 -1\n- -1 0\n").unwrap();
        let m = SubstitutionModel::from_path(file.path()).unwrap();
        assert_eq!(m.score(b'A', b'A').unwrap(), 2);
        assert!(!m.name().is_empty());
    }

    #[test]
    fn test_uniform_model() {
        let m = SubstitutionModel::uniform(b"acgt", 0, 3, 1, Objective::Minimize).unwrap();
        assert_eq!(m.score(b'A', b'A').unwrap(), 0);
        assert_eq!(m.score(b'A', b'G').unwrap(), 3);
        assert_eq!(m.score(b'T', b'-').unwrap(), 1);
        assert_eq!(m.objective(), Objective::Minimize);
    }

    #[test]
    fn test_validate_sequence() {
        let m = SubstitutionModel::uniform(b"ACGT", 1, -1, -2, Objective::Maximize).unwrap();
        assert!(m.validate_sequence("ok", b"ACGT").is_ok());
        assert!(matches!(
            m.validate_sequence("bad", b"ACXT"),
            Err(MsaError::Input(_))
        ));
        assert!(m.validate_sequence("gapped", b"AC-T").is_err());
    }

    #[test]
    fn test_objective_tie_never_improves() {
        assert!(Objective::Maximize.improves(2, 1));
        assert!(!Objective::Maximize.improves(1, 1));
        assert!(Objective::Minimize.improves(1, 2));
        assert!(!Objective::Minimize.improves(2.0, 2.0));
        assert_eq!(Objective::Maximize.score_to_distance(5.0), -5.0);
        assert_eq!(Objective::Minimize.score_to_distance(5.0), 5.0);
    }
}
