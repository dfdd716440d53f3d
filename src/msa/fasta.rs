//! FASTA parsing for the sequences to align

use bio::io::fasta;
use serde::{Deserialize, Serialize};

use super::error::{MsaError, Result};

/// Named, unaligned input sequences in file order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SequenceSet {
    pub names: Vec<String>,
    pub sequences: Vec<Vec<u8>>,
}

impl SequenceSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.sequences.is_empty()
    }

    pub fn len(&self) -> usize {
        self.sequences.len()
    }

    /// Append one sequence, rejecting empty residues and repeated names.
    pub fn push(&mut self, name: impl Into<String>, sequence: impl Into<Vec<u8>>) -> Result<()> {
        let name = name.into();
        let sequence = sequence.into();
        if sequence.is_empty() {
            return Err(MsaError::Input(format!("sequence '{}' is empty", name)));
        }
        if self.names.iter().any(|n| *n == name) {
            return Err(MsaError::Input(format!("duplicate sequence name '{}'", name)));
        }
        self.names.push(name);
        self.sequences.push(sequence);
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.names
            .iter()
            .map(String::as_str)
            .zip(self.sequences.iter().map(Vec::as_slice))
    }

    pub fn min_len(&self) -> usize {
        self.sequences.iter().map(Vec::len).min().unwrap_or(0)
    }

    pub fn max_len(&self) -> usize {
        self.sequences.iter().map(Vec::len).max().unwrap_or(0)
    }
}

/// Parse FASTA text into a [`SequenceSet`].
///
/// Names come from the first `[...]` group of the header line when there is
/// one (the convention of species-annotated protein dumps), otherwise from the
/// record id. Residues are uppercased. Text without any `>` header is read as
/// one sequence per non-empty line.
pub fn parse_fasta(text: &str) -> Result<SequenceSet> {
    let has_headers = text.lines().any(|l| l.trim_start().starts_with('>'));
    let set = if has_headers {
        parse_records(text)?
    } else {
        parse_plain_lines(text)?
    };

    if set.is_empty() {
        return Err(MsaError::Input("no sequences found in input".to_string()));
    }
    log::debug!("parsed {} sequences", set.len());
    Ok(set)
}

fn parse_records(text: &str) -> Result<SequenceSet> {
    let mut set = SequenceSet::new();
    // bio expects the first record to start on the first line
    let body = text.trim_start();
    let reader = fasta::Reader::new(body.as_bytes());

    for (i, record) in reader.records().enumerate() {
        let record = record.map_err(|e| MsaError::Parse(e.to_string()))?;
        let name = record_name(record.id(), record.desc())
            .unwrap_or_else(|| format!("Sequence_{}", i + 1));
        set.push(name, normalize_residues(record.seq()))?;
    }
    Ok(set)
}

fn parse_plain_lines(text: &str) -> Result<SequenceSet> {
    let mut set = SequenceSet::new();
    for (i, line) in text.lines().enumerate() {
        let seq = normalize_residues(line.as_bytes());
        if !seq.is_empty() {
            set.push(format!("Sequence_{}", i + 1), seq)?;
        }
    }
    Ok(set)
}

fn record_name(id: &str, desc: Option<&str>) -> Option<String> {
    let header = match desc {
        Some(d) => format!("{} {}", id, d),
        None => id.to_string(),
    };
    if let Some(start) = header.find('[') {
        if let Some(len) = header[start + 1..].find(']') {
            let inner = header[start + 1..start + 1 + len].trim();
            if !inner.is_empty() {
                return Some(inner.to_string());
            }
        }
    }
    let id = id.trim();
    (!id.is_empty()).then(|| id.to_string())
}

fn normalize_residues(raw: &[u8]) -> Vec<u8> {
    raw.iter()
        .filter(|c| !c.is_ascii_whitespace())
        .map(u8::to_ascii_uppercase)
        .collect()
}

/// Render aligned rows as FASTA with 60 residues per line.
pub fn write_fasta(names: &[String], rows: &[String]) -> String {
    let mut out = String::new();
    for (name, row) in names.iter().zip(rows) {
        out.push('>');
        out.push_str(name);
        out.push('\n');
        let bytes = row.as_bytes();
        for chunk in bytes.chunks(60) {
            out.push_str(&String::from_utf8_lossy(chunk));
            out.push('\n');
        }
    }
    out
}
