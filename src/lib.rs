//! Progressive MSA - Multiple Sequence Alignment Tool
//!
//! Aligns sets of protein or nucleotide sequences progressively along a
//! neighbor-joining guide tree, with a center-star alternative.

pub mod msa;

pub use msa::*;
