mod error;
mod types;
mod substitution;
mod fasta;
mod pairwise;
mod distance;
mod guide_tree;
mod profile;
mod progressive;
mod center_star;
mod sp_score;
mod pipeline;

pub use error::*;
pub use types::*;
pub use substitution::*;
pub use fasta::*;
pub use pairwise::*;
pub use distance::*;
pub use guide_tree::*;
pub use profile::*;
pub use progressive::*;
pub use center_star::*;
pub use sp_score::*;
pub use pipeline::*;
