//! Peak calling with MACS2 for ChIP-seq and ATAC-seq, with optional removal of
//! peaks in blacklisted regions.
pub mod blacklist;
pub mod error;
pub mod input;
pub mod macs2;
pub mod peaks;
pub mod utils;

pub use blacklist::{Blacklist, FilterStats};
pub use error::PeaksError;
pub use input::BamInput;
pub use peaks::{ChipSeqPeaks, ChipSeqPeaksBuilder};
