//! Alignment inputs, either already on disk or held in memory.

use std::{
    fs::{self, File},
    io::Read,
    path::{Path, PathBuf},
};

use crate::error::{PeaksError, Result};

/// Every BAM file is a BGZF container, which starts with the gzip magic bytes.
const BGZF_MAGIC: [u8; 2] = [0x1f, 0x8b];

#[derive(Debug, Clone)]
pub enum BamInput {
    Bytes(Vec<u8>),
    Path(PathBuf),
}

impl BamInput {
    /// Fail before any external tool runs if the input is missing or clearly
    /// not a BAM file.
    pub fn check(&self) -> Result<()> {
        match self {
            BamInput::Bytes(bytes) => {
                if bytes.is_empty() {
                    return Err(PeaksError::BadInput("BAM input is empty".to_string()));
                }
                check_magic(bytes, "in-memory BAM")
            }
            BamInput::Path(path) => {
                if path.is_dir() {
                    return Err(PeaksError::BadInput(format!(
                        "{} is a directory, expected a BAM file",
                        path.display()
                    )));
                }
                let mut file =
                    File::open(path).map_err(|_| PeaksError::InputNotFound(path.clone()))?;
                let mut magic = [0u8; 2];
                file.read_exact(&mut magic).map_err(|_| {
                    PeaksError::BadInput(format!("{} is too short to be a BAM file", path.display()))
                })?;
                check_magic(&magic, &path.display().to_string())
            }
        }
    }

    /// Path MACS2 should read this input from. In-memory inputs are written to
    /// `dir/file_name` first.
    pub fn materialize(&self, dir: &Path, file_name: &str) -> Result<PathBuf> {
        match self {
            BamInput::Bytes(bytes) => {
                let path = dir.join(file_name);
                fs::write(&path, bytes)?;
                log::debug!("Wrote {} bytes to {}", bytes.len(), path.display());
                Ok(path)
            }
            BamInput::Path(path) => Ok(path.clone()),
        }
    }

    /// File name up to its first '.', so `sample1.sorted.bam` gives `sample1`.
    pub fn sample_name(&self) -> Option<String> {
        match self {
            BamInput::Bytes(_) => None,
            BamInput::Path(path) => {
                let file_name = path.file_name()?.to_str()?;
                let name = file_name.split('.').next()?;
                if name.is_empty() {
                    None
                } else {
                    Some(name.to_string())
                }
            }
        }
    }
}

fn check_magic(bytes: &[u8], what: &str) -> Result<()> {
    if bytes.starts_with(&BGZF_MAGIC) {
        Ok(())
    } else {
        Err(PeaksError::BadInput(format!(
            "{what} is not BGZF compressed, expected a BAM file"
        )))
    }
}

impl From<Vec<u8>> for BamInput {
    fn from(bytes: Vec<u8>) -> Self {
        BamInput::Bytes(bytes)
    }
}

impl From<&[u8]> for BamInput {
    fn from(bytes: &[u8]) -> Self {
        BamInput::Bytes(bytes.to_vec())
    }
}

impl From<PathBuf> for BamInput {
    fn from(path: PathBuf) -> Self {
        BamInput::Path(path)
    }
}

impl From<&Path> for BamInput {
    fn from(path: &Path) -> Self {
        BamInput::Path(path.to_path_buf())
    }
}

impl From<&str> for BamInput {
    fn from(path: &str) -> Self {
        BamInput::Path(PathBuf::from(path))
    }
}
