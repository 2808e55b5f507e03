use std::{io, path::PathBuf, process::ExitStatus};

use thiserror::Error;

use crate::macs2::OutputKind;

pub type Result<T, E = PeaksError> = std::result::Result<T, E>;

#[derive(Error, Debug)]
pub enum PeaksError {
    #[error(
        "MACS2 was not found! Provide a path to macs2, set the MACS2_PATH environment \
         variable, or make sure macs2 can be found via PATH"
    )]
    MissingMacs2,
    #[error("Input file {0:?} does not exist or is not readable")]
    InputNotFound(PathBuf),
    #[error("Bad input: {0}")]
    BadInput(String),
    #[error("Invalid options: {0}")]
    InvalidOptions(&'static str),
    #[error("{tool} failed with {status}: {stderr}")]
    ToolFailed {
        tool: String,
        status: ExitStatus,
        stderr: String,
    },
    #[error("{0}")]
    UsageOrder(&'static str),
    #[error("No {0} output for this run")]
    MissingOutput(OutputKind),
    #[error("Invalid BED record {record} in {path:?}: {msg}")]
    Bed {
        path: PathBuf,
        record: usize,
        msg: String,
    },
    #[error(transparent)]
    Io(#[from] io::Error),
}
