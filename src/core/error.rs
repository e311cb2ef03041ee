use std::path::PathBuf;

use thiserror::Error;

use super::Address;

pub type SymResult<T> = Result<T, Error>;

/// Structural problems in a map file
#[derive(Error, Debug, PartialEq, Eq)]
pub enum MapFault {
    #[error("unexpected first line '{0}'")]
    UnexpectedHeader(String),
    #[error("missing section '{0}'")]
    MissingSection(&'static str),
    #[error("symbol at {address:#x} on line {line} is below the previous symbol at {previous:#x}")]
    SymbolOutOfOrder {
        line: usize,
        previous: Address,
        address: Address,
    },
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Malformed map file: {0}")]
    MalformedMapFile(MapFault),
    #[error("Unable to read map {}: {source}", .path.display())]
    MapUnreadable {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("No symbol at or below {0:#x}")]
    UnresolvedAddress(Address),
    #[error("Malformed trace line '{0}'")]
    MalformedTraceLine(String),
    #[error("'{0}' is not a hex address")]
    InvalidUserInput(String),
    #[error("Unknown command '{0}'")]
    UnknownCommand(String),
    #[error("Insufficient arguments")]
    InsufficientArguments,
    #[error("Too many arguments")]
    TooManyArguments,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<MapFault> for Error {
    fn from(fault: MapFault) -> Self {
        Self::MalformedMapFile(fault)
    }
}
