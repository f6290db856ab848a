use std::string::FromUtf8Error;
use std::{io, num};

use thiserror::Error;

/// Defines the Result type of this crate.
pub type SynResult<T> = Result<T, SynError>;

#[derive(Debug, Error)]
pub enum SynError {
  #[error("{0}")]
  Io(#[from] io::Error),
  #[error("{0}")]
  Nix(#[from] nix::Error),
  #[error("{0}")]
  Parse(#[from] num::ParseIntError),
  #[error("{0}")]
  Analysis(#[from] AnalysisError),
  /// The command executor rejected a generated command; surfaced verbatim.
  #[error("{0}")]
  Stderr(String),
  #[error("{0}")]
  Other(&'static str),
}

impl From<&'static str> for SynError {
  fn from(err: &'static str) -> Self {
    SynError::Other(err)
  }
}

/// Failures while reading text the collaborators hand back. Single malformed
/// rule lines never raise these; they are reserved for non-recoverable input
/// such as an unrecognizable version banner.
#[derive(Debug, Error)]
pub enum AnalysisError {
  #[error("{0}")]
  FromUtf8(#[from] FromUtf8Error),
  #[error("unexpected output: {0}")]
  UnexpectedOutput(String),
}

pub type AnalysisResult<T> = Result<T, AnalysisError>;
