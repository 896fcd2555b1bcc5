use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to read config {}: {source}", path.display())]
    ConfigRead { path: PathBuf, source: io::Error },

    #[error("failed to write config {}: {source}", path.display())]
    ConfigWrite { path: PathBuf, source: io::Error },

    #[error("failed to read candidate list {}: {source}", path.display())]
    CandidatesRead { path: PathBuf, source: io::Error },

    #[error("no candidate endpoints found")]
    NoCandidates,
}

pub type Result<T> = std::result::Result<T, Error>;
