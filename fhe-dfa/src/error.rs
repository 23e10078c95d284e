//! Error taxonomy of the evaluation engine.
//!
//! Every failure surfaces to the caller; evaluators never catch and retry.
//! End-of-stream is a normal termination signal and is represented by
//! iterator exhaustion, not by an error.

use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Malformed DFA specification file.
    #[error("malformed DFA spec: {0}")]
    BadSpec(String),
    /// The external LTL translator failed or produced unparsable output.
    #[error("LTL translation failed: {0}")]
    BadLtl(String),
    /// Missing or mismatched key material for the requested mode.
    #[error("bad key material: {0}")]
    BadKey(String),
    /// Truncated or malformed ciphertext input.
    #[error("bad ciphertext input: {0}")]
    BadInput(String),
    /// Invalid evaluator or engine configuration.
    #[error("bad configuration: {0}")]
    BadConfig(String),
    /// Unrecoverable failure reported by the FHE primitives or the host.
    #[error("fatal: {0}")]
    Fatal(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
