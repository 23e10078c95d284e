//! Input-stream adapters: forward and reversed single-pass sequences of
//! FFT-domain TRGSW ciphertexts over a deserialized blob.
//!
//! The blob stores standard-domain TRGSWs (the archivable form); the FFT
//! conversion happens in [`CiphertextStream::next`], so evaluators only
//! ever see FFT-domain AP-Bits. Streams are consumed once and are not
//! restartable.

use std::path::Path;

use tfhe::core_crypto::prelude::*;

use crate::error::Result;
use crate::keys::{FourierGgsw, Trgsw};
use crate::ser;

/// Single-pass sequence of AP-Bits.
pub trait CiphertextStream {
    /// Remaining number of AP-Bits; decreases by one per [`Self::next`].
    fn size(&self) -> usize;
    /// Yields the next AP-Bit, or `None` once exhausted.
    fn next(&mut self) -> Option<FourierGgsw>;
}

fn to_fourier(standard: &Trgsw) -> FourierGgsw {
    let mut fourier = FourierGgswCiphertext::new(
        standard.glwe_size(),
        standard.polynomial_size(),
        standard.decomposition_base_log(),
        standard.decomposition_level_count(),
    );
    convert_standard_ggsw_ciphertext_to_fourier(standard, &mut fourier);
    fourier
}

/// Streams the blob first ciphertext first.
pub struct ForwardStream {
    blob: std::vec::IntoIter<Trgsw>,
}

impl ForwardStream {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::from_blob(ser::read_ciphertext_blob(path)?))
    }

    pub fn from_blob(blob: Vec<Trgsw>) -> Self {
        Self {
            blob: blob.into_iter(),
        }
    }
}

impl CiphertextStream for ForwardStream {
    fn size(&self) -> usize {
        self.blob.len()
    }

    fn next(&mut self) -> Option<FourierGgsw> {
        self.blob.next().map(|ct| to_fourier(&ct))
    }
}

/// Streams the blob last ciphertext first.
pub struct ReversedStream {
    blob: Vec<Trgsw>,
}

impl ReversedStream {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::from_blob(ser::read_ciphertext_blob(path)?))
    }

    pub fn from_blob(blob: Vec<Trgsw>) -> Self {
        Self { blob }
    }
}

impl CiphertextStream for ReversedStream {
    fn size(&self) -> usize {
        self.blob.len()
    }

    fn next(&mut self) -> Option<FourierGgsw> {
        self.blob.pop().map(|ct| to_fourier(&ct))
    }
}
