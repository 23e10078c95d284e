//! File archives for keys and ciphertexts, using the canonical bincode
//! serialization of the underlying library's entities.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::keys::{Tlwe, Trgsw};

pub fn write_archive<T: Serialize>(path: impl AsRef<Path>, value: &T) -> Result<()> {
    let file = File::create(path)?;
    bincode::serialize_into(BufWriter::new(file), value)
        .map_err(|e| Error::Fatal(format!("archive write failed: {e}")))
}

pub fn read_archive<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
    let file = File::open(path)?;
    bincode::deserialize_from(BufReader::new(file))
        .map_err(|e| Error::BadInput(format!("archive read failed: {e}")))
}

pub fn write_ciphertext_blob(path: impl AsRef<Path>, blob: &[Trgsw]) -> Result<()> {
    write_archive(path, &blob)
}

pub fn read_ciphertext_blob(path: impl AsRef<Path>) -> Result<Vec<Trgsw>> {
    read_archive(path)
}

pub fn write_acceptance(path: impl AsRef<Path>, ciphertext: &Tlwe) -> Result<()> {
    write_archive(path, ciphertext)
}

pub fn read_acceptance(path: impl AsRef<Path>) -> Result<Tlwe> {
    read_archive(path)
}
