//! The four evaluation strategies behind one tagged interface.
//!
//! Every evaluator owns its graph for its lifetime, shares the key
//! material read-only, and consumes AP-Bits in strict stream order.

mod offline;
mod qtrlwe;
mod qtrlwe2;
mod reversed;

use std::sync::atomic::{AtomicBool, Ordering};

pub use offline::OfflineRunner;
pub use qtrlwe::{QtrlweRunner, DEFAULT_BOOTSTRAP_INTERVAL};
pub use qtrlwe2::{Qtrlwe2Runner, DEFAULT_FIRST_LUT_DEPTH};
pub use reversed::ReversedRunner;

use crate::error::{Error, Result};
use crate::keys::{FourierGgsw, Tlwe};
use crate::stream::CiphertextStream;

/// A DFA evaluator over encrypted input, one of the four strategies.
pub enum Runner<'keys> {
    Offline(OfflineRunner<'keys>),
    Qtrlwe(QtrlweRunner<'keys>),
    Reversed(ReversedRunner<'keys>),
    Qtrlwe2(Qtrlwe2Runner<'keys>),
}

impl<'keys> Runner<'keys> {
    /// Consumes one AP-Bit. Returns whether a fresh output became
    /// available at this step.
    pub fn step(&mut self, bit: FourierGgsw) -> Result<bool> {
        match self {
            Runner::Offline(runner) => {
                runner.step(bit)?;
                Ok(runner.remaining() == 0)
            }
            Runner::Qtrlwe(runner) => {
                runner.step(bit)?;
                Ok(true)
            }
            Runner::Reversed(runner) => {
                runner.step(bit)?;
                Ok(runner.at_boundary())
            }
            Runner::Qtrlwe2(runner) => runner.step(bit),
        }
    }

    /// Current acceptance ciphertext, when one is defined.
    pub fn result(&self) -> Result<Option<Tlwe>> {
        match self {
            Runner::Offline(runner) => {
                if runner.remaining() == 0 {
                    runner.result().map(Some)
                } else {
                    Ok(None)
                }
            }
            Runner::Qtrlwe(runner) => runner.result().map(Some),
            Runner::Reversed(runner) => runner.result().map(Some),
            Runner::Qtrlwe2(runner) => runner.result().map(Some),
        }
    }

    /// Number of AP-Bits still expected, when known.
    pub fn size_hint(&self) -> Option<usize> {
        match self {
            Runner::Offline(runner) => Some(runner.remaining()),
            _ => None,
        }
    }

    /// Drives the runner over a whole stream. The stop flag is checked
    /// between steps and is the only cancellation point; cancellation
    /// reports how much input was left unconsumed.
    pub fn run_to_end(
        &mut self,
        stream: &mut dyn CiphertextStream,
        stop: Option<&AtomicBool>,
    ) -> Result<()> {
        while let Some(bit) = stream.next() {
            if let Some(flag) = stop {
                if flag.load(Ordering::Relaxed) {
                    return Err(Error::Fatal(format!(
                        "evaluation stopped with {} ciphertexts unconsumed",
                        stream.size() + 1
                    )));
                }
            }
            self.step(bit)?;
        }
        Ok(())
    }
}
