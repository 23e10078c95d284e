//! Homomorphic evaluation of deterministic finite automata over TFHE
//! ciphertexts.
//!
//! The engine evaluates a public DFA over a stream of encrypted bits and
//! produces, per requested output point, a TLWE ciphertext of the
//! acceptance of the run so far; neither the evaluator nor the automaton
//! ever observes a plaintext input bit.
//!
//! Four strategies are provided behind [`runner::Runner`]:
//!
//!  * offline — backward dynamic programming over the reversed input,
//!    bounded by the states reachable at each depth;
//!  * qtrlwe — forward per-state weights with periodic bootstrapping;
//!  * reversed — forward folding of the reversed automaton, outputs on
//!    bootstrap boundaries;
//!  * qtrlwe2 — batched two-level look-up tables over a buffered window
//!    of inputs, amortizing bootstrapping across the window.
//!
//! The automaton is described in a small textual format (see
//! [`graph::Graph::from_spec_text`]) or compiled from an LTL formula by
//! an external translator (see [`ltl`]).

pub mod error;
pub mod graph;
pub mod keys;
pub mod ltl;
mod ops;
pub mod parameters;
pub mod runner;
pub mod ser;
pub mod stream;

pub use error::{Error, Result};
pub use graph::Graph;
pub use keys::{BootstrapKey, CircuitKey, ClientKey, GateKey};
pub use parameters::{DfaParameters, DEFAULT_PARAMETERS};
pub use runner::Runner;
