//! Online evaluator 2 (reversed): folds the reversed, determinized,
//! minimized automaton while streaming the input forward.
//!
//! `B[s]` answers "would the reversed automaton, started in s and fed the
//! inputs seen so far back to front, accept?". Feeding one more input bit
//! x prepends it to that reversed word, so the update is a single CMUX
//! through the reversed transition of s. The acceptance of the processed
//! prefix is always `B[init]` of the reversed automaton.

use rayon::prelude::*;
use tfhe::core_crypto::prelude::Fft;

use crate::error::{Error, Result};
use crate::graph::Graph;
use crate::keys::{FourierGgsw, GateKey, Tlwe, Trlwe};
use crate::ops;
use crate::parameters::{DfaParameters, PLAINTEXT_FALSE, PLAINTEXT_TRUE};

pub struct ReversedRunner<'keys> {
    reversed: Graph,
    parameters: DfaParameters,
    gate_key: &'keys GateKey,
    bootstrap_interval: usize,
    weights: Vec<Trlwe>,
    processed: usize,
    fft: Fft,
}

impl<'keys> ReversedRunner<'keys> {
    pub fn new(
        graph: &Graph,
        parameters: DfaParameters,
        gate_key: &'keys GateKey,
        bootstrap_interval: usize,
    ) -> Result<Self> {
        if bootstrap_interval == 0 {
            return Err(Error::BadConfig("bootstrap interval must be nonzero".into()));
        }
        let reversed = graph.reversed().minimized();
        let weights = (0..reversed.state_count())
            .map(|s| {
                let encoded = if reversed.is_final(s) {
                    PLAINTEXT_TRUE
                } else {
                    PLAINTEXT_FALSE
                };
                ops::trivial_weight(&[encoded], &parameters)
            })
            .collect();
        let fft = Fft::new(parameters.polynomial_size);
        Ok(Self {
            reversed,
            parameters,
            gate_key,
            bootstrap_interval,
            weights,
            processed: 0,
            fft,
        })
    }

    pub fn step(&mut self, bit: FourierGgsw) -> Result<()> {
        let reversed = &self.reversed;
        let weights = &self.weights;
        let fft = &self.fft;
        let next_weights: Vec<Trlwe> = (0..reversed.state_count())
            .into_par_iter()
            .map(|s| {
                let w0 = &weights[reversed.transition(s, false)];
                let w1 = &weights[reversed.transition(s, true)];
                ops::cmux_select(w0, w1, &bit, fft)
            })
            .collect();
        self.weights = next_weights;
        self.processed += 1;

        if self.processed % self.bootstrap_interval == 0 {
            let gate_key = self.gate_key;
            self.weights
                .par_iter_mut()
                .for_each(|weight| *weight = gate_key.refresh_signed_weight(weight));
        }
        Ok(())
    }

    pub fn processed(&self) -> usize {
        self.processed
    }

    /// Whether the last step landed on a bootstrap boundary.
    pub fn at_boundary(&self) -> bool {
        self.processed > 0 && self.processed % self.bootstrap_interval == 0
    }

    /// Acceptance of the prefix consumed so far, freshly bootstrapped.
    pub fn result(&self) -> Result<Tlwe> {
        let weight = &self.weights[self.reversed.initial_state()];
        let sample = ops::extract_slot(weight, 0, &self.parameters);
        Ok(self.gate_key.bootstrap_sign_to_lwe(&sample, PLAINTEXT_TRUE))
    }
}
