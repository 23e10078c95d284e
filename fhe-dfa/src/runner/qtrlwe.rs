//! Online evaluator 1 (qtrlwe): forward dynamic programming with one
//! indicator Weight-Vector per state.
//!
//! Slot 0 of `W[v]` holds the indicator of "the run so far ends in v"
//! (`{0, 2^61}` encoding, additive). A step routes every weight through
//! the encrypted input bit with one external product per state, then
//! accumulates into the successor states; accumulation is partitioned by
//! target state, so parallel writes stay disjoint.

use rayon::prelude::*;
use tfhe::core_crypto::algorithms::slice_algorithms::slice_wrapping_sub_assign;
use tfhe::core_crypto::prelude::*;

use crate::error::{Error, Result};
use crate::graph::Graph;
use crate::keys::{FourierGgsw, GateKey, Tlwe, Trlwe};
use crate::ops;
use crate::parameters::{DfaParameters, PLAINTEXT_HALF, PLAINTEXT_TRUE};

/// Default bootstrap interval: refresh after every input.
pub const DEFAULT_BOOTSTRAP_INTERVAL: usize = 1;

pub struct QtrlweRunner<'keys> {
    graph: Graph,
    parameters: DfaParameters,
    gate_key: Option<&'keys GateKey>,
    bootstrap_interval: usize,
    weights: Vec<Trlwe>,
    processed: usize,
    fft: Fft,
}

impl<'keys> QtrlweRunner<'keys> {
    pub fn new(
        graph: Graph,
        parameters: DfaParameters,
        gate_key: Option<&'keys GateKey>,
        bootstrap_interval: usize,
    ) -> Result<Self> {
        if bootstrap_interval == 0 {
            return Err(Error::BadConfig("bootstrap interval must be nonzero".into()));
        }
        let weights = (0..graph.state_count())
            .map(|v| {
                let encoded = if v == graph.initial_state() {
                    PLAINTEXT_TRUE
                } else {
                    0
                };
                ops::trivial_weight(&[encoded], &parameters)
            })
            .collect();
        let fft = Fft::new(parameters.polynomial_size);
        Ok(Self {
            graph,
            parameters,
            gate_key,
            bootstrap_interval,
            weights,
            processed: 0,
            fft,
        })
    }

    pub fn step(&mut self, bit: FourierGgsw) -> Result<()> {
        let fft = &self.fft;
        let weights = &self.weights;

        // routed[u] = bit * W[u]: the mass leaving u along its 1-edge.
        // The mass along the 0-edge is W[u] - routed[u].
        let routed: Vec<Trlwe> = weights
            .par_iter()
            .map(|w| ops::external_product(&bit, w, fft))
            .collect();

        let graph = &self.graph;
        let parameters = self.parameters;
        let predecessors = graph.predecessors();
        let next_weights: Vec<Trlwe> = (0..graph.state_count())
            .into_par_iter()
            .map(|v| {
                let mut acc = GlweCiphertext::new(
                    0u64,
                    parameters.glwe_size(),
                    parameters.polynomial_size,
                    parameters.ciphertext_modulus,
                );
                for &u in &predecessors[v][1] {
                    glwe_ciphertext_add_assign(&mut acc, &routed[u]);
                }
                for &u in &predecessors[v][0] {
                    glwe_ciphertext_add_assign(&mut acc, &weights[u]);
                    slice_wrapping_sub_assign(acc.as_mut(), routed[u].as_ref());
                }
                acc
            })
            .collect();
        self.weights = next_weights;
        self.processed += 1;

        if let Some(gate_key) = self.gate_key {
            if self.processed % self.bootstrap_interval == 0 {
                self.weights
                    .par_iter_mut()
                    .for_each(|weight| *weight = gate_key.refresh_indicator_weight(weight));
            }
        }
        Ok(())
    }

    pub fn processed(&self) -> usize {
        self.processed
    }

    /// On-demand acceptance: the sum of the final-state indicators,
    /// re-centered to the signed encoding, refreshed when possible.
    pub fn result(&self) -> Result<Tlwe> {
        let mut sum = GlweCiphertext::new(
            0u64,
            self.parameters.glwe_size(),
            self.parameters.polynomial_size,
            self.parameters.ciphertext_modulus,
        );
        for v in self.graph.final_states() {
            glwe_ciphertext_add_assign(&mut sum, &self.weights[v]);
        }
        let mut sample = ops::extract_slot(&sum, 0, &self.parameters);
        lwe_ciphertext_plaintext_add_assign(&mut sample, Plaintext(PLAINTEXT_HALF.wrapping_neg()));
        match self.gate_key {
            Some(gate_key) => Ok(gate_key.bootstrap_sign_to_lwe(&sample, PLAINTEXT_TRUE)),
            None => Ok(sample),
        }
    }
}
