//! Offline evaluator: backward dynamic programming over the depth-indexed
//! reachable-state sets, consuming the input right-to-left.
//!
//! At depth d the runner holds, for every state reachable after d inputs,
//! a Weight-Vector telling whether the already-consumed suffix leads to
//! acceptance from that state. After the whole (reversed) stream has been
//! folded, the answer is the weight of the initial state.

use std::collections::HashMap;

use rayon::prelude::*;
use tfhe::core_crypto::prelude::Fft;

use crate::error::{Error, Result};
use crate::graph::{Graph, State};
use crate::keys::{FourierGgsw, GateKey, Tlwe, Trlwe};
use crate::ops;
use crate::parameters::{DfaParameters, PLAINTEXT_FALSE, PLAINTEXT_TRUE};

pub struct OfflineRunner<'keys> {
    graph: Graph,
    parameters: DfaParameters,
    gate_key: Option<&'keys GateKey>,
    /// Number of CMUX levels between refreshes.
    bootstrap_interval: usize,
    weights: HashMap<State, Trlwe>,
    /// Depth still to process; counts down from the input length to zero.
    depth: usize,
    levels_since_refresh: usize,
    fft: Fft,
}

impl<'keys> OfflineRunner<'keys> {
    /// `input_len` is the total number of AP-Bits that will be fed, in
    /// reverse stream order. `bootstrap_interval` is the number of CMUX
    /// levels between refreshes (ignored without a gate key).
    pub fn new(
        mut graph: Graph,
        input_len: usize,
        parameters: DfaParameters,
        gate_key: Option<&'keys GateKey>,
        bootstrap_interval: usize,
    ) -> Result<Self> {
        if bootstrap_interval == 0 {
            return Err(Error::BadConfig("bootstrap interval must be nonzero".into()));
        }
        graph.reserve_states_at_depth(input_len);
        let deepest = graph
            .states_at_depth(input_len)
            .expect("depth table was just reserved");
        let weights = deepest
            .iter()
            .map(|&v| {
                let encoded = if graph.is_final(v) {
                    PLAINTEXT_TRUE
                } else {
                    PLAINTEXT_FALSE
                };
                (v, ops::trivial_weight(&[encoded], &parameters))
            })
            .collect();
        let fft = Fft::new(parameters.polynomial_size);
        Ok(Self {
            graph,
            parameters,
            gate_key,
            bootstrap_interval,
            weights,
            depth: input_len,
            levels_since_refresh: 0,
            fft,
        })
    }

    /// Folds one AP-Bit; bits must arrive in reverse input order.
    pub fn step(&mut self, bit: FourierGgsw) -> Result<()> {
        if self.depth == 0 {
            return Err(Error::BadInput(
                "more ciphertexts than the declared input length".into(),
            ));
        }
        let depth = self.depth - 1;
        let live = self
            .graph
            .states_at_depth(depth)
            .expect("depth table covers the whole input");

        let weights = &self.weights;
        let graph = &self.graph;
        let fft = &self.fft;
        let mut next_weights: HashMap<State, Trlwe> = live
            .par_iter()
            .map(|&v| {
                let w0 = &weights[&graph.transition(v, false)];
                let w1 = &weights[&graph.transition(v, true)];
                (v, ops::cmux_select(w0, w1, &bit, fft))
            })
            .collect();

        self.levels_since_refresh += 1;
        if let Some(gate_key) = self.gate_key {
            if self.levels_since_refresh >= self.bootstrap_interval {
                next_weights
                    .par_iter_mut()
                    .for_each(|(_, weight)| *weight = gate_key.refresh_signed_weight(weight));
                self.levels_since_refresh = 0;
            }
        }

        self.weights = next_weights;
        self.depth = depth;
        Ok(())
    }

    /// Remaining number of AP-Bits to consume.
    pub fn remaining(&self) -> usize {
        self.depth
    }

    /// Final acceptance ciphertext; the whole stream must have been fed.
    /// The output weight is refreshed before extraction when a gate key
    /// is available.
    pub fn result(&self) -> Result<Tlwe> {
        if self.depth != 0 {
            return Err(Error::BadInput(format!(
                "stream ended early, {} ciphertexts missing",
                self.depth
            )));
        }
        let weight = &self.weights[&self.graph.initial_state()];
        let sample = ops::extract_slot(weight, 0, &self.parameters);
        match self.gate_key {
            Some(gate_key) => Ok(gate_key.bootstrap_sign_to_lwe(&sample, PLAINTEXT_TRUE)),
            None => Ok(sample),
        }
    }
}
