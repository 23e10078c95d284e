//! Online evaluator 3 (qtrlwe2): two-level batched look-up tables over a
//! buffered window of q = d1 + d2 AP-Bits.
//!
//! Between windows the evaluator carries its position as ceil(log2 |V|)
//! encrypted state bits. Resolving a window evaluates, for every carried
//! state bit and for the acceptance bit, a public table of the window
//! transition function, addressed jointly by the buffered AP-Bits and the
//! circuit-bootstrapped state bits:
//!
//!  * first level — the table is packed 2^d1 entries per Weight-Vector
//!    and blind-rotated by the first d1 AP-Bits of the window;
//!  * second level — the remaining AP-Bits and the state selectors
//!    CMUX-collapse the packed vectors, halving their number per level.
//!
//! A full window is resolved lazily, on the step that would overflow the
//! queue; the emitted acceptance therefore lags the stream head by up to
//! one window, and a trailing partial window is never emitted.

use rayon::prelude::*;
use tfhe::core_crypto::prelude::*;
use tracing::trace;

use crate::error::{Error, Result};
use crate::graph::{Graph, State};
use crate::keys::{CircuitKey, ClientKey, FourierGgsw, GateKey, Tlwe};
use crate::ops;
use crate::parameters::{DfaParameters, PLAINTEXT_FALSE, PLAINTEXT_TRUE, STATE_BIT_LOG};

/// Default first-level look-up depth.
pub const DEFAULT_FIRST_LUT_DEPTH: usize = 8;

pub struct Qtrlwe2Runner<'keys> {
    graph: Graph,
    parameters: DfaParameters,
    gate_key: &'keys GateKey,
    circuit_key: &'keys CircuitKey,
    queue_size: usize,
    first_lut_depth: usize,
    state_bit_count: usize,
    queue: Vec<FourierGgsw>,
    /// Carried position, `None` until the first window resolves (the
    /// initial state is public and is baked into the first tables).
    state_bits: Option<Vec<Tlwe>>,
    last_result: Tlwe,
    windows_resolved: usize,
    debug_key: Option<ClientKey>,
    fft: Fft,
}

impl<'keys> Qtrlwe2Runner<'keys> {
    pub fn new(
        graph: Graph,
        parameters: DfaParameters,
        gate_key: &'keys GateKey,
        circuit_key: &'keys CircuitKey,
        queue_size: usize,
        first_lut_depth: usize,
        debug_key: Option<ClientKey>,
    ) -> Result<Self> {
        if first_lut_depth == 0 {
            return Err(Error::BadConfig("first-level depth must be nonzero".into()));
        }
        if (1usize << first_lut_depth) > parameters.polynomial_size.0 {
            return Err(Error::BadConfig(format!(
                "first-level depth {first_lut_depth} exceeds the {}-slot polynomial",
                parameters.polynomial_size.0
            )));
        }
        if queue_size <= first_lut_depth {
            return Err(Error::BadConfig(format!(
                "queue size {queue_size} leaves no second-level depth beyond {first_lut_depth}"
            )));
        }
        let state_bit_count = graph
            .state_count()
            .next_power_of_two()
            .trailing_zeros()
            .max(1) as usize;
        if queue_size + state_bit_count > 30 {
            return Err(Error::BadConfig(format!(
                "window tables over {} index bits are too large",
                queue_size + state_bit_count
            )));
        }
        let last_result = allocate_and_trivially_encrypt_new_lwe_ciphertext(
            parameters.big_lwe_dimension().to_lwe_size(),
            Plaintext(if graph.is_final(graph.initial_state()) {
                PLAINTEXT_TRUE
            } else {
                PLAINTEXT_FALSE
            }),
            parameters.ciphertext_modulus,
        );
        let fft = Fft::new(parameters.polynomial_size);
        Ok(Self {
            graph,
            parameters,
            gate_key,
            circuit_key,
            queue_size,
            first_lut_depth,
            state_bit_count,
            queue: Vec::with_capacity(queue_size),
            state_bits: None,
            last_result,
            windows_resolved: 0,
            debug_key,
            fft,
        })
    }

    /// Buffers one AP-Bit, resolving the previous window first if the
    /// queue is full. Returns whether an acceptance was emitted.
    pub fn step(&mut self, bit: FourierGgsw) -> Result<bool> {
        let mut emitted = false;
        if self.queue.len() == self.queue_size {
            self.resolve_window()?;
            emitted = true;
        }
        self.queue.push(bit);
        Ok(emitted)
    }

    pub fn windows_resolved(&self) -> usize {
        self.windows_resolved
    }

    /// Most recently emitted acceptance; before any window resolves this
    /// is the acceptance of the empty prefix.
    pub fn result(&self) -> Result<Tlwe> {
        Ok(self.last_result.clone())
    }

    /// Window transition tables: one per carried state bit plus one for
    /// acceptance. The table index packs the window word in its low
    /// `queue_size` bits (earliest input least significant) and the
    /// source state above it (absent when `from` pins the source).
    fn build_tables(&self, from: Option<State>) -> Vec<Vec<u64>> {
        let q = self.queue_size;
        let m = self.state_bit_count;
        let index_bits = if from.is_some() { q } else { q + m };
        let size = 1usize << index_bits;
        let mut tables = vec![Vec::with_capacity(size); m + 1];
        for index in 0..size {
            let source = match from {
                Some(state) => state,
                None => index >> q,
            };
            if source >= self.graph.state_count() {
                // Unreachable encodings; any value works.
                for table in tables.iter_mut() {
                    table.push(0);
                }
                continue;
            }
            let word = (0..q).map(|i| index >> i & 1 != 0);
            let target = self.graph.step_word(source, word);
            for (bit, table) in tables.iter_mut().enumerate().take(m) {
                table.push(((target >> bit & 1) as u64) << STATE_BIT_LOG);
            }
            tables[m].push(if self.graph.is_final(target) {
                PLAINTEXT_TRUE
            } else {
                PLAINTEXT_FALSE
            });
        }
        tables
    }

    fn resolve_window(&mut self) -> Result<()> {
        debug_assert_eq!(self.queue.len(), self.queue_size);
        let parameters = self.parameters;
        let fft = &self.fft;
        let d1 = self.first_lut_depth;
        let m = self.state_bit_count;

        // Circuit-bootstrap the carried state bits into CMUX selectors.
        let state_selectors: Vec<FourierGgsw> = match &self.state_bits {
            Some(bits) => bits
                .par_iter()
                .map(|bit| self.circuit_key.selector_from_state_bit(self.gate_key, bit))
                .collect(),
            None => Vec::new(),
        };
        let tables = self.build_tables(if self.state_bits.is_some() {
            None
        } else {
            Some(self.graph.initial_state())
        });

        // Selector list, least-significant index bit first: the window
        // word, then the source-state bits.
        let rotate_selectors: Vec<&FourierGgsw> = self.queue[..d1].iter().collect();
        let tree_selectors: Vec<&FourierGgsw> = self.queue[d1..]
            .iter()
            .chain(state_selectors.iter())
            .collect();

        let outputs: Vec<Tlwe> = tables
            .par_iter()
            .map(|table| {
                let layer: Vec<_> = table
                    .chunks(1 << d1)
                    .map(|chunk| {
                        let mut packed = ops::trivial_weight(chunk, &parameters);
                        ops::blind_rotate_by_selectors(&mut packed, &rotate_selectors, fft);
                        packed
                    })
                    .collect();
                let folded = ops::cmux_tree_collapse(layer, &tree_selectors, fft);
                ops::extract_slot(&folded, 0, &parameters)
            })
            .collect();

        if let Some(client_key) = &self.debug_key {
            let decoded: Vec<u64> = outputs[..m]
                .iter()
                .map(|bit| {
                    let phase = decrypt_lwe_ciphertext(&client_key.big_lwe_secret_key(), bit);
                    (phase.0 >> (STATE_BIT_LOG - 1)).wrapping_add(1) >> 1 & 1
                })
                .collect();
            trace!(window = self.windows_resolved, state_bits = ?decoded, "resolved window");
        }

        self.state_bits = Some(outputs[..m].to_vec());
        self.last_result = self
            .gate_key
            .bootstrap_sign_to_lwe(&outputs[m], PLAINTEXT_TRUE);
        self.windows_resolved += 1;
        self.queue.clear();
        Ok(())
    }
}
