//! Cryptographic parameter sets for the DFA evaluation engine.
//!
//! The engine works over the 64-bit native torus. One GLWE ciphertext
//! (`Weight-Vector`) packs `polynomial_size` boolean slots; AP-Bits are
//! GGSW ciphertexts in the FFT domain and act as CMUX selectors.
//!
//! Plaintext encodings used throughout the crate:
//!  * signed boolean: `true -> +2^61`, `false -> -2^61` (1/8 of the torus),
//!    the encoding of every emitted acceptance ciphertext;
//!  * indicator: `present -> 2^61`, `absent -> 0`, additive, used by the
//!    forward state-distribution weights;
//!  * state bit: `b -> b * 2^63`, the circuit-bootstrapping input
//!    convention for the window evaluator's carried state bits.

use serde::{Deserialize, Serialize};
use tfhe::core_crypto::prelude::*;

/// Encoding of boolean `true` on the torus (1/8).
pub const PLAINTEXT_TRUE: u64 = 1 << 61;
/// Encoding of boolean `false` on the torus (-1/8).
pub const PLAINTEXT_FALSE: u64 = PLAINTEXT_TRUE.wrapping_neg();
/// Half of the boolean amplitude, used to re-center indicator slots.
pub const PLAINTEXT_HALF: u64 = 1 << 60;
/// Bit position of the carried state bits (circuit-bootstrapping input).
pub const STATE_BIT_LOG: usize = 63;

/// A full parameter set: LWE/GLWE geometry, noise, and the decomposition
/// parameters of every gadget-based operation the engine performs.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct DfaParameters {
    pub lwe_dimension: LweDimension,
    pub glwe_dimension: GlweDimension,
    pub polynomial_size: PolynomialSize,
    pub lwe_modular_std_dev: StandardDev,
    pub glwe_modular_std_dev: StandardDev,
    /// Gate-bootstrapping key decomposition.
    pub pbs_base_log: DecompositionBaseLog,
    pub pbs_level: DecompositionLevelCount,
    /// Big-to-small LWE key switch decomposition.
    pub ks_base_log: DecompositionBaseLog,
    pub ks_level: DecompositionLevelCount,
    /// Decomposition of freshly encrypted AP-Bit GGSWs.
    pub ggsw_base_log: DecompositionBaseLog,
    pub ggsw_level: DecompositionLevelCount,
    /// Decomposition of circuit-bootstrapped GGSWs.
    pub cbs_base_log: DecompositionBaseLog,
    pub cbs_level: DecompositionLevelCount,
    /// Private functional packing key switch (TLWE -> TRLWE) decomposition.
    pub pfks_base_log: DecompositionBaseLog,
    pub pfks_level: DecompositionLevelCount,
    pub ciphertext_modulus: CiphertextModulus<u64>,
}

impl DfaParameters {
    pub fn glwe_size(&self) -> GlweSize {
        self.glwe_dimension.to_glwe_size()
    }

    /// LWE dimension of samples extracted from a Weight-Vector.
    pub fn big_lwe_dimension(&self) -> LweDimension {
        self.glwe_dimension
            .to_equivalent_lwe_dimension(self.polynomial_size)
    }
}

/// Production parameter set, in the tradition of the 128-bit TFHE
/// gate-bootstrapping family: GLWE k = 1, N = 1024, relative noise
/// 2^-15 (LWE) and 2^-25 (GLWE).
pub const DEFAULT_PARAMETERS: DfaParameters = DfaParameters {
    lwe_dimension: LweDimension(636),
    glwe_dimension: GlweDimension(1),
    polynomial_size: PolynomialSize(1024),
    lwe_modular_std_dev: StandardDev(3.0517578125e-5),
    glwe_modular_std_dev: StandardDev(2.9802322387695312e-8),
    pbs_base_log: DecompositionBaseLog(23),
    pbs_level: DecompositionLevelCount(1),
    ks_base_log: DecompositionBaseLog(3),
    ks_level: DecompositionLevelCount(5),
    ggsw_base_log: DecompositionBaseLog(6),
    ggsw_level: DecompositionLevelCount(3),
    cbs_base_log: DecompositionBaseLog(6),
    cbs_level: DecompositionLevelCount(3),
    pfks_base_log: DecompositionBaseLog(15),
    pfks_level: DecompositionLevelCount(2),
    ciphertext_modulus: CiphertextModulus::new_native(),
};

/// Small functional parameters for tests: fast and extremely low noise,
/// with no security whatsoever. Never use outside a test harness.
pub const TEST_PARAMETERS: DfaParameters = DfaParameters {
    lwe_dimension: LweDimension(32),
    glwe_dimension: GlweDimension(1),
    polynomial_size: PolynomialSize(512),
    lwe_modular_std_dev: StandardDev(8.881784197001252e-16),
    glwe_modular_std_dev: StandardDev(8.881784197001252e-16),
    pbs_base_log: DecompositionBaseLog(15),
    pbs_level: DecompositionLevelCount(2),
    ks_base_log: DecompositionBaseLog(3),
    ks_level: DecompositionLevelCount(7),
    ggsw_base_log: DecompositionBaseLog(12),
    ggsw_level: DecompositionLevelCount(2),
    cbs_base_log: DecompositionBaseLog(10),
    cbs_level: DecompositionLevelCount(2),
    pfks_base_log: DecompositionBaseLog(15),
    pfks_level: DecompositionLevelCount(2),
    ciphertext_modulus: CiphertextModulus::new_native(),
};
