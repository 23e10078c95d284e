//! Homomorphic primitives shared by the evaluators: CMUX selection over
//! encrypted selectors, external products, blind rotation of packed
//! look-up tables, CMUX-tree collapse, and the bootstrapping helpers
//! carried by the runtime keys.
//!
//! All operations work on the 64-bit native torus. Sign bootstrapping
//! uses a constant test polynomial: any ciphertext whose phase lies in
//! the positive half of the torus refreshes to `+amplitude`, the rest to
//! `-amplitude`.

use tfhe::core_crypto::{
    fft_impl::fft64::crypto::ggsw::{
        add_external_product_assign, add_external_product_assign_scratch, cmux, cmux_scratch,
    },
    fft_impl::fft64::crypto::wop_pbs::{circuit_bootstrap_boolean, circuit_bootstrap_boolean_scratch},
    prelude::{polynomial_algorithms::*, *},
};

use crate::keys::{CircuitKey, FourierGgsw, GateKey, Tlwe, Trlwe};
use crate::parameters::{DfaParameters, PLAINTEXT_HALF, STATE_BIT_LOG};

/// Trivial (noiseless, keyless) Weight-Vector with the given leading
/// slots; remaining slots are zero.
pub(crate) fn trivial_weight(slots: &[u64], parameters: &DfaParameters) -> Trlwe {
    debug_assert!(slots.len() <= parameters.polynomial_size.0);
    let mut plaintexts = PlaintextList::new(0u64, PlaintextCount(parameters.polynomial_size.0));
    plaintexts.as_mut()[..slots.len()].copy_from_slice(slots);
    allocate_and_trivially_encrypt_new_glwe_ciphertext(
        parameters.glwe_size(),
        &plaintexts,
        parameters.ciphertext_modulus,
    )
}

/// Trivial Weight-Vector with every slot set to `value` (test-polynomial
/// shape, used as the sign-bootstrap accumulator).
pub(crate) fn trivial_weight_constant(value: u64, parameters: &DfaParameters) -> Trlwe {
    let plaintexts = PlaintextList::new(value, PlaintextCount(parameters.polynomial_size.0));
    allocate_and_trivially_encrypt_new_glwe_ciphertext(
        parameters.glwe_size(),
        &plaintexts,
        parameters.ciphertext_modulus,
    )
}

/// `selector ? ct1 : ct0`.
pub(crate) fn cmux_select(
    ct0: &Trlwe,
    ct1: &Trlwe,
    selector: &FourierGgsw,
    fft: &Fft,
) -> Trlwe {
    let fft = fft.as_view();
    let mut out = ct0.clone();
    let mut scratch_ct = ct1.clone();
    let mut buffers = ComputationBuffers::new();
    buffers.resize(
        cmux_scratch::<u64>(out.glwe_size(), out.polynomial_size(), fft)
            .unwrap()
            .unaligned_bytes_required(),
    );
    cmux(
        out.as_mut_view(),
        scratch_ct.as_mut_view(),
        selector.as_view(),
        fft,
        buffers.stack(),
    );
    out
}

/// `selector * ct` (selector encrypts 0 or 1).
pub(crate) fn external_product(selector: &FourierGgsw, ct: &Trlwe, fft: &Fft) -> Trlwe {
    let fft = fft.as_view();
    let mut out = GlweCiphertext::new(
        0u64,
        ct.glwe_size(),
        ct.polynomial_size(),
        ct.ciphertext_modulus(),
    );
    let mut buffers = ComputationBuffers::new();
    buffers.resize(
        add_external_product_assign_scratch::<u64>(ct.glwe_size(), ct.polynomial_size(), fft)
            .unwrap()
            .unaligned_bytes_required(),
    );
    add_external_product_assign(
        out.as_mut_view(),
        selector.as_view(),
        ct.as_view(),
        fft,
        buffers.stack(),
    );
    out
}

/// Sample-extracts one coefficient slot into a TLWE under the big key.
pub(crate) fn extract_slot(ct: &Trlwe, slot: usize, parameters: &DfaParameters) -> Tlwe {
    let mut out = LweCiphertext::new(
        0u64,
        parameters.big_lwe_dimension().to_lwe_size(),
        parameters.ciphertext_modulus,
    );
    extract_lwe_sample_from_glwe_ciphertext(ct, &mut out, MonomialDegree(slot));
    out
}

/// Blind rotation of a packed table by encrypted index bits:
/// `selectors[j]` carries index weight `2^j`. Afterwards slot 0 holds the
/// entry addressed by the encrypted index.
pub(crate) fn blind_rotate_by_selectors(lut: &mut Trlwe, selectors: &[&FourierGgsw], fft: &Fft) {
    let fft_view = fft.as_view();
    let mut buffers = ComputationBuffers::new();
    buffers.resize(
        cmux_scratch::<u64>(lut.glwe_size(), lut.polynomial_size(), fft_view)
            .unwrap()
            .unaligned_bytes_required(),
    );
    for (weight_log, selector) in selectors.iter().enumerate() {
        let mut shifted = lut.clone();
        for mut poly in shifted.as_mut_polynomial_list().iter_mut() {
            polynomial_wrapping_monic_monomial_div_assign(
                &mut poly,
                MonomialDegree(1 << weight_log),
            );
        }
        cmux(
            lut.as_mut_view(),
            shifted.as_mut_view(),
            selector.as_view(),
            fft_view,
            buffers.stack(),
        );
    }
}

/// Collapses a power-of-two layer of Weight-Vectors with one CMUX level
/// per selector, least-significant selector first. The layer is halved at
/// each level; exactly one vector remains.
pub(crate) fn cmux_tree_collapse(
    mut layer: Vec<Trlwe>,
    selectors: &[&FourierGgsw],
    fft: &Fft,
) -> Trlwe {
    debug_assert_eq!(layer.len(), 1 << selectors.len());
    for selector in selectors {
        layer = layer
            .chunks_exact(2)
            .map(|pair| cmux_select(&pair[0], &pair[1], selector, fft))
            .collect();
    }
    layer.pop().expect("tree collapse leaves one vector")
}

impl GateKey {
    /// Switches an extracted (big-key) TLWE down to the small key.
    pub(crate) fn keyswitch_down(&self, ciphertext: &Tlwe) -> Tlwe {
        let mut out = LweCiphertext::new(
            0u64,
            self.keyswitch_key.output_lwe_size(),
            self.parameters.ciphertext_modulus,
        );
        keyswitch_lwe_ciphertext(&self.keyswitch_key, ciphertext, &mut out);
        out
    }

    /// Gate bootstrap to a fresh big-key TLWE of `±amplitude` (sign of
    /// the input phase).
    pub(crate) fn bootstrap_sign_to_lwe(&self, ciphertext: &Tlwe, amplitude: u64) -> Tlwe {
        let small = self.keyswitch_down(ciphertext);
        let accumulator = trivial_weight_constant(amplitude, &self.parameters);
        let mut out = LweCiphertext::new(
            0u64,
            self.parameters.big_lwe_dimension().to_lwe_size(),
            self.parameters.ciphertext_modulus,
        );
        programmable_bootstrap_lwe_ciphertext(&small, &mut out, &accumulator, &self.fourier_bsk);
        out
    }

    /// Gate bootstrap straight into Weight-Vector form: slot 0 of the
    /// returned TRLWE holds `±amplitude`; the other slots are rotation
    /// debris and must not be read.
    pub(crate) fn bootstrap_sign_to_glwe(&self, ciphertext: &Tlwe, amplitude: u64) -> Trlwe {
        let small = self.keyswitch_down(ciphertext);
        let mut accumulator = trivial_weight_constant(amplitude, &self.parameters);
        let fft = Fft::new(self.parameters.polynomial_size);
        let fft = fft.as_view();
        let mut buffers = ComputationBuffers::new();
        buffers.resize(
            programmable_bootstrap_lwe_ciphertext_mem_optimized_requirement::<u64>(
                self.parameters.glwe_size(),
                self.parameters.polynomial_size,
                fft,
            )
            .unwrap()
            .unaligned_bytes_required(),
        );
        self.fourier_bsk.as_view().blind_rotate_assign(
            accumulator.as_mut_view(),
            small.as_ref(),
            fft,
            buffers.stack(),
        );
        accumulator
    }

    /// Refreshes a signed-boolean Weight-Vector (slot 0 in `±2^61`).
    pub(crate) fn refresh_signed_weight(&self, weight: &Trlwe) -> Trlwe {
        let sample = extract_slot(weight, 0, &self.parameters);
        self.bootstrap_sign_to_glwe(&sample, crate::parameters::PLAINTEXT_TRUE)
    }

    /// Refreshes an indicator Weight-Vector (slot 0 in `{0, 2^61}`),
    /// preserving the indicator encoding.
    pub(crate) fn refresh_indicator_weight(&self, weight: &Trlwe) -> Trlwe {
        let mut sample = extract_slot(weight, 0, &self.parameters);
        // Center on the sign boundary, bootstrap to ±2^60, shift back.
        lwe_ciphertext_plaintext_add_assign(&mut sample, Plaintext(PLAINTEXT_HALF.wrapping_neg()));
        let mut fresh = self.bootstrap_sign_to_glwe(&sample, PLAINTEXT_HALF);
        let offset = trivial_weight(&[PLAINTEXT_HALF], &self.parameters);
        glwe_ciphertext_add_assign(&mut fresh, &offset);
        fresh
    }
}

impl CircuitKey {
    /// Converts a carried state bit (TLWE of `b * 2^63` under the big
    /// key) into an FFT-domain TRGSW usable as a CMUX selector.
    pub(crate) fn selector_from_state_bit(&self, gate_key: &GateKey, state_bit: &Tlwe) -> FourierGgsw {
        let parameters = &self.parameters;
        let small = gate_key.keyswitch_down(state_bit);
        let mut ggsw = GgswCiphertext::new(
            0u64,
            parameters.glwe_size(),
            parameters.polynomial_size,
            parameters.cbs_base_log,
            parameters.cbs_level,
            parameters.ciphertext_modulus,
        );
        let fft = Fft::new(parameters.polynomial_size);
        let fft = fft.as_view();
        let mut buffers = ComputationBuffers::new();
        buffers.resize(
            circuit_bootstrap_boolean_scratch::<u64>(
                small.lwe_size(),
                gate_key.fourier_bsk.output_lwe_dimension().to_lwe_size(),
                parameters.glwe_size(),
                parameters.polynomial_size,
                fft,
            )
            .unwrap()
            .unaligned_bytes_required(),
        );
        circuit_bootstrap_boolean(
            gate_key.fourier_bsk.as_view(),
            small.as_view(),
            ggsw.as_mut_view(),
            DeltaLog(STATE_BIT_LOG),
            self.packing_keys.as_view(),
            fft,
            buffers.stack(),
        );
        let mut fourier = FourierGgswCiphertext::new(
            parameters.glwe_size(),
            parameters.polynomial_size,
            parameters.cbs_base_log,
            parameters.cbs_level,
        );
        convert_standard_ggsw_ciphertext_to_fourier(&ggsw, &mut fourier);
        fourier
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::{BootstrapKey, ClientKey};
    use crate::parameters::{PLAINTEXT_FALSE, PLAINTEXT_TRUE, TEST_PARAMETERS};

    fn sign_of(client_key: &ClientKey, ct: &Tlwe) -> bool {
        client_key.decrypt_acceptance(ct)
    }

    #[test]
    fn cmux_routes_by_selector() {
        let client_key = ClientKey::generate(TEST_PARAMETERS);
        let fft = Fft::new(TEST_PARAMETERS.polynomial_size);
        let w_true = trivial_weight(&[PLAINTEXT_TRUE], &TEST_PARAMETERS);
        let w_false = trivial_weight(&[PLAINTEXT_FALSE], &TEST_PARAMETERS);
        for bit in [false, true] {
            let selector = client_key.encrypt_bit_fourier(bit);
            let picked = cmux_select(&w_false, &w_true, &selector, &fft);
            let sample = extract_slot(&picked, 0, &TEST_PARAMETERS);
            assert_eq!(sign_of(&client_key, &sample), bit);
        }
    }

    #[test]
    fn blind_rotation_addresses_the_table() {
        let client_key = ClientKey::generate(TEST_PARAMETERS);
        let fft = Fft::new(TEST_PARAMETERS.polynomial_size);
        // Table over 2 index bits; entry 2 is the only true one.
        let table = [
            PLAINTEXT_FALSE,
            PLAINTEXT_FALSE,
            PLAINTEXT_TRUE,
            PLAINTEXT_FALSE,
        ];
        for index in 0..4usize {
            let b0 = client_key.encrypt_bit_fourier(index & 1 != 0);
            let b1 = client_key.encrypt_bit_fourier(index & 2 != 0);
            let mut lut = trivial_weight(&table, &TEST_PARAMETERS);
            blind_rotate_by_selectors(&mut lut, &[&b0, &b1], &fft);
            let sample = extract_slot(&lut, 0, &TEST_PARAMETERS);
            assert_eq!(sign_of(&client_key, &sample), index == 2);
        }
    }

    #[test]
    fn sign_bootstrap_refreshes_both_polarities() {
        let client_key = ClientKey::generate(TEST_PARAMETERS);
        let gate_key = BootstrapKey::generate(&client_key).gate_key();
        for value in [PLAINTEXT_TRUE, PLAINTEXT_FALSE] {
            let weight = trivial_weight(&[value], &TEST_PARAMETERS);
            let refreshed = gate_key.refresh_signed_weight(&weight);
            let sample = extract_slot(&refreshed, 0, &TEST_PARAMETERS);
            assert_eq!(sign_of(&client_key, &sample), value == PLAINTEXT_TRUE);
        }
    }

    #[test]
    fn circuit_bootstrap_yields_working_selectors() {
        let client_key = ClientKey::generate(TEST_PARAMETERS);
        let bootstrap_key = BootstrapKey::generate(&client_key);
        let gate_key = bootstrap_key.gate_key();
        let circuit_key = bootstrap_key.circuit_key();
        let fft = Fft::new(TEST_PARAMETERS.polynomial_size);
        let w_true = trivial_weight(&[PLAINTEXT_TRUE], &TEST_PARAMETERS);
        let w_false = trivial_weight(&[PLAINTEXT_FALSE], &TEST_PARAMETERS);
        for bit in [false, true] {
            let state_bit = allocate_and_trivially_encrypt_new_lwe_ciphertext(
                TEST_PARAMETERS.big_lwe_dimension().to_lwe_size(),
                Plaintext((bit as u64) << STATE_BIT_LOG),
                TEST_PARAMETERS.ciphertext_modulus,
            );
            let selector = circuit_key.selector_from_state_bit(&gate_key, &state_bit);
            let picked = cmux_select(&w_false, &w_true, &selector, &fft);
            let sample = extract_slot(&picked, 0, &TEST_PARAMETERS);
            assert_eq!(sign_of(&client_key, &sample), bit);
        }
    }
}
