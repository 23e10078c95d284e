//! Key material: client-side secret keys and the server-side evaluation
//! keys shared read-only by every evaluator of a run.
//!
//! The archived [`BootstrapKey`] record keeps the bootstrapping key in the
//! standard domain so it serializes with the library's canonical archive
//! format; [`BootstrapKey::gate_key`] converts it to the FFT domain once
//! at load time.

use aligned_vec::ABox;
use serde::{Deserialize, Serialize};
use tfhe::core_crypto::fft_impl::fft64::c64;
use tfhe::core_crypto::prelude::*;

use crate::error::{Error, Result};
use crate::parameters::DfaParameters;

/// FFT-domain TRGSW: the form of every AP-Bit consumed by an evaluator.
pub type FourierGgsw = FourierGgswCiphertext<ABox<[c64]>>;
/// Standard-domain TRGSW: the archivable form of an AP-Bit.
pub type Trgsw = GgswCiphertextOwned<u64>;
/// TRLWE Weight-Vector.
pub type Trlwe = GlweCiphertextOwned<u64>;
/// TLWE, the form of every acceptance ciphertext.
pub type Tlwe = LweCiphertextOwned<u64>;

/// Client secret keys: the small LWE key and the GLWE key whose flattened
/// form encrypts every Weight-Vector and extracted sample.
#[derive(Clone, Serialize, Deserialize)]
pub struct ClientKey {
    pub(crate) lwe_secret_key: LweSecretKeyOwned<u64>,
    pub(crate) glwe_secret_key: GlweSecretKeyOwned<u64>,
    pub(crate) parameters: DfaParameters,
}

impl ClientKey {
    pub fn generate(parameters: DfaParameters) -> Self {
        let mut seeder = new_seeder();
        let seeder = seeder.as_mut();
        let mut secret_generator =
            SecretRandomGenerator::<ActivatedRandomGenerator>::new(seeder.seed());
        let lwe_secret_key = allocate_and_generate_new_binary_lwe_secret_key(
            parameters.lwe_dimension,
            &mut secret_generator,
        );
        let glwe_secret_key = allocate_and_generate_new_binary_glwe_secret_key(
            parameters.glwe_dimension,
            parameters.polynomial_size,
            &mut secret_generator,
        );
        Self {
            lwe_secret_key,
            glwe_secret_key,
            parameters,
        }
    }

    pub fn parameters(&self) -> &DfaParameters {
        &self.parameters
    }

    pub(crate) fn big_lwe_secret_key(&self) -> LweSecretKeyOwned<u64> {
        self.glwe_secret_key.clone().into_lwe_secret_key()
    }

    /// Encrypts one atomic-proposition bit as a standard-domain TRGSW.
    pub fn encrypt_bit(&self, bit: bool) -> Trgsw {
        let mut seeder = new_seeder();
        let seeder = seeder.as_mut();
        let mut encryption_generator =
            EncryptionRandomGenerator::<ActivatedRandomGenerator>::new(seeder.seed(), seeder);
        let mut ggsw = GgswCiphertext::new(
            0u64,
            self.parameters.glwe_size(),
            self.parameters.polynomial_size,
            self.parameters.ggsw_base_log,
            self.parameters.ggsw_level,
            self.parameters.ciphertext_modulus,
        );
        encrypt_constant_ggsw_ciphertext(
            &self.glwe_secret_key,
            &mut ggsw,
            Plaintext(bit as u64),
            self.parameters.glwe_modular_std_dev,
            &mut encryption_generator,
        );
        ggsw
    }

    /// Encrypts one bit directly into the FFT domain.
    pub fn encrypt_bit_fourier(&self, bit: bool) -> FourierGgsw {
        let standard = self.encrypt_bit(bit);
        let mut fourier = FourierGgswCiphertext::new(
            self.parameters.glwe_size(),
            self.parameters.polynomial_size,
            self.parameters.ggsw_base_log,
            self.parameters.ggsw_level,
        );
        convert_standard_ggsw_ciphertext_to_fourier(&standard, &mut fourier);
        fourier
    }

    pub fn encrypt_bits(&self, bits: &[bool]) -> Vec<Trgsw> {
        bits.iter().map(|&b| self.encrypt_bit(b)).collect()
    }

    /// Encrypts a byte string, `bits_per_byte` low bits of every byte,
    /// least-significant bit first.
    pub fn encrypt_bytes(&self, bytes: &[u8], bits_per_byte: usize) -> Result<Vec<Trgsw>> {
        if bits_per_byte == 0 || bits_per_byte > 8 {
            return Err(Error::BadConfig(format!(
                "bits per byte must be in 1..=8, got {bits_per_byte}"
            )));
        }
        let mut out = Vec::with_capacity(bytes.len() * bits_per_byte);
        for &byte in bytes {
            for i in 0..bits_per_byte {
                out.push(self.encrypt_bit((byte >> i) & 1 != 0));
            }
        }
        Ok(out)
    }

    /// Decrypts an acceptance ciphertext (signed boolean encoding, under
    /// the big LWE key).
    pub fn decrypt_acceptance(&self, ciphertext: &Tlwe) -> bool {
        let big_key = self.big_lwe_secret_key();
        let phase = decrypt_lwe_ciphertext(&big_key, ciphertext);
        // Positive half of the torus means true.
        phase.0 < (1u64 << 63)
    }
}

/// Archived server-key record produced by key generation: standard-domain
/// bootstrapping key, big-to-small key switch key, and the private
/// functional packing keyswitch list used by circuit bootstrapping.
#[derive(Clone, Serialize, Deserialize)]
pub struct BootstrapKey {
    pub(crate) bootstrap_key: LweBootstrapKeyOwned<u64>,
    pub(crate) keyswitch_key: LweKeyswitchKeyOwned<u64>,
    pub(crate) packing_keys: LwePrivateFunctionalPackingKeyswitchKeyListOwned<u64>,
    pub(crate) parameters: DfaParameters,
}

impl BootstrapKey {
    pub fn generate(client_key: &ClientKey) -> Self {
        let parameters = client_key.parameters;
        let mut seeder = new_seeder();
        let seeder = seeder.as_mut();
        let mut encryption_generator =
            EncryptionRandomGenerator::<ActivatedRandomGenerator>::new(seeder.seed(), seeder);

        let bootstrap_key = par_allocate_and_generate_new_lwe_bootstrap_key(
            &client_key.lwe_secret_key,
            &client_key.glwe_secret_key,
            parameters.pbs_base_log,
            parameters.pbs_level,
            parameters.glwe_modular_std_dev,
            parameters.ciphertext_modulus,
            &mut encryption_generator,
        );

        let big_lwe_secret_key = client_key.big_lwe_secret_key();
        let keyswitch_key = allocate_and_generate_new_lwe_keyswitch_key(
            &big_lwe_secret_key,
            &client_key.lwe_secret_key,
            parameters.ks_base_log,
            parameters.ks_level,
            parameters.lwe_modular_std_dev,
            parameters.ciphertext_modulus,
            &mut encryption_generator,
        );

        let packing_keys = par_allocate_and_generate_new_circuit_bootstrap_lwe_pfpksk_list(
            &big_lwe_secret_key,
            &client_key.glwe_secret_key,
            parameters.pfks_base_log,
            parameters.pfks_level,
            parameters.glwe_modular_std_dev,
            parameters.ciphertext_modulus,
            &mut encryption_generator,
        );

        Self {
            bootstrap_key,
            keyswitch_key,
            packing_keys,
            parameters,
        }
    }

    pub fn parameters(&self) -> &DfaParameters {
        &self.parameters
    }

    /// FFT-domain gate-bootstrapping material.
    pub fn gate_key(&self) -> GateKey {
        let mut fourier_bsk = FourierLweBootstrapKey::new(
            self.bootstrap_key.input_lwe_dimension(),
            self.bootstrap_key.glwe_size(),
            self.bootstrap_key.polynomial_size(),
            self.bootstrap_key.decomposition_base_log(),
            self.bootstrap_key.decomposition_level_count(),
        );
        convert_standard_lwe_bootstrap_key_to_fourier(&self.bootstrap_key, &mut fourier_bsk);
        GateKey {
            fourier_bsk,
            keyswitch_key: self.keyswitch_key.clone(),
            parameters: self.parameters,
        }
    }

    /// Circuit-bootstrapping material; only the qtrlwe2 evaluator needs it.
    pub fn circuit_key(&self) -> CircuitKey {
        CircuitKey {
            packing_keys: self.packing_keys.clone(),
            parameters: self.parameters,
        }
    }
}

/// Runtime gate-bootstrapping key: FFT-domain bootstrap key plus the
/// big-to-small key switch key.
pub struct GateKey {
    pub(crate) fourier_bsk: FourierLweBootstrapKey<ABox<[c64]>>,
    pub(crate) keyswitch_key: LweKeyswitchKeyOwned<u64>,
    pub(crate) parameters: DfaParameters,
}

/// Runtime circuit-bootstrapping key (TLWE -> TRGSW conversion).
pub struct CircuitKey {
    pub(crate) packing_keys: LwePrivateFunctionalPackingKeyswitchKeyListOwned<u64>,
    pub(crate) parameters: DfaParameters,
}
