//! Standard-crypto implementations.
//!
//! `SeededRandom` is deterministic and only suitable for simulations and
//! reproducible tests; production callers use `OsRandom`.

use super::traits::*;
use rand::{rngs::OsRng, RngCore};
use rand_chacha::ChaCha20Rng;
use rand_core::SeedableRng;
use sha2::{Digest, Sha256};

pub struct StdCrypto;

impl Hash for StdCrypto {
    fn sha256(&self, data: &[u8]) -> [u8; 32] {
        let mut h = Sha256::new();
        h.update(data);
        let out = h.finalize();
        let mut r = [0u8; 32];
        r.copy_from_slice(&out);
        r
    }
}

pub struct OsRandom;

impl RandomSource for OsRandom {
    fn fill(&mut self, dest: &mut [u8]) {
        OsRng.fill_bytes(dest);
    }
}

pub struct SeededRandom(ChaCha20Rng);

impl SeededRandom {
    pub fn from_seed(seed: u64) -> Self {
        Self(ChaCha20Rng::seed_from_u64(seed))
    }
}

impl RandomSource for SeededRandom {
    fn fill(&mut self, dest: &mut [u8]) {
        self.0.fill_bytes(dest);
    }
}
