//! PUF response model.
//!
//! A simulated arbiter PUF: a linear additive delay model with one weight
//! per stage plus a bias, evaluated on the parity (arbiter) feature vector
//! of each sub-challenge. The weights are the device secret; they are drawn
//! once from the device seed and never leave the struct.

use std::f64::consts::PI;

use rand::Rng;
use rand_chacha::ChaCha20Rng;
use rand_core::{RngCore, SeedableRng};
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::bits::BitVector;
use crate::config::ProtocolConfig;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PufError {
    #[error("challenge of {got} bits is not a whole number of {stages}-bit rows")]
    ChallengeShape { stages: usize, got: usize },
}

/// A challenge/response device. `evaluate` takes a challenge matrix of
/// `R` rows, `stages()` bits each, flattened row-major, and returns one
/// response bit per row.
pub trait Puf: Send + Sync {
    fn stages(&self) -> usize;
    fn evaluate(&self, challenge: &BitVector) -> Result<BitVector, PufError>;
}

#[derive(Zeroize, ZeroizeOnDrop)]
pub struct ArbiterPuf {
    weights: Vec<f64>,
    bias: f64,
}

impl ArbiterPuf {
    /// Build the device identified by `seed` (a manufacturing serial in a
    /// simulation). Same seed, same device.
    pub fn new(stages: usize, seed: u64) -> Self {
        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        let weights = (0..stages).map(|_| standard_normal(&mut rng)).collect();
        let bias = standard_normal(&mut rng);
        Self { weights, bias }
    }

    /// Signed delay difference for one sub-challenge. Bits map to -1/+1 and
    /// stage i sees the product of all challenge values from i to the end.
    fn delay_difference(&self, challenge: &BitVector, row: usize) -> f64 {
        let stages = self.weights.len();
        let base = row * stages;
        let mut parity = 1.0f64;
        let mut acc = self.bias;
        for i in (0..stages).rev() {
            if !challenge.bit(base + i) {
                parity = -parity;
            }
            acc += self.weights[i] * parity;
        }
        acc
    }
}

impl Puf for ArbiterPuf {
    fn stages(&self) -> usize {
        self.weights.len()
    }

    fn evaluate(&self, challenge: &BitVector) -> Result<BitVector, PufError> {
        let stages = self.weights.len();
        if stages == 0 || challenge.is_empty() || challenge.len() % stages != 0 {
            return Err(PufError::ChallengeShape { stages, got: challenge.len() });
        }
        let rows = challenge.len() / stages;
        Ok(BitVector::from_bits(
            (0..rows).map(|row| self.delay_difference(challenge, row) > 0.0),
        ))
    }
}

// Box-Muller; u1 is kept away from zero so ln stays finite.
fn standard_normal(rng: &mut ChaCha20Rng) -> f64 {
    let u1 = loop {
        let u: f64 = rng.gen();
        if u > f64::MIN_POSITIVE {
            break u;
        }
    };
    let u2: f64 = rng.gen();
    (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
}

/// Deterministic full-width challenge for enrollment.
pub fn seeded_challenge(config: &ProtocolConfig, seed: u64) -> BitVector {
    let width = config.challenge_width();
    let mut rng = ChaCha20Rng::seed_from_u64(seed);
    let mut bytes = vec![0u8; width / 8];
    rng.fill_bytes(&mut bytes);
    BitVector::from_bits((0..width).map(|i| (bytes[i / 8] >> (7 - i % 8)) & 1 == 1))
}
