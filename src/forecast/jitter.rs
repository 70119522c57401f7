//! Multiplicative jitter applied to the compressed congestion ratio.
//!
//! The forecaster draws one factor per call so repeated requests for the same
//! station do not return identical numbers.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::{Mutex, PoisonError};

pub const JITTER_MIN: f64 = 0.9;
pub const JITTER_MAX: f64 = 1.1;

pub trait Jitter: Send + Sync + std::fmt::Debug {
    /// Next factor, within `[JITTER_MIN, JITTER_MAX)` for the random sources.
    fn factor(&self) -> f64;
}

/// Fresh draw from the thread-local generator on every call.
#[derive(Debug, Default, Clone, Copy)]
pub struct UniformJitter;

impl Jitter for UniformJitter {
    fn factor(&self) -> f64 {
        rand::rng().random_range(JITTER_MIN..JITTER_MAX)
    }
}

/// Reproducible sequence of draws from a fixed seed.
#[derive(Debug)]
pub struct SeededJitter {
    rng: Mutex<StdRng>,
}

impl SeededJitter {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl Jitter for SeededJitter {
    fn factor(&self) -> f64 {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        rng.random_range(JITTER_MIN..JITTER_MAX)
    }
}

/// Constant factor; `FixedJitter(1.0)` disables jitter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedJitter(pub f64);

impl Jitter for FixedJitter {
    fn factor(&self) -> f64 {
        self.0
    }
}
