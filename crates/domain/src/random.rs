//! Random source for order codes.

use std::sync::atomic::{AtomicUsize, Ordering};

use common::CODE_ALPHABET;
use rand::Rng;

/// Supplies characters drawn uniformly from [`CODE_ALPHABET`].
pub trait RandomSource: Send + Sync + std::fmt::Debug {
    fn code_char(&self) -> char;
}

/// Thread-local RNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn code_char(&self) -> char {
        let index = rand::rng().random_range(0..CODE_ALPHABET.len());
        char::from(CODE_ALPHABET[index])
    }
}

/// Replays a fixed script of characters, wrapping around at the end.
///
/// Lets tests force order-code collisions.
#[derive(Debug)]
pub struct SequenceRandom {
    script: Vec<char>,
    next: AtomicUsize,
}

impl SequenceRandom {
    pub fn new(script: &str) -> Self {
        Self {
            script: script.chars().collect(),
            next: AtomicUsize::new(0),
        }
    }

    /// Number of characters handed out so far.
    pub fn draws(&self) -> usize {
        self.next.load(Ordering::SeqCst)
    }
}

impl RandomSource for SequenceRandom {
    fn code_char(&self) -> char {
        if self.script.is_empty() {
            return '0';
        }
        let index = self.next.fetch_add(1, Ordering::SeqCst);
        self.script[index % self.script.len()]
    }
}
