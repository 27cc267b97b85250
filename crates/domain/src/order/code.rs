//! Order code generation.

use std::sync::Arc;

use chrono::{DateTime, Datelike, Utc};
use common::OrderCode;

use crate::random::RandomSource;

/// Number of random characters in a code.
const RANDOM_CHARS: usize = 2;

/// Builds candidate order codes: store prefix, day of year, two random
/// characters and a checksum.
///
/// Candidates are not guaranteed unique; the order service checks each one
/// against storage and retries.
#[derive(Debug, Clone)]
pub struct OrderCodeGenerator {
    random: Arc<dyn RandomSource>,
}

impl OrderCodeGenerator {
    pub fn new(random: Arc<dyn RandomSource>) -> Self {
        Self { random }
    }

    /// First two characters of the store name, uppercased. Shorter names are
    /// used whole, without padding.
    pub fn prefix(store_name: &str) -> String {
        store_name.to_uppercase().chars().take(2).collect()
    }

    /// Produces one candidate code for a store on the day of `at`.
    pub fn generate(&self, store_name: &str, at: DateTime<Utc>) -> OrderCode {
        let mut base = Self::prefix(store_name);
        base.push_str(&format!("{:03}", at.ordinal()));
        for _ in 0..RANDOM_CHARS {
            base.push(self.random.code_char());
        }
        OrderCode::with_checksum(&base)
    }
}
