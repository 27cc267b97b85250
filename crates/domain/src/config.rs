//! Engine configuration loaded from environment variables.

/// Tunables of the order engine.
///
/// Reads from environment variables:
/// - `STOREFRONT_ORDER_CODE_ATTEMPTS`: order-code generation attempts before giving up (default: `100`)
/// - `STOREFRONT_CUSTOMER_NAME_MAX`: maximum customer name length (default: `100`)
/// - `STOREFRONT_CUSTOMER_PHONE_MAX`: maximum customer phone length (default: `20`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub order_code_attempts: u32,
    pub customer_name_max: usize,
    pub customer_phone_max: usize,
}

impl EngineConfig {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            order_code_attempts: env_or("STOREFRONT_ORDER_CODE_ATTEMPTS", defaults.order_code_attempts),
            customer_name_max: env_or("STOREFRONT_CUSTOMER_NAME_MAX", defaults.customer_name_max),
            customer_phone_max: env_or("STOREFRONT_CUSTOMER_PHONE_MAX", defaults.customer_phone_max),
        }
    }

    pub fn with_order_code_attempts(mut self, attempts: u32) -> Self {
        self.order_code_attempts = attempts.max(1);
        self
    }
}

fn env_or<T: std::str::FromStr + PartialOrd + Default>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .filter(|v| *v > T::default())
        .unwrap_or(default)
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            order_code_attempts: 100,
            customer_name_max: 100,
            customer_phone_max: 20,
        }
    }
}
