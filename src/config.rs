use std::time::Duration;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Engine-wide billing and infrastructure settings.
///
/// Values come from the environment when present (`BACKOFFICE_*` keys,
/// `.env` honoured via dotenv) and fall back to the defaults below.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Monthly support hours included before overage billing applies,
    /// used when neither the report nor the organization carries an override.
    pub default_free_hours: Decimal,
    /// Hourly rate applied to overage hours.
    pub default_hourly_rate: Decimal,
    /// Upper bound on any single object store call.
    pub store_timeout: Duration,
    /// Default TTL for cached aggregates.
    pub cache_ttl: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_free_hours: dec!(2.0),
            default_hourly_rate: dec!(125.00),
            store_timeout: Duration::from_secs(10),
            cache_ttl: Duration::from_secs(300),
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();

        let mut config = Self::default();
        if let Some(hours) = read_decimal("BACKOFFICE_FREE_HOURS") {
            config.default_free_hours = hours;
        }
        if let Some(rate) = read_decimal("BACKOFFICE_HOURLY_RATE") {
            config.default_hourly_rate = rate;
        }
        if let Some(secs) = read_u64("BACKOFFICE_STORE_TIMEOUT_SECS") {
            config.store_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = read_u64("BACKOFFICE_CACHE_TTL_SECS") {
            config.cache_ttl = Duration::from_secs(secs);
        }
        config
    }
}

fn read_decimal(key: &str) -> Option<Decimal> {
    let raw = std::env::var(key).ok()?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            log::warn!("Ignoring unparsable {}: '{}'", key, raw);
            None
        }
    }
}

fn read_u64(key: &str) -> Option<u64> {
    let raw = std::env::var(key).ok()?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            log::warn!("Ignoring unparsable {}: '{}'", key, raw);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.default_free_hours, dec!(2.0));
        assert_eq!(config.default_hourly_rate, dec!(125.00));
        assert_eq!(config.store_timeout, Duration::from_secs(10));
    }
}
