//! Facet types for the ddlsync configuration schema.
//!
//! The configuration lives in `.config/ddlsync.styx`. Every key is optional;
//! the accessor methods resolve missing keys to their defaults.
//!
//! ```text
//! metadata_table ddlsync_column_metadata
//! provision_attempts 5
//! provision_base_delay_ms 100
//! provision_max_delay_ms 5000
//! ```

use facet::Facet;
use std::time::Duration;

/// Default name of the table that shadows per-column metadata.
pub const DEFAULT_METADATA_TABLE: &str = "ddlsync_column_metadata";

/// Default number of attempts when provisioning the metadata table.
pub const DEFAULT_PROVISION_ATTEMPTS: u32 = 5;

const DEFAULT_PROVISION_BASE_DELAY_MS: u64 = 100;
const DEFAULT_PROVISION_MAX_DELAY_MS: u64 = 5_000;

/// ddlsync configuration.
#[derive(Debug, Clone, Default, Facet)]
pub struct Config {
    /// Name of the metadata shadow table.
    #[facet(default)]
    pub metadata_table: Option<String>,

    /// How many times to try creating the metadata table.
    #[facet(default)]
    pub provision_attempts: Option<u32>,

    /// First retry delay, doubled on every attempt.
    #[facet(default)]
    pub provision_base_delay_ms: Option<u64>,

    /// Upper bound for a single retry delay.
    #[facet(default)]
    pub provision_max_delay_ms: Option<u64>,
}

impl Config {
    pub fn metadata_table(&self) -> &str {
        self.metadata_table
            .as_deref()
            .unwrap_or(DEFAULT_METADATA_TABLE)
    }

    pub fn provision_attempts(&self) -> u32 {
        self.provision_attempts
            .unwrap_or(DEFAULT_PROVISION_ATTEMPTS)
            .max(1)
    }

    pub fn provision_base_delay(&self) -> Duration {
        Duration::from_millis(
            self.provision_base_delay_ms
                .unwrap_or(DEFAULT_PROVISION_BASE_DELAY_MS),
        )
    }

    pub fn provision_max_delay(&self) -> Duration {
        Duration::from_millis(
            self.provision_max_delay_ms
                .unwrap_or(DEFAULT_PROVISION_MAX_DELAY_MS),
        )
    }
}
