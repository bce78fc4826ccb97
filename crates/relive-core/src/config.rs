//! Reload configuration

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};

/// Attempts per unit before it is given up on
pub const DEFAULT_RETRY_BUDGET: u32 = 10;

/// How a recompiled export table is applied to its unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallMode {
    /// New names overwrite, names the new table lacks are kept
    #[default]
    Merge,
    /// The new table replaces the old one
    Replace,
}

/// Reload engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReloadConfig {
    /// Recompile attempts per unit per batch
    pub retry_budget: u32,
    /// How recompiled tables are installed
    pub install_mode: InstallMode,
    /// Keep at most this many journal events per session (oldest dropped)
    pub journal_capacity: Option<usize>,
    /// Journal and log references to symbols that vanished in a reload
    pub log_removed_symbols: bool,
}

impl ReloadConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With retry budget
    #[inline]
    #[must_use]
    pub fn with_retry_budget(mut self, budget: u32) -> Self {
        self.retry_budget = budget;
        self
    }

    /// With install mode
    #[inline]
    #[must_use]
    pub fn with_install_mode(mut self, mode: InstallMode) -> Self {
        self.install_mode = mode;
        self
    }

    /// With journal capacity
    #[inline]
    #[must_use]
    pub fn with_journal_capacity(mut self, capacity: usize) -> Self {
        self.journal_capacity = Some(capacity);
        self
    }

    /// With removed-symbol logging toggled
    #[inline]
    #[must_use]
    pub fn with_removed_symbol_logging(mut self, enabled: bool) -> Self {
        self.log_removed_symbols = enabled;
        self
    }

    /// Parse a TOML fragment; missing keys take their defaults.
    ///
    /// ```
    /// use relive_core::{InstallMode, ReloadConfig};
    ///
    /// let config = ReloadConfig::from_toml_str("retry_budget = 3\ninstall_mode = \"replace\"").unwrap();
    /// assert_eq!(config.retry_budget, 3);
    /// assert_eq!(config.install_mode, InstallMode::Replace);
    /// ```
    ///
    /// # Errors
    /// Parse errors, or any error from [`ReloadConfig::validate`].
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the configuration is usable
    ///
    /// # Errors
    /// [`ConfigError::ZeroRetryBudget`], [`ConfigError::ZeroJournalCapacity`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.retry_budget == 0 {
            return Err(ConfigError::ZeroRetryBudget);
        }
        if self.journal_capacity == Some(0) {
            return Err(ConfigError::ZeroJournalCapacity);
        }
        Ok(())
    }
}

impl Default for ReloadConfig {
    fn default() -> Self {
        Self {
            retry_budget: DEFAULT_RETRY_BUDGET,
            install_mode: InstallMode::Merge,
            journal_capacity: None,
            log_removed_symbols: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults() {
        let config = ReloadConfig::new();
        assert_eq!(config.retry_budget, 10);
        assert_eq!(config.install_mode, InstallMode::Merge);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn builders() {
        let config = ReloadConfig::new()
            .with_retry_budget(2)
            .with_install_mode(InstallMode::Replace)
            .with_journal_capacity(16)
            .with_removed_symbol_logging(false);

        assert_eq!(
            config,
            ReloadConfig {
                retry_budget: 2,
                install_mode: InstallMode::Replace,
                journal_capacity: Some(16),
                log_removed_symbols: false,
            }
        );
    }

    #[test]
    fn toml_partial_keeps_defaults() {
        let config = ReloadConfig::from_toml_str("journal_capacity = 8").unwrap();
        assert_eq!(config.retry_budget, DEFAULT_RETRY_BUDGET);
        assert_eq!(config.journal_capacity, Some(8));
    }

    #[test]
    fn toml_rejects_zero_budget() {
        let err = ReloadConfig::from_toml_str("retry_budget = 0").unwrap_err();
        assert!(matches!(err, ConfigError::ZeroRetryBudget));
    }

    #[test]
    fn toml_rejects_unknown_mode() {
        let err = ReloadConfig::from_toml_str("install_mode = \"sideways\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
