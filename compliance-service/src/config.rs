use crate::error::{ComplianceError, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ComplianceConfig {
    /// Days a completed background check stays valid
    pub background_check_validity_days: i64,
    /// Smallest coverage accepted at registration
    pub min_policy_coverage: Decimal,
    pub min_policy_number_len: usize,
    /// Evidence pieces that move an open dispute into progress
    pub evidence_for_investigation: usize,
    pub expiry_warning_days: i64,
}

impl Default for ComplianceConfig {
    fn default() -> Self {
        Self {
            background_check_validity_days: 365,
            min_policy_coverage: Decimal::from(1_000),
            min_policy_number_len: 5,
            evidence_for_investigation: 2,
            expiry_warning_days: 30,
        }
    }
}

impl ComplianceConfig {
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ComplianceError::ConfigError(format!("Failed to read config: {}", e)))?;
        toml::from_str(&content)
            .map_err(|e| ComplianceError::ConfigError(format!("Failed to parse config: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "background_check_validity_days = 180").unwrap();

        let config = ComplianceConfig::from_file(file.path()).unwrap();
        assert_eq!(config.background_check_validity_days, 180);
        assert_eq!(config.min_policy_number_len, 5);
        assert_eq!(config.min_policy_coverage, Decimal::from(1_000));
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let result = ComplianceConfig::from_file("/nonexistent/compliance.toml");
        assert!(matches!(result, Err(ComplianceError::ConfigError(_))));
    }
}
