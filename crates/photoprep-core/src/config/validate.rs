//! Configuration validation with range checks.

use crate::error::ConfigError;

use super::Config;

const MAX_COPY_BUFFER_KB: usize = 64 * 1024;

impl Config {
    /// Validate configuration values are within acceptable ranges.
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.storage.copy_buffer_kb == 0 {
            return Err(ConfigError::ValidationError(
                "storage.copy_buffer_kb must be > 0".into(),
            ));
        }
        if self.storage.copy_buffer_kb > MAX_COPY_BUFFER_KB {
            return Err(ConfigError::ValidationError(format!(
                "storage.copy_buffer_kb must be <= {MAX_COPY_BUFFER_KB}"
            )));
        }
        if self.limits.max_file_size_mb == 0 {
            return Err(ConfigError::ValidationError(
                "limits.max_file_size_mb must be > 0".into(),
            ));
        }
        if self.limits.max_image_dimension == 0 {
            return Err(ConfigError::ValidationError(
                "limits.max_image_dimension must be > 0".into(),
            ));
        }
        if self.limits.max_alloc_mb == 0 {
            return Err(ConfigError::ValidationError(
                "limits.max_alloc_mb must be > 0".into(),
            ));
        }
        if self.limits.decode_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "limits.decode_timeout_ms must be > 0".into(),
            ));
        }
        if !matches!(self.output.format.as_str(), "json" | "jsonl") {
            return Err(ConfigError::ValidationError(format!(
                "output.format must be \"json\" or \"jsonl\", got {:?}",
                self.output.format
            )));
        }
        if !matches!(self.logging.format.as_str(), "pretty" | "json") {
            return Err(ConfigError::ValidationError(format!(
                "logging.format must be \"pretty\" or \"json\", got {:?}",
                self.logging.format
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_passes_validation() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_copy_buffer() {
        let mut config = Config::default();
        config.storage.copy_buffer_kb = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("copy_buffer_kb"));
    }

    #[test]
    fn test_validate_rejects_huge_copy_buffer() {
        let mut config = Config::default();
        config.storage.copy_buffer_kb = usize::MAX;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("copy_buffer_kb"));
    }

    #[test]
    fn test_huge_limits_saturate_instead_of_overflowing() {
        let mut config = Config::default();
        config.limits.max_file_size_mb = u64::MAX;
        config.limits.max_alloc_mb = u64::MAX / 2;
        assert!(config.validate().is_ok());
        assert_eq!(config.limits.max_file_size_bytes(), u64::MAX);
        assert_eq!(config.limits.max_alloc_bytes(), u64::MAX);
        assert_eq!(Config::default().limits.max_alloc_bytes(), 1024 * 1024 * 1024);
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let mut config = Config::default();
        config.limits.decode_timeout_ms = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("decode_timeout_ms"));
    }

    #[test]
    fn test_validate_rejects_unknown_formats() {
        let mut config = Config::default();
        config.output.format = "xml".into();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("output.format"));

        let mut config = Config::default();
        config.logging.format = "logfmt".into();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("logging.format"));
    }
}
