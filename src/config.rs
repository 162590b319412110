use crate::defaults;
use crate::error::{ProtoscribeError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Configuration for the reconciliation engine.
///
/// All fields have defaults from [`crate::defaults`]; a TOML file only needs
/// to name the values it overrides.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ReconcilerConfig {
    /// Maximum words per segment; longer local segments are split.
    pub max_segment_words: usize,
    /// Maximum gap in seconds between neighbors that still merge.
    pub overlap_threshold_secs: f64,
    /// Automatic enhancement attempts before giving up on a segment.
    pub max_enhancement_retries: u32,
    /// Base delay for exponential retry backoff, in milliseconds.
    pub retry_base_delay_ms: u64,
    /// Concurrent enhancement calls allowed in flight.
    pub max_concurrent_enhancements: usize,
    /// Confidence assigned to segments confirmed by the remote service.
    pub enhanced_confidence: f32,
    /// Trailing sentence-like chunks kept for caption display.
    pub recent_line_count: usize,
    /// Buffer size for the reducer command channel.
    pub channel_capacity: usize,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            max_segment_words: defaults::MAX_SEGMENT_WORDS,
            overlap_threshold_secs: defaults::OVERLAP_THRESHOLD_SECS,
            max_enhancement_retries: defaults::MAX_ENHANCEMENT_RETRIES,
            retry_base_delay_ms: defaults::RETRY_BASE_DELAY_MS,
            max_concurrent_enhancements: defaults::MAX_CONCURRENT_ENHANCEMENTS,
            enhanced_confidence: defaults::ENHANCED_CONFIDENCE,
            recent_line_count: defaults::RECENT_LINE_COUNT,
            channel_capacity: defaults::CHANNEL_CAPACITY,
        }
    }
}

impl ReconcilerConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file contains invalid TOML.
    /// Missing fields will use default values.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: ReconcilerConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from a file, or return defaults if it is missing.
    ///
    /// Invalid TOML is still an error; only a missing file falls back.
    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        match Self::load(path) {
            Ok(config) => Ok(config),
            Err(e) => {
                if e.downcast_ref::<std::io::Error>()
                    .map(|io_err| io_err.kind() == std::io::ErrorKind::NotFound)
                    .unwrap_or(false)
                {
                    Ok(Self::default())
                } else {
                    Err(e)
                }
            }
        }
    }

    /// Check that all values are usable.
    pub fn validate(&self) -> Result<()> {
        if self.max_segment_words == 0 {
            return Err(ProtoscribeError::ConfigInvalidValue {
                key: "max_segment_words".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.max_concurrent_enhancements == 0 {
            return Err(ProtoscribeError::ConfigInvalidValue {
                key: "max_concurrent_enhancements".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.overlap_threshold_secs < 0.0 {
            return Err(ProtoscribeError::ConfigInvalidValue {
                key: "overlap_threshold_secs".to_string(),
                message: "must not be negative".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.enhanced_confidence) {
            return Err(ProtoscribeError::ConfigInvalidValue {
                key: "enhanced_confidence".to_string(),
                message: "must be within [0, 1]".to_string(),
            });
        }
        if self.channel_capacity == 0 {
            return Err(ProtoscribeError::ConfigInvalidValue {
                key: "channel_capacity".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Base backoff delay as a [`Duration`].
    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config_matches_constants() {
        let config = ReconcilerConfig::default();
        assert_eq!(config.max_segment_words, 12);
        assert_eq!(config.overlap_threshold_secs, 2.0);
        assert_eq!(config.max_enhancement_retries, 3);
        assert_eq!(config.retry_base_delay_ms, 1000);
        assert_eq!(config.max_concurrent_enhancements, 3);
        assert_eq!(config.recent_line_count, 2);
    }

    #[test]
    fn test_default_config_validates() {
        assert!(ReconcilerConfig::default().validate().is_ok());
    }

    #[test]
    fn test_load_partial_file_uses_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "max_segment_words = 8").unwrap();
        writeln!(file, "retry_base_delay_ms = 250").unwrap();

        let config = ReconcilerConfig::load(file.path()).unwrap();
        assert_eq!(config.max_segment_words, 8);
        assert_eq!(config.retry_base_delay_ms, 250);
        // Unspecified fields fall back to defaults
        assert_eq!(config.max_enhancement_retries, 3);
        assert_eq!(config.overlap_threshold_secs, 2.0);
    }

    #[test]
    fn test_load_invalid_toml_is_error() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "max_segment_words = = 8").unwrap();
        assert!(ReconcilerConfig::load(file.path()).is_err());
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let config =
            ReconcilerConfig::load_or_default(Path::new("/nonexistent/protoscribe.toml")).unwrap();
        assert_eq!(config, ReconcilerConfig::default());
    }

    #[test]
    fn test_load_or_default_invalid_toml_still_errors() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "not valid [ toml").unwrap();
        assert!(ReconcilerConfig::load_or_default(file.path()).is_err());
    }

    #[test]
    fn test_validate_rejects_zero_word_limit() {
        let config = ReconcilerConfig {
            max_segment_words: 0,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("max_segment_words"));
    }

    #[test]
    fn test_validate_rejects_zero_concurrency() {
        let config = ReconcilerConfig {
            max_concurrent_enhancements: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_out_of_range_confidence() {
        let config = ReconcilerConfig {
            enhanced_confidence: 1.5,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_retry_base_delay_conversion() {
        let config = ReconcilerConfig {
            retry_base_delay_ms: 1500,
            ..Default::default()
        };
        assert_eq!(config.retry_base_delay(), Duration::from_millis(1500));
    }
}
