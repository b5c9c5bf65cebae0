use crate::services::load_save::{IoSettings, LineEnding};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Bytes per storage segment
    #[serde(default = "default_segment_capacity")]
    pub segment_capacity: usize,

    /// Number of physical segment slots (at most 128)
    #[serde(default = "default_segment_count")]
    pub segment_count: usize,

    /// Physical slots that are not present (0-based)
    #[serde(default)]
    pub missing_slots: Vec<usize>,

    /// Screen row the caret is placed on after a full reformat
    #[serde(default = "default_preferred_row")]
    pub preferred_row: usize,

    /// Tab stops used when loading files
    #[serde(default = "default_tab_width")]
    pub tab_width: usize,

    /// Read chunk size; also the free-space threshold that triggers overflow
    #[serde(default = "default_chunk_size")]
    pub load_chunk_size: usize,

    #[serde(default = "default_chunk_size")]
    pub save_chunk_size: usize,

    /// Scratch file used by cut, copy and paste
    #[serde(default = "default_clipboard_file")]
    pub clipboard_file: String,

    /// Line ending written on save
    #[serde(default)]
    pub line_ending: LineEnding,

    /// Custom keybindings (overrides for the defaults)
    #[serde(default)]
    pub keybindings: Vec<Keybinding>,
}

fn default_segment_capacity() -> usize {
    48128
}

fn default_segment_count() -> usize {
    8
}

fn default_preferred_row() -> usize {
    8
}

fn default_tab_width() -> usize {
    8
}

fn default_chunk_size() -> usize {
    1024
}

fn default_clipboard_file() -> String {
    std::env::temp_dir()
        .join("segedit.clip")
        .to_string_lossy()
        .into_owned()
}

/// Keybinding definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Keybinding {
    /// Key name (e.g., "a", "Enter", "F1")
    pub key: String,

    /// Modifiers (e.g., ["ctrl"], ["ctrl", "shift"])
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub modifiers: Vec<String>,

    /// Action to perform (e.g., "insert_char", "move_left")
    pub action: String,

    /// Optional arguments for the action
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub args: HashMap<String, serde_json::Value>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            segment_capacity: default_segment_capacity(),
            segment_count: default_segment_count(),
            missing_slots: Vec::new(),
            preferred_row: default_preferred_row(),
            tab_width: default_tab_width(),
            load_chunk_size: default_chunk_size(),
            save_chunk_size: default_chunk_size(),
            clipboard_file: default_clipboard_file(),
            line_ending: LineEnding::default(),
            keybindings: vec![], // User customizations only
        }
    }
}

impl Config {
    /// Get the default config file path
    pub fn default_config_path() -> Option<std::path::PathBuf> {
        dirs::config_dir().map(|d| d.join("segedit").join("config.json"))
    }

    /// Load configuration from the default location, falling back to defaults if not found
    pub fn load_or_default() -> Self {
        if let Some(config_path) = Self::default_config_path() {
            if config_path.exists() {
                match Self::load_from_file(&config_path) {
                    Ok(config) => return config,
                    Err(e) => {
                        tracing::warn!(
                            "Failed to load config from {}: {}, using defaults",
                            config_path.display(),
                            e
                        );
                    }
                }
            }
        }
        Self::default()
    }

    /// Load and validate configuration from a JSON file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::IoError(e.to_string()))?;

        let config: Config =
            serde_json::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;

        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        serde_json::to_string_pretty(self).map_err(|e| ConfigError::SerializeError(e.to_string()))
    }

    /// Slot presence flags for the segment table.
    pub fn slot_layout(&self) -> Vec<bool> {
        (0..self.segment_count)
            .map(|slot| !self.missing_slots.contains(&slot))
            .collect()
    }

    pub fn io_settings(&self) -> IoSettings {
        IoSettings {
            tab_width: self.tab_width,
            load_chunk_size: self.load_chunk_size,
            save_chunk_size: self.save_chunk_size,
            line_ending: self.line_ending,
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tab_width == 0 {
            return Err(ConfigError::ValidationError(
                "tab_width must be greater than 0".to_string(),
            ));
        }

        if self.load_chunk_size == 0 || self.save_chunk_size == 0 {
            return Err(ConfigError::ValidationError(
                "chunk sizes must be greater than 0".to_string(),
            ));
        }

        // The overflow threshold must leave room for content.
        if self.segment_capacity <= self.load_chunk_size {
            return Err(ConfigError::ValidationError(
                "segment_capacity must exceed load_chunk_size".to_string(),
            ));
        }

        if self.segment_capacity > u32::MAX as usize {
            return Err(ConfigError::ValidationError(
                "segment_capacity must fit in 32 bits".to_string(),
            ));
        }

        if self.segment_count == 0 || self.segment_count > crate::model::segment::MAX_SEGMENTS {
            return Err(ConfigError::ValidationError(format!(
                "segment_count must be between 1 and {}",
                crate::model::segment::MAX_SEGMENTS
            )));
        }

        if self.slot_layout().iter().all(|present| !present) {
            return Err(ConfigError::ValidationError(
                "at least one segment slot must be present".to_string(),
            ));
        }

        if self.clipboard_file.is_empty() {
            return Err(ConfigError::ValidationError(
                "clipboard_file cannot be empty".to_string(),
            ));
        }

        // Validate keybindings
        for binding in &self.keybindings {
            if binding.key.is_empty() {
                return Err(ConfigError::ValidationError(
                    "keybinding key cannot be empty".to_string(),
                ));
            }
            if binding.action.is_empty() {
                return Err(ConfigError::ValidationError(
                    "keybinding action cannot be empty".to_string(),
                ));
            }
        }

        Ok(())
    }
}

/// Configuration error types
#[derive(Debug)]
pub enum ConfigError {
    IoError(String),
    ParseError(String),
    SerializeError(String),
    ValidationError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(msg) => write!(f, "IO error: {msg}"),
            ConfigError::ParseError(msg) => write!(f, "Parse error: {msg}"),
            ConfigError::SerializeError(msg) => write!(f, "Serialize error: {msg}"),
            ConfigError::ValidationError(msg) => write!(f, "Validation error: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.segment_capacity, 48128);
        assert_eq!(config.tab_width, 8);
        assert_eq!(config.line_ending, LineEnding::LF);
        assert!(config.keybindings.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        config.tab_width = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.segment_count = 200;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.segment_count = 2;
        config.missing_slots = vec![0, 1];
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.segment_capacity = 512;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_save_load() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config_path = temp_dir.path().join("config.json");

        let mut config = Config::default();
        config.line_ending = LineEnding::CRLF;
        config.missing_slots = vec![3];
        std::fs::write(&config_path, config.to_json().unwrap()).unwrap();

        let loaded = Config::load_from_file(&config_path).unwrap();
        assert_eq!(loaded.line_ending, LineEnding::CRLF);
        assert_eq!(loaded.missing_slots, vec![3]);
        assert_eq!(loaded.segment_capacity, config.segment_capacity);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let json = r#"{
            "segment_count": 4,
            "keybindings": [
                { "key": "f", "modifiers": ["alt"], "action": "find" }
            ]
        }"#;

        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.segment_count, 4);
        assert_eq!(config.load_chunk_size, 1024);
        assert_eq!(config.keybindings.len(), 1);
        assert_eq!(config.keybindings[0].modifiers, vec!["alt".to_string()]);
        assert_eq!(config.slot_layout(), vec![true; 4]);
    }

    #[test]
    fn test_invalid_file_reports_parse_error() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config_path = temp_dir.path().join("config.json");
        std::fs::write(&config_path, "{ not json").unwrap();
        assert!(matches!(
            Config::load_from_file(&config_path),
            Err(ConfigError::ParseError(_))
        ));
    }
}
