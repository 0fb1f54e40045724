//! Configuration system for the analysis engine
//!
//! Reads configuration from:
//! - `.archonrc.yaml` / `.archonrc.json` (project-level)
//! - `~/.archonrc.yaml` (user-level)

use crate::rules::{CouplingConfig, StateShapeConfig, ViewComplexityConfig};
use crate::violation::Severity;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration error
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("duplicate rule name '{0}'")]
    DuplicateRule(String),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Engine settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Enable parallel processing
    pub parallel: bool,

    /// Number of parallel jobs (0 = auto-detect)
    pub jobs: usize,

    /// Enable the parse cache
    pub cache: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            parallel: true,
            jobs: 0,
            cache: true,
        }
    }
}

/// Output settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Output format
    pub format: OutputFormat,

    /// Color mode
    pub color: ColorMode,

    /// Verbose output
    pub verbose: bool,

    /// Show statistics
    pub statistics: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Text,
            color: ColorMode::Auto,
            verbose: false,
            statistics: true,
        }
    }
}

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Unknown output format: {}", s)),
        }
    }
}

/// Color mode options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorMode {
    #[default]
    Auto,
    Always,
    Never,
}

/// File handling settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilesConfig {
    /// Include patterns
    pub include: Vec<String>,

    /// Exclude patterns (take precedence; matching directories are pruned)
    pub exclude: Vec<String>,
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            include: vec!["**/*.swift".to_string()],
            exclude: vec![
                "**/.build/**".to_string(),
                "**/Pods/**".to_string(),
                "**/Carthage/**".to_string(),
                "**/DerivedData/**".to_string(),
            ],
        }
    }
}

/// Rule selection and overrides
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    /// Disabled rules
    pub disabled: Vec<String>,

    /// Enabled rules (empty = all)
    pub enabled: Vec<String>,

    /// Severity overrides (rule name -> severity)
    pub severity: HashMap<String, Severity>,

    /// Script rule pack directories
    pub packs: Vec<PathBuf>,
}

/// Typed thresholds for the built-in rules
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    pub state_shape: StateShapeConfig,
    pub view_complexity: ViewComplexityConfig,
    pub coupling: CouplingConfig,
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Extend from other configuration files or presets
    pub extends: Vec<String>,

    /// Engine settings
    pub engine: EngineConfig,

    /// Output settings
    pub output: OutputConfig,

    /// File handling settings
    pub files: FilesConfig,

    /// Rule selection and overrides
    pub rules: RulesConfig,

    /// Thresholds for the built-in rules
    pub thresholds: Thresholds,

    /// Rule categories to enable (empty = all)
    pub categories: Vec<String>,
}

impl Config {
    /// Create default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a preset configuration by name
    pub fn preset(name: &str) -> Option<Self> {
        match name {
            "recommended" => Some(Self::default()),
            "strict" => Some(Self::preset_strict()),
            "minimal" => Some(Self::preset_minimal()),
            _ => None,
        }
    }

    /// Strict preset - tighter budgets across the board
    fn preset_strict() -> Self {
        let mut config = Self::default();
        config.thresholds.state_shape.max_state_properties = 10;
        config.thresholds.state_shape.max_action_cases = 12;
        config.thresholds.view_complexity.max_view_properties = 8;
        config.thresholds.view_complexity.max_file_lines = 250;
        config.thresholds.coupling.max_imports = 8;
        config
    }

    /// Minimal preset - state conventions only
    fn preset_minimal() -> Self {
        Self {
            categories: vec!["state".to_string()],
            ..Self::default()
        }
    }

    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        Self::load_with_depth(path, 0)
    }

    /// Load with recursion depth limit (to prevent inheritance cycles)
    fn load_with_depth(path: &Path, depth: usize) -> Result<Self, ConfigError> {
        const MAX_DEPTH: usize = 10;
        if depth >= MAX_DEPTH {
            return Err(ConfigError::Invalid(
                "Maximum config inheritance depth exceeded".to_string(),
            ));
        }

        let content = std::fs::read_to_string(path)?;
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        let mut config: Self = match ext {
            "yaml" | "yml" => serde_yaml::from_str(&content)?,
            "json" => serde_json::from_str(&content)?,
            _ => {
                return Err(ConfigError::Invalid(format!(
                    "Unknown config file format: {}",
                    ext
                )))
            }
        };

        if !config.extends.is_empty() {
            let base_dir = path.parent().unwrap_or(Path::new("."));
            let mut base_config = Self::default();

            for extend in &config.extends.clone() {
                let extended = if let Some(preset) = Self::preset(extend) {
                    preset
                } else {
                    let extend_path = if Path::new(extend).is_absolute() {
                        PathBuf::from(extend)
                    } else {
                        base_dir.join(extend)
                    };
                    Self::load_with_depth(&extend_path, depth + 1)?
                };
                base_config.merge(extended);
            }

            base_config.merge(config);
            config = base_config;
        }

        Ok(config)
    }

    /// Merge another config into this one (other takes precedence)
    pub fn merge(&mut self, other: Self) {
        if other.engine.jobs != 0 {
            self.engine.jobs = other.engine.jobs;
        }
        self.engine.parallel = other.engine.parallel;
        self.engine.cache = other.engine.cache;

        if other.output.format != OutputFormat::Text {
            self.output.format = other.output.format;
        }
        if other.output.verbose {
            self.output.verbose = true;
        }
        if other.output.color != ColorMode::Auto {
            self.output.color = other.output.color;
        }

        self.files.include.extend(other.files.include);
        self.files.exclude.extend(other.files.exclude);

        self.rules.disabled.extend(other.rules.disabled);
        if !other.rules.enabled.is_empty() {
            self.rules.enabled = other.rules.enabled;
        }
        self.rules.severity.extend(other.rules.severity);
        self.rules.packs.extend(other.rules.packs);

        // Thresholds replace wholesale, but only when actually customized.
        if other.thresholds != Thresholds::default() {
            self.thresholds = other.thresholds;
        }

        if !other.categories.is_empty() {
            self.categories = other.categories;
        }
    }

    /// Load configuration from default locations
    pub fn load_default() -> Result<Self, ConfigError> {
        let config_names = [
            ".archonrc.yaml",
            ".archonrc.yml",
            ".archonrc.json",
            "archon.yaml",
            "archon.yml",
            "archon.json",
        ];

        for name in &config_names {
            let path = PathBuf::from(name);
            if path.exists() {
                return Self::load(&path);
            }
        }

        if let Some(home) = dirs::home_dir() {
            for name in &config_names {
                let path = home.join(name);
                if path.exists() {
                    return Self::load(&path);
                }
            }
        }

        Ok(Self::default())
    }

    /// Merge CLI arguments into configuration
    pub fn merge_cli(
        &mut self,
        format: Option<OutputFormat>,
        verbose: Option<bool>,
        jobs: Option<usize>,
        disabled_rules: Option<Vec<String>>,
        enabled_rules: Option<Vec<String>>,
    ) {
        if let Some(f) = format {
            self.output.format = f;
        }
        if let Some(v) = verbose {
            self.output.verbose = v;
        }
        if let Some(j) = jobs {
            self.engine.jobs = j;
        }
        if let Some(disabled) = disabled_rules {
            self.rules.disabled.extend(disabled);
        }
        if let Some(enabled) = enabled_rules {
            self.rules.enabled = enabled;
        }
    }

    /// Check if a rule is enabled
    pub fn is_rule_enabled(&self, rule_name: &str) -> bool {
        if self.rules.disabled.iter().any(|r| r == rule_name) {
            return false;
        }
        if !self.rules.enabled.is_empty() {
            return self.rules.enabled.iter().any(|r| r == rule_name);
        }
        true
    }

    /// Check if a rule category is enabled
    pub fn is_category_enabled(&self, category: &str) -> bool {
        self.categories.is_empty() || self.categories.iter().any(|c| c == category)
    }

    /// Get severity override for a rule
    pub fn get_severity_override(&self, rule_name: &str) -> Option<Severity> {
        self.rules.severity.get(rule_name).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::new();
        assert!(config.engine.parallel);
        assert_eq!(config.engine.jobs, 0);
        assert_eq!(config.output.format, OutputFormat::Text);
        assert!(!config.files.include.is_empty());
        assert_eq!(config.thresholds.state_shape.max_state_properties, 15);
    }

    #[test]
    fn test_output_format_from_str() {
        assert_eq!("text".parse::<OutputFormat>().unwrap(), OutputFormat::Text);
        assert_eq!("json".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert!("sarif".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_rule_enabled() {
        let mut config = Config::new();
        assert!(config.is_rule_enabled("any-rule"));

        config.rules.disabled.push("disabled-rule".to_string());
        assert!(!config.is_rule_enabled("disabled-rule"));
        assert!(config.is_rule_enabled("other-rule"));

        config.rules.enabled = vec!["only-this".to_string()];
        assert!(!config.is_rule_enabled("other-rule"));
        assert!(config.is_rule_enabled("only-this"));
    }

    #[test]
    fn test_severity_override() {
        let mut config = Config::new();
        config
            .rules
            .severity
            .insert("coupling".to_string(), Severity::Critical);

        assert_eq!(
            config.get_severity_override("coupling"),
            Some(Severity::Critical)
        );
        assert_eq!(config.get_severity_override("other"), None);
    }

    #[test]
    fn test_yaml_deserialize() {
        let yaml = r#"
engine:
  parallel: false
  jobs: 4
output:
  format: json
thresholds:
  state_shape:
    max_state_properties: 5
rules:
  disabled:
    - coupling
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert!(!config.engine.parallel);
        assert_eq!(config.engine.jobs, 4);
        assert_eq!(config.output.format, OutputFormat::Json);
        assert_eq!(config.thresholds.state_shape.max_state_properties, 5);
        assert!(!config.is_rule_enabled("coupling"));
    }

    #[test]
    fn test_extends_preset() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.yaml");
        std::fs::write(&path, "extends:\n  - strict\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.thresholds.state_shape.max_state_properties, 10);
    }

    #[test]
    fn test_extends_missing_file_is_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.yaml");
        std::fs::write(&path, "extends:\n  - nonexistent.yaml\n").unwrap();

        assert!(Config::load(&path).is_err());
    }

    #[test]
    fn test_category_filter() {
        let config = Config::preset("minimal").unwrap();
        assert!(config.is_category_enabled("state"));
        assert!(!config.is_category_enabled("view"));

        let config = Config::new();
        assert!(config.is_category_enabled("view"));
    }

    #[test]
    fn test_merge_cli() {
        let mut config = Config::new();
        config.merge_cli(
            Some(OutputFormat::Json),
            Some(true),
            Some(4),
            Some(vec!["view-complexity".to_string()]),
            None,
        );

        assert_eq!(config.output.format, OutputFormat::Json);
        assert!(config.output.verbose);
        assert_eq!(config.engine.jobs, 4);
        assert!(!config.is_rule_enabled("view-complexity"));
    }
}
