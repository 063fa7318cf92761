//! Compiler configuration
//!
//! Settings come from built-in defaults, a TOML document, or the
//! environment:
//!
//! - `TYPED_NATIVE_CONFIG`: path of a TOML file to load
//! - `TYPED_NATIVE_VERBOSE`: when set (to anything but `0`), log the printed
//!   IR of every extracted definition

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

const CONFIG_ENV: &str = "TYPED_NATIVE_CONFIG";
const VERBOSE_ENV: &str = "TYPED_NATIVE_VERBOSE";

/// Upper bound on type-inference passes before giving up.
pub const DEFAULT_MAX_TYPE_PASSES: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompilerConfig {
    /// Safety bound on the type-stability loop. The lattice guarantees
    /// termination well before this for any well-formed function.
    pub max_type_passes: usize,
    /// Prepended to every generated symbol name.
    pub name_prefix: String,
    /// Log each extracted definition's IR at debug level.
    pub verbose: bool,
    /// Fold operations on two compile-time constants.
    pub constant_folding: bool,
    /// Synthesize a call converter for every entry point the runtime compiles.
    pub generate_call_converters: bool,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            max_type_passes: DEFAULT_MAX_TYPE_PASSES,
            name_prefix: String::new(),
            verbose: false,
            constant_folding: true,
            generate_call_converters: true,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {}: {message}", path.display())]
    Io { path: PathBuf, message: String },

    #[error("invalid compiler config: {0}")]
    Parse(String),

    #[error("invalid compiler config: {0}")]
    Invalid(String),
}

impl CompilerConfig {
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: CompilerConfig =
            toml::from_str(source).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let source = fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::from_toml_str(&source)
    }

    /// Defaults, overridden by `TYPED_NATIVE_CONFIG` and then `TYPED_NATIVE_VERBOSE`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = match env::var_os(CONFIG_ENV) {
            Some(path) if !path.is_empty() => Self::from_file(Path::new(&path))?,
            _ => Self::default(),
        };
        if verbose_from_env() {
            config.verbose = true;
        }
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_type_passes == 0 {
            return Err(ConfigError::Invalid(
                "max_type_passes must be at least 1".to_string(),
            ));
        }
        if self.name_prefix.contains(char::is_whitespace) {
            return Err(ConfigError::Invalid(format!(
                "name_prefix {:?} must not contain whitespace",
                self.name_prefix
            )));
        }
        Ok(())
    }
}

fn verbose_from_env() -> bool {
    match env::var(VERBOSE_ENV) {
        Ok(value) => !value.is_empty() && value != "0",
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = CompilerConfig::from_toml_str("verbose = true\nname_prefix = \"jit.\"").unwrap();
        assert!(config.verbose);
        assert_eq!(config.name_prefix, "jit.");
        assert_eq!(config.max_type_passes, DEFAULT_MAX_TYPE_PASSES);
        assert!(config.constant_folding);
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(matches!(
            CompilerConfig::from_toml_str("max_type_passes = 0"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            CompilerConfig::from_toml_str("unknown_key = 1"),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            CompilerConfig::from_toml_str("name_prefix = \"a b\""),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "max_type_passes = 4").unwrap();
        let config = CompilerConfig::from_file(file.path()).unwrap();
        assert_eq!(config.max_type_passes, 4);

        let missing = CompilerConfig::from_file(Path::new("/nonexistent/typed_native.toml"));
        assert!(matches!(missing, Err(ConfigError::Io { .. })));
    }
}
