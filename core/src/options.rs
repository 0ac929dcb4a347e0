//! Parser configuration.
//!
//! [`ParserOptions`] is read-only once handed to a
//! [`Parser`](crate::Parser). It can be built in code or loaded from a YAML
//! or JSON file; every field is optional in the file.
//!
//! # Example YAML
//!
//! ```yaml
//! cli_name: tool
//! name: Tool
//! version: "1.4.0"
//! author: Example Org
//! year: 2026
//! ignore_unknown_options: false
//! ignore_additional_values: false
//! provide_help_command: true
//! provide_version_command: true
//! provide_help_options: true
//! provide_version_options: true
//! case_sensitive: true
//! ```

use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Immutable parser configuration.
///
/// # Examples
///
/// ```
/// use argot_core::ParserOptions;
///
/// let options = ParserOptions::new("tool")
///     .with_version("1.4.0")
///     .ignore_unknown_options(true);
/// assert_eq!(options.cli_name, "tool");
/// assert!(options.ignore_unknown_options);
/// assert!(options.case_sensitive);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserOptions {
    /// Executable name shown in usage lines.
    pub cli_name: String,
    /// Product name shown in help and version output.
    pub name: String,
    pub version: String,
    pub author: String,
    pub year: Option<u32>,
    /// Skip option tokens that match no definition instead of reporting them.
    pub ignore_unknown_options: bool,
    /// Drop positional tokens beyond the last declared value.
    pub ignore_additional_values: bool,
    /// Inject a `help [command...]` command at the root.
    pub provide_help_command: bool,
    /// Inject a `version` command at the root.
    pub provide_version_command: bool,
    /// Treat `-h`/`--help` as a request for the resolved command's help.
    pub provide_help_options: bool,
    /// Treat `--version` at the root as a request for the version text.
    pub provide_version_options: bool,
    /// Match command names and aliases case-sensitively.
    pub case_sensitive: bool,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            cli_name: String::new(),
            name: String::new(),
            version: String::new(),
            author: String::new(),
            year: None,
            ignore_unknown_options: false,
            ignore_additional_values: false,
            provide_help_command: false,
            provide_version_command: false,
            provide_help_options: false,
            provide_version_options: false,
            case_sensitive: true,
        }
    }
}

impl ParserOptions {
    /// Options for the executable `cli_name` with everything else defaulted.
    pub fn new(cli_name: &str) -> Self {
        Self {
            cli_name: cli_name.to_string(),
            ..Self::default()
        }
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn with_version(mut self, version: &str) -> Self {
        self.version = version.to_string();
        self
    }

    pub fn with_author(mut self, author: &str, year: Option<u32>) -> Self {
        self.author = author.to_string();
        self.year = year;
        self
    }

    pub fn ignore_unknown_options(mut self, ignore: bool) -> Self {
        self.ignore_unknown_options = ignore;
        self
    }

    pub fn ignore_additional_values(mut self, ignore: bool) -> Self {
        self.ignore_additional_values = ignore;
        self
    }

    /// Enables the help and version commands and options together.
    pub fn with_help_and_version(mut self) -> Self {
        self.provide_help_command = true;
        self.provide_version_command = true;
        self.provide_help_options = true;
        self.provide_version_options = true;
        self
    }

    pub fn case_sensitive(mut self, case_sensitive: bool) -> Self {
        self.case_sensitive = case_sensitive;
        self
    }

    /// Loads options from a `.json` file, or YAML for any other extension.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Json`]/[`ConfigError::Yaml`] if parsing fails.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let reader = BufReader::new(std::fs::File::open(path)?);
        if is_json(path) {
            Ok(serde_json::from_reader(reader)?)
        } else {
            Ok(serde_yaml::from_reader(reader)?)
        }
    }

    /// Saves options as JSON or YAML, chosen by extension like [`load`](Self::load).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be written, or a
    /// serialization error.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let writer = BufWriter::new(std::fs::File::create(path)?);
        if is_json(path) {
            serde_json::to_writer_pretty(writer, self)?;
        } else {
            serde_yaml::to_writer(writer, self)?;
        }
        Ok(())
    }
}

pub(crate) fn is_json(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}
