//! Error types.
//!
//! User-input problems found while parsing are plain values ([`CliError`])
//! that the parser accumulates; it never stops at the first one. Contract
//! violations made while wiring a command tree are [`TreeError`]s and are
//! returned immediately. [`DispatchError`] covers execution, and
//! [`ConfigError`] covers loading options and manifests from disk.

use serde::Serialize;
use thiserror::Error;

/// Kind of a user-input or dispatch problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    /// No command matched and the root cannot run by itself.
    UnknownCommand,
    /// A token matched more than one sibling command.
    AmbiguousCommand,
    /// An option token matched no definition.
    UnknownOption,
    /// A bundle of short flags referenced an option that takes a value.
    InvalidFlagBundle,
    /// An option that takes a value was last or followed by an option.
    MissingOptionValue,
    /// A positional token beyond the last declared value.
    UnexpectedValue,
    /// A token could not be converted to the field's kind.
    ValueConversionError,
    /// A required option received no token and has no default.
    MissingRequiredOption,
    /// A required positional value received no token and has no default.
    MissingRequiredValue,
    /// A validator rejected the bound instance.
    ValidationError,
    /// The resolved command has no executor.
    CommandNotExecutable,
}

/// One problem found while parsing or dispatching.
///
/// `command` is the space-joined path of the command being bound (empty for
/// the root), `field` is the option or value key the problem concerns.
///
/// # Examples
///
/// ```
/// use argot_core::{CliError, ErrorKind};
///
/// let err = CliError::new(ErrorKind::MissingRequiredValue, "missing required value <target>")
///     .with_command("build")
///     .with_field("target");
/// assert_eq!(err.field.as_deref(), Some("target"));
/// assert_eq!(err.to_string(), "missing required value <target>");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[error("{message}")]
pub struct CliError {
    pub command: Option<String>,
    pub field: Option<String>,
    pub kind: ErrorKind,
    pub message: String,
}

impl CliError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            command: None,
            field: None,
            kind,
            message: message.into(),
        }
    }

    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = Some(command.into());
        self
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }
}

/// A raw token that could not be converted to its target kind.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid value '{token}' for '{field}': expected {expected}")]
pub struct CoercionError {
    /// The offending token.
    pub token: String,
    /// Key of the field the token was bound to.
    pub field: String,
    /// Display name of the expected kind.
    pub expected: String,
}

/// A bound value that a typed options struct could not accept.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot bind '{field}': {message}")]
pub struct BindError {
    pub field: String,
    pub message: String,
}

impl BindError {
    pub fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// Contract violations while building a command tree.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    /// The tree was frozen for parsing.
    #[error("command tree is frozen")]
    Frozen,
    /// A node id does not belong to the tree.
    #[error("unknown command node #{0}")]
    UnknownNode(usize),
    /// The node is not a child of the given parent.
    #[error("command node #{child} is not a child of #{parent}")]
    NotAChild { parent: usize, child: usize },
    /// Command name is empty or whitespace-only.
    #[error("command name cannot be empty")]
    EmptyCommandName,
    /// Two siblings share a name or alias.
    #[error("duplicate command name or alias among siblings: {0}")]
    DuplicateCommand(String),
    /// More than one sibling is marked as default.
    #[error("more than one default command under '{0}'")]
    DuplicateDefault(String),
    /// An option has no short or long alias.
    #[error("option '{0}' must define a short or long alias")]
    MissingOptionAlias(String),
    /// An alias is malformed (prefixed, contains `=` or whitespace, or a digit short alias).
    #[error("invalid option alias '{alias}' for '{key}'")]
    InvalidOptionAlias { key: String, alias: String },
    /// Two options of one command share an alias.
    #[error("duplicate option alias in command: {0}")]
    DuplicateOptionAlias(String),
    /// Two fields of one command share a key.
    #[error("duplicate field key in command: {0}")]
    DuplicateField(String),
    /// Two positional values share an order.
    #[error("duplicate positional order {order} for '{key}'")]
    DuplicateValueOrder { key: String, order: u32 },
    /// A required positional value follows an optional one.
    #[error("required value '{0}' follows an optional value")]
    RequiredAfterOptional(String),
    /// A list positional value is not the last value.
    #[error("list value '{0}' must be the last positional value")]
    ListValueNotLast(String),
    /// Nested lists and lists of flags are not supported.
    #[error("unsupported kind for '{key}': {kind}")]
    UnsupportedKind { key: String, kind: String },
    /// A declared default does not fit its field's kind.
    #[error("default for '{key}' is not a valid {kind}")]
    DefaultKindMismatch { key: String, kind: String },
    /// Binder, executor and validators disagree on the options type.
    #[error("command '{command}' mixes options types {expected} and {found}")]
    BindingMismatch {
        command: String,
        expected: &'static str,
        found: &'static str,
    },
}

/// Errors raised while executing a parsed invocation.
///
/// Errors returned by user command logic pass through unchanged as
/// [`DispatchError::Command`].
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The resolved command has no executor.
    #[error("{0}")]
    NotExecutable(CliError),
    /// Synchronous dispatch of an async-only command under a strict dispatcher.
    #[error("command '{0}' only runs asynchronously; use execute_async")]
    BlockingRefused(String),
    /// The bound instance is not of the type the executor expects.
    #[error("bound instance for '{command}' is not a {expected}")]
    InstanceMismatch {
        command: String,
        expected: &'static str,
    },
    /// Error returned by the command itself.
    #[error(transparent)]
    Command(anyhow::Error),
}

/// Errors loading parser options or tree manifests.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing or serialization failure.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing or serialization failure.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// The manifest describes an invalid tree.
    #[error("invalid command tree: {0}")]
    Tree(#[from] TreeError),

    /// A declared default does not convert to its field's kind.
    #[error("invalid default: {0}")]
    InvalidDefault(#[from] CoercionError),
}
