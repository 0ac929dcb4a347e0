//! Argument parsing.
//!
//! [`Parser::parse`] runs four stages over a token array and returns a
//! [`ParseOutcome`]:
//!
//! 1. **Resolving** the command path through the [`CommandTree`].
//! 2. **Binding** the remaining tokens to the leaf's options and positional
//!    values, coercing each raw token to its declared kind.
//! 3. **Checking** required fields and applying defaults.
//! 4. **Validating** the typed instance, only when stages 1–3 were clean.
//!
//! Problems in stages 2 and 3 are accumulated rather than returned at the
//! first one, so a failure lists everything wrong with the invocation: binding
//! errors in token order, then required-field errors in declaration order,
//! then validation errors in the order validators returned them.
//!
//! Token classification during binding:
//!
//! - `--` ends option parsing; every later token is positional.
//! - `--name` and `--name=value` are long options.
//! - `-x` is a short option; `-xyz` is a bundle of boolean flags.
//! - `-` alone and `-<digit>...` (negative numbers) are positional.
//!
//! # Example
//!
//! ```
//! use argot_core::*;
//!
//! let mut tree = CommandTree::new(CommandNode::root("tool")).unwrap();
//! tree.add_child(
//!     tree.root(),
//!     CommandNode::new("build")
//!         .alias("b")
//!         .with_option(OptionDef::flag("verbose").short('v').long("verbose"))
//!         .with_value(ValueDef::required("target", ValueKind::String))
//!         .handler::<BoundArgs, _>(|_| Ok(0)),
//! )
//! .unwrap();
//! let parser = Parser::new(tree, ParserOptions::new("tool")).unwrap();
//!
//! let invocation = parser.parse(&["b", "-v", "app"]).unwrap();
//! assert_eq!(invocation.command(), "build");
//! assert!(invocation.args().flag("verbose"));
//! assert_eq!(invocation.args().get::<String>("target").unwrap(), "app");
//!
//! let failure = parser.parse(&["build"]).unwrap_err();
//! assert_eq!(failure.kinds(), vec![ErrorKind::MissingRequiredValue]);
//! ```

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, trace};

use crate::binding::BoundInstance;
use crate::coerce::{coerce, parse_bool};
use crate::error::{CliError, ErrorKind, TreeError};
use crate::executor::{ExecutorShape, Invoker};
use crate::help::{self, HelpText, render_help, render_version};
use crate::options::ParserOptions;
use crate::tree::{CommandNode, CommandTree, NodeId, Synthetic};
use crate::types::{BoundArgs, OptionDef, Value, ValueDef, ValueKind};
use crate::validate::run_validation;

/// Result of a parse: a complete invocation, or every problem found.
pub type ParseOutcome = Result<Invocation, ParseFailure>;

/// A failed parse. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParseFailure {
    errors: Vec<CliError>,
}

impl ParseFailure {
    fn new(errors: Vec<CliError>) -> Self {
        debug_assert!(!errors.is_empty());
        Self { errors }
    }

    pub fn errors(&self) -> &[CliError] {
        &self.errors
    }

    pub fn into_errors(self) -> Vec<CliError> {
        self.errors
    }

    pub fn kinds(&self) -> Vec<ErrorKind> {
        self.errors.iter().map(|e| e.kind).collect()
    }
}

impl fmt::Display for ParseFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.errors.as_slice() {
            [single] => write!(f, "{single}"),
            errors => {
                write!(f, "{} errors: ", errors.len())?;
                for (i, error) in errors.iter().enumerate() {
                    if i > 0 {
                        f.write_str("; ")?;
                    }
                    write!(f, "{error}")?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ParseFailure {}

/// A fully bound command, ready for the [`Dispatcher`](crate::Dispatcher).
#[derive(Clone)]
pub struct Invocation {
    node: NodeId,
    command: String,
    args: BoundArgs,
    instance: BoundInstance,
    invoker: Option<Invoker>,
}

impl Invocation {
    /// The resolved leaf.
    pub fn node(&self) -> NodeId {
        self.node
    }

    /// Space-joined command path; empty for the root.
    pub fn command(&self) -> &str {
        &self.command
    }

    /// The untyped bound fields.
    pub fn args(&self) -> &BoundArgs {
        &self.args
    }

    pub fn instance(&self) -> &BoundInstance {
        &self.instance
    }

    /// The typed options instance, if it is a `T`.
    pub fn options<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.instance.downcast_ref::<T>()
    }

    pub fn executor_shape(&self) -> Option<ExecutorShape> {
        self.invoker.as_ref().map(Invoker::shape)
    }

    pub fn is_executable(&self) -> bool {
        self.invoker.is_some()
    }

    pub(crate) fn invoker(&self) -> Option<&Invoker> {
        self.invoker.as_ref()
    }
}

// The instance is derived from `args`, so it is left out of equality.
impl PartialEq for Invocation {
    fn eq(&self, other: &Self) -> bool {
        self.node == other.node && self.command == other.command && self.args == other.args
    }
}

impl fmt::Debug for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Invocation")
            .field("node", &self.node)
            .field("command", &self.command)
            .field("args", &self.args)
            .field("shape", &self.executor_shape())
            .finish()
    }
}

/// Parses token arrays against a frozen command tree.
///
/// The parser owns its tree; construction injects the help/version
/// commands requested by the options and freezes the tree. `parse` takes
/// `&self` and allocates fresh state per call, so one parser can serve
/// concurrent callers.
#[derive(Debug)]
pub struct Parser {
    tree: CommandTree,
    options: ParserOptions,
}

impl Parser {
    /// Takes ownership of `tree` and freezes it.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::Frozen`] when help or version commands are
    /// requested for a tree that was already frozen.
    pub fn new(mut tree: CommandTree, options: ParserOptions) -> Result<Self, TreeError> {
        help::install(&mut tree, &options)?;
        tree.freeze();
        Ok(Self { tree, options })
    }

    pub fn tree(&self) -> &CommandTree {
        &self.tree
    }

    pub fn options(&self) -> &ParserOptions {
        &self.options
    }

    /// Parses `tokens` (program name excluded).
    pub fn parse<S: AsRef<str>>(&self, tokens: &[S]) -> ParseOutcome {
        let tokens: Vec<String> = tokens.iter().map(|t| t.as_ref().to_string()).collect();
        trace!(?tokens, "Parsing");

        let resolution = self
            .tree
            .resolve(&tokens, self.options.case_sensitive)
            .map_err(|err| self.fail(vec![err]))?;
        let leaf = resolution.leaf();
        let node = &self.tree[leaf];
        let command = self.tree.path_string(leaf);

        if let Some(invocation) = self.intercept_help(leaf, &command, resolution.remaining) {
            return Ok(invocation);
        }

        if leaf == self.tree.root() && self.is_bare_root(node) {
            let message = match resolution.remaining.first() {
                Some(token) if !is_option_shaped(token) => format!("unknown command '{token}'"),
                _ => "no command specified".to_string(),
            };
            return Err(self.fail(vec![
                CliError::new(ErrorKind::UnknownCommand, message).with_command(command),
            ]));
        }

        let offset = tokens.len() - resolution.remaining.len();
        let mut binder = FieldBinder::new(node, &command, &self.options, offset);
        binder.scan(resolution.remaining);
        binder.check_required();
        let (args, errors) = binder.finish();
        if !errors.is_empty() {
            return Err(self.fail(errors));
        }

        let instance = self
            .bind_instance(node, &command, &args)
            .map_err(|errors| self.fail(errors))?;

        let violations = run_validation(node, &node.binder, &node.validators, &instance);
        if !violations.is_empty() {
            let errors = violations
                .into_iter()
                .map(|v| {
                    let error = CliError::new(ErrorKind::ValidationError, v.message)
                        .with_command(command.as_str());
                    match v.field {
                        Some(field) => error.with_field(field),
                        None => error,
                    }
                })
                .collect();
            return Err(self.fail(errors));
        }

        debug!(command = %command, fields = args.len(), "Parsed command");
        Ok(Invocation {
            node: leaf,
            command,
            args,
            instance,
            invoker: node.invoker.clone(),
        })
    }

    fn fail(&self, errors: Vec<CliError>) -> ParseFailure {
        debug!(
            errors = errors.len(),
            kinds = ?errors.iter().map(|e| e.kind).collect::<Vec<_>>(),
            "Parse failed"
        );
        ParseFailure::new(errors)
    }

    /// A root that only groups commands cannot be the leaf of a parse.
    fn is_bare_root(&self, root: &CommandNode) -> bool {
        root.invoker.is_none()
            && root.options.is_empty()
            && root.values.is_empty()
            && !root.children().is_empty()
    }

    fn intercept_help(&self, leaf: NodeId, command: &str, remaining: &[String]) -> Option<Invocation> {
        let node = &self.tree[leaf];
        let mut wants_help = false;
        let mut wants_version = false;
        for token in remaining.iter().take_while(|t| t.as_str() != "--") {
            match token.as_str() {
                "--help" if self.options.provide_help_options && node.find_long("help").is_none() => {
                    wants_help = true
                }
                "-h" if self.options.provide_help_options && node.find_short('h').is_none() => {
                    wants_help = true
                }
                "--version"
                    if self.options.provide_version_options
                        && leaf == self.tree.root()
                        && node.find_long("version").is_none() =>
                {
                    wants_version = true
                }
                _ => {}
            }
        }

        let text = if wants_help {
            render_help(&self.tree, leaf, &self.options)
        } else if wants_version {
            render_version(&self.options)
        } else {
            return None;
        };
        debug!(command = %command, help = wants_help, "Answering help option");
        Some(Invocation {
            node: leaf,
            command: command.to_string(),
            args: BoundArgs::new(),
            instance: Arc::new(HelpText::new(text)),
            invoker: Some(help::text_invoker()),
        })
    }

    fn bind_instance(
        &self,
        node: &CommandNode,
        command: &str,
        args: &BoundArgs,
    ) -> Result<BoundInstance, Vec<CliError>> {
        match node.synthetic {
            Some(Synthetic::Help) => {
                let target = self.help_target(args)?;
                let text = render_help(&self.tree, target, &self.options);
                Ok(Arc::new(HelpText::new(text)))
            }
            Some(Synthetic::Version) => Ok(Arc::new(HelpText::new(render_version(&self.options)))),
            None => node.binder.bind(args).map_err(|err| {
                let field = err.field.clone();
                vec![
                    CliError::new(ErrorKind::ValueConversionError, err.to_string())
                        .with_command(command)
                        .with_field(field),
                ]
            }),
        }
    }

    /// Resolves the words given to `help` to the command they name.
    fn help_target(&self, args: &BoundArgs) -> Result<NodeId, Vec<CliError>> {
        let words: Vec<String> = args.get("command").unwrap_or_default();
        if words.is_empty() {
            return Ok(self.tree.root());
        }
        let resolution = self
            .tree
            .resolve(&words, self.options.case_sensitive)
            .map_err(|err| vec![err])?;
        match resolution.remaining.first() {
            Some(word) => Err(vec![
                CliError::new(ErrorKind::UnknownCommand, format!("unknown command '{word}'"))
                    .with_command(self.tree.path_string(resolution.leaf())),
            ]),
            None => Ok(resolution.leaf()),
        }
    }
}

/// Classification of a single token during binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TokenShape<'t> {
    EndOfOptions,
    Long { name: &'t str, inline: Option<&'t str> },
    Short(char),
    Bundle(&'t str),
    Positional,
}

impl<'t> TokenShape<'t> {
    fn of(token: &'t str) -> Self {
        if token == "--" {
            return TokenShape::EndOfOptions;
        }
        if let Some(rest) = token.strip_prefix("--") {
            return match rest.split_once('=') {
                Some((name, value)) => TokenShape::Long {
                    name,
                    inline: Some(value),
                },
                None => TokenShape::Long {
                    name: rest,
                    inline: None,
                },
            };
        }
        let Some(rest) = token.strip_prefix('-') else {
            return TokenShape::Positional;
        };
        let mut chars = rest.chars();
        match (chars.next(), chars.next()) {
            (None, _) => TokenShape::Positional,
            (Some(first), _) if first.is_ascii_digit() => TokenShape::Positional,
            (Some(alias), None) => TokenShape::Short(alias),
            (Some(_), Some(_)) => TokenShape::Bundle(rest),
        }
    }
}

fn is_option_shaped(token: &str) -> bool {
    !matches!(TokenShape::of(token), TokenShape::Positional)
}

/// Per-parse binding state for one leaf command.
struct FieldBinder<'a> {
    node: &'a CommandNode,
    command: &'a str,
    options: &'a ParserOptions,
    values: Vec<&'a ValueDef>,
    next_value: usize,
    offset: usize,
    args: BoundArgs,
    supplied: HashSet<&'a str>,
    errors: Vec<CliError>,
}

impl<'a> FieldBinder<'a> {
    fn new(node: &'a CommandNode, command: &'a str, options: &'a ParserOptions, offset: usize) -> Self {
        Self {
            node,
            command,
            options,
            values: node.ordered_values(),
            next_value: 0,
            offset,
            args: BoundArgs::new(),
            supplied: HashSet::new(),
            errors: Vec::new(),
        }
    }

    fn finish(self) -> (BoundArgs, Vec<CliError>) {
        (self.args, self.errors)
    }

    fn error(&mut self, kind: ErrorKind, field: Option<&str>, message: String) {
        let mut error = CliError::new(kind, message).with_command(self.command);
        if let Some(field) = field {
            error = error.with_field(field);
        }
        self.errors.push(error);
    }

    fn scan(&mut self, tokens: &[String]) {
        let mut index = 0;
        let mut positional_only = false;
        while index < tokens.len() {
            let token = tokens[index].as_str();
            index += 1;
            let position = self.offset + index;

            if positional_only {
                self.bind_positional(token, position);
                continue;
            }
            match TokenShape::of(token) {
                TokenShape::EndOfOptions => positional_only = true,
                TokenShape::Long { name, inline } => {
                    let node = self.node;
                    match node.find_long(name) {
                        Some(def) => {
                            index += self.bind_option(def, &format!("--{name}"), inline, &tokens[index..])
                        }
                        None => self.unknown_option(&format!("--{name}"), None),
                    }
                }
                TokenShape::Short(alias) => {
                    let node = self.node;
                    match node.find_short(alias) {
                        Some(def) => index += self.bind_option(def, token, None, &tokens[index..]),
                        None => self.unknown_option(token, None),
                    }
                }
                TokenShape::Bundle(aliases) => self.bind_bundle(token, aliases),
                TokenShape::Positional => self.bind_positional(token, position),
            }
        }
    }

    fn unknown_option(&mut self, shown: &str, bundle: Option<&str>) {
        if self.options.ignore_unknown_options {
            trace!(option = shown, "Skipping unknown option");
            return;
        }
        let message = match bundle {
            Some(bundle) => format!("unknown option '{shown}' in '{bundle}'"),
            None => format!("unknown option '{shown}'"),
        };
        self.error(ErrorKind::UnknownOption, None, message);
    }

    /// Binds one option occurrence and returns how many following tokens
    /// it consumed.
    fn bind_option(
        &mut self,
        def: &'a OptionDef,
        shown: &str,
        inline: Option<&str>,
        rest: &[String],
    ) -> usize {
        self.supplied.insert(def.key.as_str());

        if def.kind.is_flag() {
            if let Some(raw) = inline {
                self.assign(&def.key, &def.kind, raw);
                return 0;
            }
            if let Some(value) = rest.first().and_then(|t| parse_bool(t)) {
                self.args.insert(&def.key, Value::Bool(value));
                return 1;
            }
            self.args.insert(&def.key, Value::Bool(true));
            return 0;
        }

        let (raw, consumed) = match (inline, rest.first()) {
            (Some(raw), _) => (raw, 0),
            (None, Some(next)) if !is_option_shaped(next) => (next.as_str(), 1),
            _ => {
                self.error(
                    ErrorKind::MissingOptionValue,
                    Some(&def.key),
                    format!(
                        "option '{shown}' requires a {} value",
                        def.kind.element().display_name()
                    ),
                );
                return 0;
            }
        };
        self.assign(&def.key, &def.kind, raw);
        consumed
    }

    fn bind_bundle(&mut self, token: &str, aliases: &str) {
        let node = self.node;
        let mut flags: Vec<&'a OptionDef> = Vec::new();
        let mut unknown = None;
        for alias in aliases.chars() {
            match node.find_short(alias) {
                Some(def) if def.kind.is_flag() => flags.push(def),
                Some(def) => {
                    self.error(
                        ErrorKind::InvalidFlagBundle,
                        Some(&def.key),
                        format!("option '-{alias}' in '{token}' takes a value and cannot be bundled"),
                    );
                    return;
                }
                None => {
                    unknown.get_or_insert(alias);
                }
            }
        }

        // Ignored unknown members drop out; the known flags still bind.
        if let Some(alias) = unknown {
            self.unknown_option(&format!("-{alias}"), Some(token));
            if !self.options.ignore_unknown_options {
                return;
            }
        }
        for def in flags {
            self.supplied.insert(def.key.as_str());
            self.args.insert(&def.key, Value::Bool(true));
        }
    }

    fn bind_positional(&mut self, token: &str, position: usize) {
        match self.values.get(self.next_value).copied() {
            Some(def) => {
                self.supplied.insert(def.key.as_str());
                self.assign(&def.key, &def.kind, token);
                if !def.kind.is_repeatable() {
                    self.next_value += 1;
                }
            }
            None if self.options.ignore_additional_values => {
                trace!(token, position, "Dropping additional value");
            }
            None => self.error(
                ErrorKind::UnexpectedValue,
                None,
                format!("unexpected value '{token}' at position {position}"),
            ),
        }
    }

    fn assign(&mut self, key: &str, kind: &ValueKind, raw: &str) {
        match coerce(raw, kind, key) {
            Ok(value) if kind.is_repeatable() => self.args.push(key, value),
            Ok(value) => self.args.insert(key, value),
            Err(err) => self.error(ErrorKind::ValueConversionError, Some(key), err.to_string()),
        }
    }

    fn check_required(&mut self) {
        let node = self.node;
        for option in &node.options {
            let missing = format!("missing required option '{}'", option.canonical_name());
            self.fill(&option.key, &option.kind, option.required, option.default.as_ref(), || {
                (ErrorKind::MissingRequiredOption, missing)
            });
        }
        for value in self.values.clone() {
            let missing = format!("missing required value <{}>", value.display_name);
            self.fill(&value.key, &value.kind, value.required, value.default.as_ref(), || {
                (ErrorKind::MissingRequiredValue, missing)
            });
        }
    }

    fn fill(
        &mut self,
        key: &str,
        kind: &ValueKind,
        required: bool,
        default: Option<&Value>,
        missing: impl FnOnce() -> (ErrorKind, String),
    ) {
        if self.supplied.contains(key) {
            return;
        }
        if let Some(default) = default {
            self.args.insert(key, default.clone());
        } else if required {
            let (kind, message) = missing();
            self.error(kind, Some(key), message);
        } else if let Some(implicit) = kind.implicit_default() {
            self.args.insert(key, implicit);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_shapes() {
        assert_eq!(TokenShape::of("--"), TokenShape::EndOfOptions);
        assert_eq!(
            TokenShape::of("--out=a=b"),
            TokenShape::Long {
                name: "out",
                inline: Some("a=b")
            }
        );
        assert_eq!(TokenShape::of("-v"), TokenShape::Short('v'));
        assert_eq!(TokenShape::of("-abc"), TokenShape::Bundle("abc"));
        assert_eq!(TokenShape::of("-"), TokenShape::Positional);
        assert_eq!(TokenShape::of("-42"), TokenShape::Positional);
        assert_eq!(TokenShape::of("app"), TokenShape::Positional);
    }

    #[test]
    fn test_parse_failure_display() {
        let failure = ParseFailure::new(vec![
            CliError::new(ErrorKind::UnknownOption, "unknown option '--x'"),
            CliError::new(ErrorKind::MissingRequiredValue, "missing required value <t>"),
        ]);
        assert_eq!(
            failure.to_string(),
            "2 errors: unknown option '--x'; missing required value <t>"
        );
    }
}
