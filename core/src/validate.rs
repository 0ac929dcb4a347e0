//! Post-binding validation.
//!
//! Two validators may inspect a fully bound instance: the options struct
//! itself through [`CommandOptions::validate_options`], and any external
//! [`Validator`] registered on the command. Both run, self-validation first,
//! and their violations are reported as
//! [`ErrorKind::ValidationError`](crate::ErrorKind::ValidationError).
//!
//! # Examples
//!
//! ```
//! use argot_core::*;
//!
//! let release_needs_target = |_: &CommandNode, args: &BoundArgs| {
//!     if args.flag("release") && !args.contains("target") {
//!         vec![Violation::field("target", "--release requires a target")]
//!     } else {
//!         Vec::new()
//!     }
//! };
//!
//! let root = CommandNode::root("tool")
//!     .with_option(OptionDef::flag("release").long("release"))
//!     .with_value(ValueDef::optional("target", ValueKind::String))
//!     .validator::<BoundArgs, _>(release_needs_target);
//! let parser = Parser::new(CommandTree::new(root).unwrap(), ParserOptions::default()).unwrap();
//!
//! let failure = parser.parse(&["--release"]).unwrap_err();
//! assert_eq!(failure.errors()[0].kind, ErrorKind::ValidationError);
//! assert!(parser.parse(&["--release", "app"]).is_ok());
//! ```

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

use crate::binding::{Binder, BoundInstance, CommandOptions};
use crate::tree::CommandNode;

/// A single validation problem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// Option or value key the problem concerns, if any.
    pub field: Option<String>,
    pub message: String,
}

impl Violation {
    /// A violation of the instance as a whole.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            field: None,
            message: message.into(),
        }
    }

    /// A violation tied to one field.
    pub fn field(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: Some(field.to_string()),
            message: message.into(),
        }
    }
}

/// External validator for the options type `T` of a command.
///
/// Validators must not mutate the instance; they only receive a shared
/// reference. Closures of the shape `Fn(&CommandNode, &T) -> Vec<Violation>`
/// implement this trait.
pub trait Validator<T>: Send + Sync + 'static {
    /// Returns the problems found; empty when valid.
    fn validate_options(&self, command: &CommandNode, options: &T) -> Vec<Violation>;
}

impl<T, F> Validator<T> for F
where
    F: Fn(&CommandNode, &T) -> Vec<Violation> + Send + Sync + 'static,
{
    fn validate_options(&self, command: &CommandNode, options: &T) -> Vec<Violation> {
        self(command, options)
    }
}

type ValidateFn = dyn Fn(&CommandNode, &(dyn Any + Send + Sync)) -> Vec<Violation> + Send + Sync;

/// Type-erased [`Validator`].
#[derive(Clone)]
pub(crate) struct ErasedValidator {
    type_id: TypeId,
    type_name: &'static str,
    run: Arc<ValidateFn>,
}

impl ErasedValidator {
    pub(crate) fn new<T: CommandOptions, V: Validator<T>>(validator: V) -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            run: Arc::new(move |command: &CommandNode, instance: &(dyn Any + Send + Sync)| {
                instance
                    .downcast_ref::<T>()
                    .map(|options| validator.validate_options(command, options))
                    .unwrap_or_default()
            }),
        }
    }

    pub(crate) fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub(crate) fn type_name(&self) -> &'static str {
        self.type_name
    }
}

impl fmt::Debug for ErasedValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Validator").field(&self.type_name).finish()
    }
}

/// Runs self-validation, then every external validator in registration order.
pub(crate) fn run_validation(
    command: &CommandNode,
    binder: &Binder,
    validators: &[ErasedValidator],
    instance: &BoundInstance,
) -> Vec<Violation> {
    let mut violations = binder.self_validate(instance);
    for validator in validators {
        violations.extend((validator.run)(command, &**instance));
    }
    violations
}
