//! Typed options structs and their type-erased binder.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

use crate::error::BindError;
use crate::types::BoundArgs;
use crate::validate::Violation;

/// A bound instance shared between the parser, validators and executors.
pub type BoundInstance = Arc<dyn Any + Send + Sync>;

/// A strongly-typed options struct built from the parser's [`BoundArgs`].
///
/// Implementations may also validate themselves by overriding
/// [`validate_options`](Self::validate_options); it runs before any external
/// [`Validator`](crate::Validator) registered on the command.
///
/// # Examples
///
/// ```
/// use argot_core::{BindError, BoundArgs, CommandOptions, Value, Violation};
///
/// struct Build {
///     target: String,
///     jobs: u32,
/// }
///
/// impl CommandOptions for Build {
///     fn from_args(args: &BoundArgs) -> Result<Self, BindError> {
///         Ok(Self {
///             target: args.get("target")?,
///             jobs: args.get("jobs")?,
///         })
///     }
///
///     fn validate_options(&self) -> Vec<Violation> {
///         if self.jobs == 0 {
///             vec![Violation::field("jobs", "must be at least 1")]
///         } else {
///             Vec::new()
///         }
///     }
/// }
///
/// let mut args = BoundArgs::new();
/// args.insert("target", Value::Str("app".into()));
/// args.insert("jobs", Value::UInt(0));
/// let build = Build::from_args(&args).unwrap();
/// assert_eq!(build.target, "app");
/// assert_eq!(build.validate_options().len(), 1);
/// ```
pub trait CommandOptions: Sized + Send + Sync + 'static {
    /// Builds the typed instance from the bound fields.
    fn from_args(args: &BoundArgs) -> Result<Self, BindError>;

    /// Returns the problems with this instance; empty when valid.
    fn validate_options(&self) -> Vec<Violation> {
        Vec::new()
    }
}

impl CommandOptions for BoundArgs {
    fn from_args(args: &BoundArgs) -> Result<Self, BindError> {
        Ok(args.clone())
    }
}

/// Type-erased [`CommandOptions`] implementation attached to a command.
#[derive(Clone, Copy)]
pub(crate) struct Binder {
    type_id: TypeId,
    type_name: &'static str,
    bind: fn(&BoundArgs) -> Result<BoundInstance, BindError>,
    self_validate: fn(&(dyn Any + Send + Sync)) -> Vec<Violation>,
}

impl Binder {
    pub(crate) fn of<T: CommandOptions>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            bind: bind_typed::<T>,
            self_validate: self_validate_typed::<T>,
        }
    }

    /// Binder for commands without a typed options struct.
    pub(crate) fn untyped() -> Self {
        Self::of::<BoundArgs>()
    }

    pub(crate) fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub(crate) fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub(crate) fn bind(&self, args: &BoundArgs) -> Result<BoundInstance, BindError> {
        (self.bind)(args)
    }

    pub(crate) fn self_validate(&self, instance: &BoundInstance) -> Vec<Violation> {
        (self.self_validate)(&**instance)
    }
}

impl fmt::Debug for Binder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Binder").field(&self.type_name).finish()
    }
}

fn bind_typed<T: CommandOptions>(args: &BoundArgs) -> Result<BoundInstance, BindError> {
    T::from_args(args).map(|options| Arc::new(options) as BoundInstance)
}

fn self_validate_typed<T: CommandOptions>(instance: &(dyn Any + Send + Sync)) -> Vec<Violation> {
    instance
        .downcast_ref::<T>()
        .map(T::validate_options)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Value;

    struct Port(u64);

    impl CommandOptions for Port {
        fn from_args(args: &BoundArgs) -> Result<Self, BindError> {
            args.get("port").map(Port)
        }

        fn validate_options(&self) -> Vec<Violation> {
            if self.0 < 1024 {
                vec![Violation::field("port", "privileged port")]
            } else {
                Vec::new()
            }
        }
    }

    #[test]
    fn test_binder_binds_and_self_validates() {
        let binder = Binder::of::<Port>();
        let mut args = BoundArgs::new();
        args.insert("port", Value::UInt(80));

        let instance = binder.bind(&args).unwrap();
        assert_eq!(instance.downcast_ref::<Port>().map(|p| p.0), Some(80));
        assert_eq!(binder.self_validate(&instance).len(), 1);
    }

    #[test]
    fn test_binder_reports_bind_error() {
        let binder = Binder::of::<Port>();
        let err = binder.bind(&BoundArgs::new()).unwrap_err();
        assert_eq!(err.field, "port");
    }

    #[test]
    fn test_untyped_binder_clones_args() {
        let mut args = BoundArgs::new();
        args.insert("x", Value::Int(1));

        let instance = Binder::untyped().bind(&args).unwrap();
        assert_eq!(instance.downcast_ref::<BoundArgs>(), Some(&args));
        assert!(Binder::untyped().self_validate(&instance).is_empty());
    }
}
