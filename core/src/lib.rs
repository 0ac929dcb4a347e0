//! Command-line parsing and dispatch runtime.
//!
//! This crate turns a tokenized command line into a resolved, validated,
//! strongly-typed command invocation and then runs it:
//!
//! - [`CommandTree`]: arena-owned tree of [`CommandNode`]s with names,
//!   aliases, a default child, [`OptionDef`]s and positional [`ValueDef`]s.
//! - [`coerce`]: converts raw tokens into typed [`Value`]s.
//! - [`Parser`]: resolves the command path, binds and coerces tokens,
//!   checks required fields and runs [`Validator`]s, accumulating every
//!   problem as a [`CliError`].
//! - [`Dispatcher`]: runs the command through whichever executor shape
//!   was registered (self-executing options, detached executor or function;
//!   sync or async).
//!
//! Trees can also be described in YAML or JSON with [`TreeManifest`].
//!
//! # Example
//!
//! ```
//! use argot_core::*;
//!
//! struct Add {
//!     name: String,
//!     url: String,
//!     fetch: bool,
//! }
//!
//! impl CommandOptions for Add {
//!     fn from_args(args: &BoundArgs) -> Result<Self, BindError> {
//!         Ok(Self {
//!             name: args.get("name")?,
//!             url: args.get("url")?,
//!             fetch: args.get("fetch")?,
//!         })
//!     }
//! }
//!
//! let mut tree = CommandTree::new(CommandNode::root("git")).unwrap();
//! let remote = tree.add_child(tree.root(), CommandNode::new("remote")).unwrap();
//! tree.add_child(
//!     remote,
//!     CommandNode::new("add")
//!         .with_option(OptionDef::flag("fetch").short('f').long("fetch"))
//!         .with_value(ValueDef::required("name", ValueKind::String))
//!         .with_value(ValueDef::required("url", ValueKind::String))
//!         .handler::<Add, _>(|add| Ok(if add.fetch { 1 } else { 0 })),
//! )
//! .unwrap();
//!
//! let parser = Parser::new(tree, ParserOptions::new("git")).unwrap();
//! let invocation = parser
//!     .parse(&["remote", "add", "-f", "origin", "https://example.com/repo.git"])
//!     .unwrap();
//!
//! let add = invocation.options::<Add>().unwrap();
//! assert_eq!(add.name, "origin");
//! assert_eq!(add.url, "https://example.com/repo.git");
//! assert_eq!(Dispatcher::new().execute(&invocation).unwrap(), 1);
//! ```

mod binding;
mod coerce;
mod dispatch;
mod error;
mod executor;
mod help;
mod manifest;
mod options;
mod parser;
mod tree;
mod types;
mod validate;

pub use binding::{BoundInstance, CommandOptions};
pub use coerce::coerce;
pub use dispatch::{AsyncBridging, Dispatcher};
pub use error::{
    BindError, CliError, CoercionError, ConfigError, DispatchError, ErrorKind, TreeError,
};
pub use executor::{Execute, ExecuteAsync, ExecutorShape, RunCommand, RunCommandAsync};
pub use help::{HelpText, render_help, render_version};
pub use manifest::{CommandManifest, OptionManifest, TreeManifest, ValueManifest};
pub use options::ParserOptions;
pub use parser::{Invocation, ParseFailure, ParseOutcome, Parser};
pub use tree::{CommandNode, CommandTree, NodeId, Resolution};
pub use types::{BoundArgs, FromValue, OptionDef, Value, ValueDef, ValueKind};
pub use validate::{Validator, Violation};
