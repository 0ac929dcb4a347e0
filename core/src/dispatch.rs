//! Invocation dispatch.
//!
//! The [`Dispatcher`] runs the executor registered on an invocation's
//! command. Both entry points accept every executor shape:
//!
//! - [`execute_async`](Dispatcher::execute_async) awaits async executors and
//!   evaluates synchronous ones eagerly.
//! - [`execute`](Dispatcher::execute) runs synchronous executors directly.
//!   Async-only executors are driven to completion on the calling thread by
//!   default, or refused by a [`Dispatcher::strict`] dispatcher.
//!
//! Errors returned by command logic are passed through unchanged in
//! [`DispatchError::Command`].

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{CliError, DispatchError, ErrorKind};
use crate::parser::Invocation;

/// How [`Dispatcher::execute`] treats async-only commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AsyncBridging {
    /// Block the calling thread until the command's future completes.
    #[default]
    Block,
    /// Fail with [`DispatchError::BlockingRefused`].
    Refuse,
}

/// Executes parsed invocations.
///
/// # Examples
///
/// ```
/// use argot_core::*;
///
/// let root = CommandNode::root("tool")
///     .with_value(ValueDef::required("n", ValueKind::Int))
///     .handler::<BoundArgs, _>(|args| Ok(args.get::<i64>("n")? as i32));
/// let parser = Parser::new(CommandTree::new(root).unwrap(), ParserOptions::default()).unwrap();
///
/// let invocation = parser.parse(&["7"]).unwrap();
/// assert_eq!(Dispatcher::new().execute(&invocation).unwrap(), 7);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Dispatcher {
    bridging: AsyncBridging,
}

impl Dispatcher {
    /// A dispatcher that blocks on async-only commands in [`execute`](Self::execute).
    pub fn new() -> Self {
        Self::default()
    }

    /// A dispatcher that refuses to block on async-only commands.
    pub fn strict() -> Self {
        Self {
            bridging: AsyncBridging::Refuse,
        }
    }

    pub fn with_bridging(bridging: AsyncBridging) -> Self {
        Self { bridging }
    }

    pub fn bridging(&self) -> AsyncBridging {
        self.bridging
    }

    /// Runs the invocation's command and returns its exit code.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::NotExecutable`] when the command has no
    /// executor, [`DispatchError::BlockingRefused`] for async-only commands
    /// under [`AsyncBridging::Refuse`], or the command's own error.
    pub fn execute(&self, invocation: &Invocation) -> Result<i32, DispatchError> {
        let invoker = invocation.invoker().ok_or_else(|| not_executable(invocation))?;
        debug!(
            command = %invocation.command(),
            shape = ?invoker.shape(),
            "Dispatching command"
        );
        invoker.invoke(
            invocation.command(),
            invocation.instance(),
            self.bridging == AsyncBridging::Block,
        )
    }

    /// Runs the invocation's command asynchronously and returns its exit code.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::NotExecutable`] when the command has no
    /// executor, or the command's own error.
    pub async fn execute_async(&self, invocation: &Invocation) -> Result<i32, DispatchError> {
        let invoker = invocation.invoker().ok_or_else(|| not_executable(invocation))?;
        debug!(
            command = %invocation.command(),
            shape = ?invoker.shape(),
            "Dispatching command asynchronously"
        );
        invoker
            .invoke_async(invocation.command(), invocation.instance().clone())
            .await
    }
}

fn not_executable(invocation: &Invocation) -> DispatchError {
    let command = invocation.command();
    let message = if command.is_empty() {
        "no command specified".to_string()
    } else {
        format!("command '{command}' is not executable")
    };
    DispatchError::NotExecutable(
        CliError::new(ErrorKind::CommandNotExecutable, message).with_command(command),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::ParserOptions;
    use crate::parser::Parser;
    use crate::tree::{CommandNode, CommandTree};
    use crate::types::BoundArgs;

    fn parser() -> Parser {
        let mut tree = CommandTree::new(CommandNode::root("tool")).unwrap();
        let remote = tree.add_child(tree.root(), CommandNode::new("remote")).unwrap();
        tree.add_child(
            remote,
            CommandNode::new("add").handler::<BoundArgs, _>(|_| Ok(3)),
        )
        .unwrap();
        Parser::new(tree, ParserOptions::default()).unwrap()
    }

    #[test]
    fn test_group_command_is_not_executable() {
        let invocation = parser().parse(&["remote"]).unwrap();
        let err = Dispatcher::new().execute(&invocation).unwrap_err();
        match err {
            DispatchError::NotExecutable(error) => {
                assert_eq!(error.kind, ErrorKind::CommandNotExecutable);
                assert_eq!(error.command.as_deref(), Some("remote"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_strict_dispatcher_runs_sync_commands() {
        let invocation = parser().parse(&["remote", "add"]).unwrap();
        assert_eq!(Dispatcher::strict().execute(&invocation).unwrap(), 3);
        assert_eq!(Dispatcher::strict().bridging(), AsyncBridging::Refuse);
    }
}
