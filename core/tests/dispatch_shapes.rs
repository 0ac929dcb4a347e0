use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use argot_core::*;
use futures::FutureExt;
use futures::future::BoxFuture;

/// `sum <numbers...>` bound to a typed struct.
struct Sum {
    numbers: Vec<i64>,
}

impl CommandOptions for Sum {
    fn from_args(args: &BoundArgs) -> Result<Self, BindError> {
        Ok(Self {
            numbers: args.get("numbers")?,
        })
    }
}

impl Sum {
    fn total(&self) -> i32 {
        self.numbers.iter().sum::<i64>() as i32
    }
}

impl RunCommand for Sum {
    fn run(&self) -> anyhow::Result<i32> {
        Ok(self.total())
    }
}

/// Same fields, self-executing asynchronously.
struct SlowSum(Sum);

impl CommandOptions for SlowSum {
    fn from_args(args: &BoundArgs) -> Result<Self, BindError> {
        Sum::from_args(args).map(SlowSum)
    }
}

impl RunCommandAsync for SlowSum {
    fn run_async(&self) -> BoxFuture<'_, anyhow::Result<i32>> {
        async move { anyhow::Ok(self.0.total()) }.boxed()
    }
}

struct Summer {
    calls: Arc<AtomicUsize>,
}

impl Execute<Sum> for Summer {
    fn execute(&self, options: &Sum) -> anyhow::Result<i32> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(options.total())
    }
}

struct AsyncSummer;

impl ExecuteAsync<Sum> for AsyncSummer {
    fn execute_async<'a>(&'a self, options: &'a Sum) -> BoxFuture<'a, anyhow::Result<i32>> {
        async move { anyhow::Ok(options.total()) }.boxed()
    }
}

fn sum_node() -> CommandNode {
    CommandNode::new("sum").with_value(ValueDef::optional(
        "numbers",
        ValueKind::List(Box::new(ValueKind::Int)),
    ))
}

fn parse_one(node: CommandNode, tokens: &[&str]) -> Invocation {
    let mut tree = CommandTree::new(CommandNode::root("calc")).unwrap();
    tree.add_child(tree.root(), node).unwrap();
    let parser = Parser::new(tree, ParserOptions::new("calc")).unwrap();
    parser.parse(tokens).unwrap()
}

fn all_shapes() -> Vec<CommandNode> {
    vec![
        sum_node().runs::<Sum>(),
        sum_node().runs_async::<SlowSum>(),
        sum_node().executor::<Sum, _>(Summer {
            calls: Arc::new(AtomicUsize::new(0)),
        }),
        sum_node().executor_async::<Sum, _>(AsyncSummer),
        sum_node().handler::<Sum, _>(|sum| Ok(sum.total())),
        sum_node().handler_async::<Sum, _, _>(|sum: Arc<Sum>| async move {
            tokio::time::sleep(Duration::from_millis(1)).await;
            anyhow::Ok(sum.total())
        }),
    ]
}

#[tokio::test]
async fn every_shape_returns_the_same_code_on_both_paths() {
    let mut shapes = Vec::new();
    for node in all_shapes() {
        let invocation = parse_one(node, &["sum", "1", "2", "-3", "7"]);
        let shape = invocation.executor_shape().unwrap();
        shapes.push(shape);

        let async_code = Dispatcher::new().execute_async(&invocation).await.unwrap();
        assert_eq!(async_code, 7, "{shape:?} via execute_async");

        // Blocking on a tokio timer inside a runtime worker would stall it.
        let sync_code = tokio::task::spawn_blocking(move || Dispatcher::new().execute(&invocation))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(sync_code, async_code, "{shape:?} via execute");
    }
    assert_eq!(
        shapes,
        vec![
            ExecutorShape::SelfExecutingSync,
            ExecutorShape::SelfExecutingAsync,
            ExecutorShape::DetachedExecutorSync,
            ExecutorShape::DetachedExecutorAsync,
            ExecutorShape::DelegateSync,
            ExecutorShape::DelegateAsync,
        ]
    );
}

#[test]
fn async_only_command_completes_through_sync_dispatch() {
    let invocation = parse_one(
        sum_node().handler_async::<Sum, _, _>(|sum: Arc<Sum>| async move { anyhow::Ok(sum.total() * 2) }),
        &["sum", "4", "5"],
    );
    let sync_code = Dispatcher::new().execute(&invocation).unwrap();
    let async_code = futures::executor::block_on(Dispatcher::new().execute_async(&invocation)).unwrap();
    assert_eq!(sync_code, 18);
    assert_eq!(sync_code, async_code);
}

#[test]
fn strict_dispatcher_refuses_to_block() {
    let invocation = parse_one(sum_node().runs_async::<SlowSum>(), &["sum", "1"]);
    let err = Dispatcher::strict().execute(&invocation).unwrap_err();
    assert!(matches!(err, DispatchError::BlockingRefused(ref command) if command == "sum"));

    let code = futures::executor::block_on(Dispatcher::strict().execute_async(&invocation)).unwrap();
    assert_eq!(code, 1);
}

#[test]
fn sync_executor_runs_eagerly_for_async_dispatch() {
    let calls = Arc::new(AtomicUsize::new(0));
    let invocation = parse_one(
        sum_node().executor::<Sum, _>(Summer {
            calls: Arc::clone(&calls),
        }),
        &["sum", "3"],
    );
    let dispatcher = Dispatcher::new();
    let pending = dispatcher.execute_async(&invocation);
    let code = futures::executor::block_on(pending).unwrap();
    assert_eq!(code, 3);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn grouping_command_is_not_executable() {
    let invocation = parse_one(sum_node(), &["sum"]);
    assert!(!invocation.is_executable());
    let err = Dispatcher::new().execute(&invocation).unwrap_err();
    match err {
        DispatchError::NotExecutable(error) => {
            assert_eq!(error.kind, ErrorKind::CommandNotExecutable);
            assert_eq!(error.message, "command 'sum' is not executable");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[derive(Debug, thiserror::Error)]
#[error("quota exceeded by {0}")]
struct QuotaError(i64);

#[test]
fn command_errors_pass_through_unchanged() {
    let invocation = parse_one(
        sum_node().handler::<Sum, _>(|sum| Err(QuotaError(sum.numbers.iter().sum()).into())),
        &["sum", "10", "5"],
    );
    let err = Dispatcher::new().execute(&invocation).unwrap_err();
    assert_eq!(err.to_string(), "quota exceeded by 15");
    match err {
        DispatchError::Command(inner) => {
            let quota = inner.downcast_ref::<QuotaError>().unwrap();
            assert_eq!(quota.0, 15);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn async_command_errors_pass_through_unchanged() {
    let invocation = parse_one(
        sum_node().handler_async::<Sum, _, _>(|_: Arc<Sum>| async { Err::<i32, _>(anyhow::anyhow!("remote closed")) }),
        &["sum"],
    );
    let err = Dispatcher::new().execute_async(&invocation).await.unwrap_err();
    assert!(matches!(err, DispatchError::Command(_)));
    assert_eq!(err.to_string(), "remote closed");
}
