//! Executor shapes.
//!
//! A command's logic can be supplied six ways: the options struct runs
//! itself ([`RunCommand`], [`RunCommandAsync`]), a detached executor object
//! runs it ([`Execute`], [`ExecuteAsync`]), or a bound function does
//! (sync or async closure). Registration resolves every shape once into an
//! [`Invoker`] holding either a synchronous or an asynchronous call, so the
//! dispatcher never branches on the shape.

use std::any::{Any, TypeId};
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::{self, BoxFuture};
use serde::Serialize;

use crate::binding::{BoundInstance, CommandOptions};
use crate::error::DispatchError;

/// An options struct that executes itself synchronously.
pub trait RunCommand: CommandOptions {
    fn run(&self) -> anyhow::Result<i32>;
}

/// An options struct that executes itself asynchronously.
pub trait RunCommandAsync: CommandOptions {
    fn run_async(&self) -> BoxFuture<'_, anyhow::Result<i32>>;
}

/// A detached synchronous executor for options of type `T`.
pub trait Execute<T>: Send + Sync + 'static {
    fn execute(&self, options: &T) -> anyhow::Result<i32>;
}

/// A detached asynchronous executor for options of type `T`.
pub trait ExecuteAsync<T>: Send + Sync + 'static {
    fn execute_async<'a>(&'a self, options: &'a T) -> BoxFuture<'a, anyhow::Result<i32>>;
}

/// How a command's logic was registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ExecutorShape {
    SelfExecutingSync,
    SelfExecutingAsync,
    DetachedExecutorSync,
    DetachedExecutorAsync,
    DelegateSync,
    DelegateAsync,
}

impl ExecutorShape {
    /// Returns `true` when only the asynchronous capability exists.
    pub fn is_async(self) -> bool {
        matches!(
            self,
            ExecutorShape::SelfExecutingAsync
                | ExecutorShape::DetachedExecutorAsync
                | ExecutorShape::DelegateAsync
        )
    }
}

type SyncCall = dyn Fn(&BoundInstance) -> Option<anyhow::Result<i32>> + Send + Sync;
type AsyncCall =
    dyn Fn(BoundInstance) -> Option<BoxFuture<'static, anyhow::Result<i32>>> + Send + Sync;

// `None` from either call means the instance was not a `T`.
#[derive(Clone)]
enum Call {
    Sync(Arc<SyncCall>),
    Async(Arc<AsyncCall>),
}

/// A registered executor reduced to one invoke/invoke_async pair.
#[derive(Clone)]
pub(crate) struct Invoker {
    shape: ExecutorShape,
    type_id: TypeId,
    type_name: &'static str,
    call: Call,
}

impl Invoker {
    fn sync<T: Any>(shape: ExecutorShape, call: Arc<SyncCall>) -> Self {
        Self {
            shape,
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            call: Call::Sync(call),
        }
    }

    fn asynchronous<T: Any>(shape: ExecutorShape, call: Arc<AsyncCall>) -> Self {
        Self {
            shape,
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            call: Call::Async(call),
        }
    }

    pub(crate) fn self_executing<T: RunCommand>() -> Self {
        Self::sync::<T>(
            ExecutorShape::SelfExecutingSync,
            Arc::new(|instance: &BoundInstance| instance.downcast_ref::<T>().map(T::run)),
        )
    }

    pub(crate) fn self_executing_async<T: RunCommandAsync>() -> Self {
        Self::asynchronous::<T>(
            ExecutorShape::SelfExecutingAsync,
            Arc::new(|instance: BoundInstance| {
                let options = instance.downcast::<T>().ok()?;
                Some(async move { options.run_async().await }.boxed())
            }),
        )
    }

    pub(crate) fn detached<T, E>(executor: E) -> Self
    where
        T: Send + Sync + 'static,
        E: Execute<T>,
    {
        Self::sync::<T>(
            ExecutorShape::DetachedExecutorSync,
            Arc::new(move |instance: &BoundInstance| {
                instance
                    .downcast_ref::<T>()
                    .map(|options| executor.execute(options))
            }),
        )
    }

    pub(crate) fn detached_async<T, E>(executor: E) -> Self
    where
        T: Send + Sync + 'static,
        E: ExecuteAsync<T>,
    {
        let executor = Arc::new(executor);
        Self::asynchronous::<T>(
            ExecutorShape::DetachedExecutorAsync,
            Arc::new(move |instance: BoundInstance| {
                let options = instance.downcast::<T>().ok()?;
                let executor = Arc::clone(&executor);
                Some(async move { executor.execute_async(&options).await }.boxed())
            }),
        )
    }

    pub(crate) fn delegate<T, F>(handler: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(&T) -> anyhow::Result<i32> + Send + Sync + 'static,
    {
        Self::sync::<T>(
            ExecutorShape::DelegateSync,
            Arc::new(move |instance: &BoundInstance| instance.downcast_ref::<T>().map(&handler)),
        )
    }

    pub(crate) fn delegate_async<T, F, Fut>(handler: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(Arc<T>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<i32>> + Send + 'static,
    {
        Self::asynchronous::<T>(
            ExecutorShape::DelegateAsync,
            Arc::new(move |instance: BoundInstance| {
                let options = instance.downcast::<T>().ok()?;
                Some(handler(options).boxed())
            }),
        )
    }

    pub(crate) fn shape(&self) -> ExecutorShape {
        self.shape
    }

    pub(crate) fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub(crate) fn type_name(&self) -> &'static str {
        self.type_name
    }

    fn mismatch(&self, command: &str) -> DispatchError {
        DispatchError::InstanceMismatch {
            command: command.to_string(),
            expected: self.type_name,
        }
    }

    /// Runs the command on the calling thread.
    ///
    /// Async-only executors are driven to completion with a local
    /// `block_on` when `block_on_async` is set, and refused otherwise.
    pub(crate) fn invoke(
        &self,
        command: &str,
        instance: &BoundInstance,
        block_on_async: bool,
    ) -> Result<i32, DispatchError> {
        match &self.call {
            Call::Sync(call) => call(instance)
                .ok_or_else(|| self.mismatch(command))?
                .map_err(DispatchError::Command),
            Call::Async(call) => {
                if !block_on_async {
                    return Err(DispatchError::BlockingRefused(command.to_string()));
                }
                let pending = call(Arc::clone(instance)).ok_or_else(|| self.mismatch(command))?;
                futures::executor::block_on(pending).map_err(DispatchError::Command)
            }
        }
    }

    /// Returns the command's future.
    ///
    /// Synchronous executors run eagerly here and yield an already
    /// completed future.
    pub(crate) fn invoke_async(
        &self,
        command: &str,
        instance: BoundInstance,
    ) -> BoxFuture<'static, Result<i32, DispatchError>> {
        match &self.call {
            Call::Sync(call) => {
                let result = match call(&instance) {
                    Some(result) => result.map_err(DispatchError::Command),
                    None => Err(self.mismatch(command)),
                };
                future::ready(result).boxed()
            }
            Call::Async(call) => match call(instance) {
                Some(pending) => pending.map(|r| r.map_err(DispatchError::Command)).boxed(),
                None => future::ready(Err(self.mismatch(command))).boxed(),
            },
        }
    }
}

impl fmt::Debug for Invoker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Invoker")
            .field("shape", &self.shape)
            .field("options", &self.type_name)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BoundArgs, Value};

    fn args_instance(n: i64) -> BoundInstance {
        let mut args = BoundArgs::new();
        args.insert("n", Value::Int(n));
        Arc::new(args)
    }

    #[test]
    fn test_sync_delegate_runs_eagerly_for_async_dispatch() {
        let invoker = Invoker::delegate::<BoundArgs, _>(|args| Ok(args.get::<i64>("n")? as i32));
        let pending = invoker.invoke_async("n", args_instance(5));
        assert_eq!(pending.now_or_never().unwrap().unwrap(), 5);
    }

    #[test]
    fn test_async_delegate_blocks_for_sync_dispatch() {
        let invoker = Invoker::delegate_async::<BoundArgs, _, _>(|args: Arc<BoundArgs>| async move {
            anyhow::Ok(args.get::<i64>("n")? as i32 * 2)
        });
        assert!(invoker.shape().is_async());
        assert_eq!(invoker.invoke("n", &args_instance(4), true).unwrap(), 8);
    }

    #[test]
    fn test_async_delegate_refused_without_blocking() {
        let invoker = Invoker::delegate_async::<BoundArgs, _, _>(|_: Arc<BoundArgs>| async { anyhow::Ok(0) });
        let err = invoker.invoke("sleepy", &args_instance(0), false).unwrap_err();
        assert!(matches!(err, DispatchError::BlockingRefused(c) if c == "sleepy"));
    }

    #[test]
    fn test_instance_mismatch() {
        let invoker = Invoker::delegate::<String, _>(|_| Ok(0));
        let err = invoker.invoke("x", &args_instance(0), true).unwrap_err();
        assert!(matches!(err, DispatchError::InstanceMismatch { .. }));
    }

    #[test]
    fn test_user_error_passes_through() {
        let invoker = Invoker::delegate::<BoundArgs, _>(|_| anyhow::bail!("disk full"));
        let err = invoker.invoke("x", &args_instance(0), true).unwrap_err();
        match err {
            DispatchError::Command(inner) => assert_eq!(inner.to_string(), "disk full"),
            other => panic!("unexpected error: {other}"),
        }
    }
}
