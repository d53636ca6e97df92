//! Operation values and the handler registry that dispatches them.
//!
//! An operation is a typed request naming a capability; the handler
//! registered for its key is how that capability is carried out. Keeping the
//! two apart lets a host swap or mock whole verticals by re-registering
//! keys.

use std::{
    any::Any,
    collections::HashMap,
    marker::PhantomData,
    time::Duration,
};

use futures::future::BoxFuture;

use crate::{
    client::Sextant,
    error::{
        ClientError,
        ClientResult,
    },
    scope::{
        CancelHandle,
        CancelScope,
        CancellationReason,
    },
};

/// An immutable request value: a key naming a capability plus the input it
/// runs with. Carries no behavior; the output type exists for inference only.
pub struct Operation<I, O> {
    key: &'static str,
    input: I,
    _output: PhantomData<fn() -> O>,
}

impl<I, O> Operation<I, O> {
    pub fn new(key: &'static str, input: I) -> Self {
        Self {
            key,
            input,
            _output: PhantomData,
        }
    }

    pub fn key(&self) -> &'static str {
        self.key
    }

    pub fn input(&self) -> &I {
        &self.input
    }
}

/// Implements one operation's behavior. Blanket-implemented for functions of
/// the same shape, so plain `fn` handlers register directly.
pub trait OperationHandler<C, I, O>: Send + Sync {
    fn handle<'a>(
        &'a self,
        input: I,
        client: &'a Sextant<C>,
        scope: &'a CancelScope,
    ) -> BoxFuture<'a, ClientResult<O>>;
}

impl<C, I, O, F> OperationHandler<C, I, O> for F
where
    F: for<'a> Fn(I, &'a Sextant<C>, &'a CancelScope) -> BoxFuture<'a, ClientResult<O>>
        + Send
        + Sync,
{
    fn handle<'a>(
        &'a self,
        input: I,
        client: &'a Sextant<C>,
        scope: &'a CancelScope,
    ) -> BoxFuture<'a, ClientResult<O>> {
        self(input, client, scope)
    }
}

/// Object-safe shim over a typed handler: inputs and outputs cross as
/// `Any` boxes so one table can hold every operation's handler.
trait ErasedHandler<C>: Send + Sync {
    fn call<'a>(
        &'a self,
        input: Box<dyn Any + Send>,
        client: &'a Sextant<C>,
        scope: &'a CancelScope,
    ) -> BoxFuture<'a, ClientResult<Box<dyn Any + Send>>>;
}

struct Erased<H, I, O> {
    key: &'static str,
    handler: H,
    _marker: PhantomData<fn(I) -> O>,
}

impl<C, I, O, H> ErasedHandler<C> for Erased<H, I, O>
where
    C: Send + Sync,
    I: Send + 'static,
    O: Send + 'static,
    H: OperationHandler<C, I, O>,
{
    fn call<'a>(
        &'a self,
        input: Box<dyn Any + Send>,
        client: &'a Sextant<C>,
        scope: &'a CancelScope,
    ) -> BoxFuture<'a, ClientResult<Box<dyn Any + Send>>> {
        Box::pin(async move {
            let input = input
                .downcast::<I>()
                .map_err(|_| ClientError::OperationInputMismatch { key: self.key })?;
            let output = self.handler.handle(*input, client, scope).await?;
            Ok(Box::new(output) as Box<dyn Any + Send>)
        })
    }
}

/// Cancellation and deadline inputs for one dispatch.
#[derive(Default)]
pub struct ExecuteOptions {
    /// External cancellation signal the operation's scope observes.
    pub signal: Option<CancelHandle>,
    /// Cooperative deadline. Expiry cancels the operation's scope, never the
    /// caller's shared signal; the handler observes it at its next
    /// checkpoint.
    pub timeout: Option<Duration>,
}

/// The table mapping operation keys to handlers.
///
/// Owned by a composition root and populated during its explicit
/// plugin-install phase; dispatch only reads it. Registering a key that is
/// already present silently replaces the previous handler so plugins can
/// override each other, which makes registration order significant.
pub struct OperationRegistry<C> {
    handlers: HashMap<&'static str, Box<dyn ErasedHandler<C>>>,
}

impl<C> Default for OperationRegistry<C> {
    fn default() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }
}

impl<C: Send + Sync> OperationRegistry<C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or overwrites the handler for `key`. Last registration wins.
    pub fn register<I, O, H>(&mut self, key: &'static str, handler: H)
    where
        I: Send + 'static,
        O: Send + 'static,
        H: OperationHandler<C, I, O> + 'static,
    {
        self.handlers.insert(
            key,
            Box::new(Erased {
                key,
                handler,
                _marker: PhantomData,
            }),
        );
    }

    pub fn contains(&self, key: &str) -> bool {
        self.handlers.contains_key(key)
    }

    fn lookup(&self, key: &str) -> ClientResult<&dyn ErasedHandler<C>> {
        self.handlers
            .get(key)
            .map(|handler| handler.as_ref())
            .ok_or_else(|| ClientError::HandlerMissing {
                key: key.to_string(),
            })
    }

    /// Resolves the handler for `operation` and runs it to settlement.
    /// Handler-internal failures propagate unchanged; nothing is retried.
    pub async fn execute<I, O>(
        &self,
        operation: Operation<I, O>,
        client: &Sextant<C>,
        options: ExecuteOptions,
    ) -> ClientResult<O>
    where
        I: Send + 'static,
        O: Send + 'static,
    {
        let handler = self.lookup(operation.key)?;
        run_handler(handler, operation.key, Box::new(operation.input), client, &options).await
    }

    /// A cold representation of the same call: the handler is resolved once,
    /// here, and the task can then be run whenever, with a caller-chosen
    /// cancellation signal, without another lookup.
    pub fn task<I, O>(&self, operation: Operation<I, O>) -> ClientResult<OperationTask<'_, C, I, O>> {
        let handler = self.lookup(operation.key)?;
        Ok(OperationTask {
            handler,
            key: operation.key,
            input: operation.input,
            _output: PhantomData,
        })
    }
}

async fn run_handler<C: Send + Sync, O: Send + 'static>(
    handler: &dyn ErasedHandler<C>,
    key: &'static str,
    input: Box<dyn Any + Send>,
    client: &Sextant<C>,
    options: &ExecuteOptions,
) -> ClientResult<O> {
    let scope = match &options.signal {
        Some(handle) => CancelScope::attached(handle),
        None => CancelScope::detached(),
    };

    let mut call = handler.call(input, client, &scope);
    let output = match options.timeout {
        Some(timeout) => {
            tokio::select! {
                output = &mut call => output,
                _ = tokio::time::sleep(timeout) => {
                    // Deadline expiry is delivered through the scope; the
                    // handler keeps running until its next checkpoint
                    // observes it.
                    scope.cancel(CancellationReason::TimedOut(timeout));
                    call.await
                }
            }
        }
        None => call.await,
    }?;

    output
        .downcast::<O>()
        .map(|output| *output)
        .map_err(|_| ClientError::OperationOutputMismatch { key })
}

/// A deferred dispatch produced by [`OperationRegistry::task`]. Runnable
/// repeatedly as long as the input clones.
pub struct OperationTask<'r, C, I, O> {
    handler: &'r dyn ErasedHandler<C>,
    key: &'static str,
    input: I,
    _output: PhantomData<fn() -> O>,
}

impl<C, I, O> OperationTask<'_, C, I, O>
where
    C: Send + Sync,
    I: Clone + Send + 'static,
    O: Send + 'static,
{
    pub fn key(&self) -> &'static str {
        self.key
    }

    pub async fn run(&self, client: &Sextant<C>, options: ExecuteOptions) -> ClientResult<O> {
        run_handler(
            self.handler,
            self.key,
            Box::new(self.input.clone()),
            client,
            &options,
        )
        .await
    }
}
