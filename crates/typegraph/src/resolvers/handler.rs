//! User handler and event source traits.

use std::future::Future;

use futures_util::future::BoxFuture;
use futures_util::stream::BoxStream;
use serde_json::Value;

use super::Params;
use crate::error::ResolverError;

/// Boxed future returned by a [`Handler`].
pub type HandlerFuture = BoxFuture<'static, Result<Value, ResolverError>>;

/// Stream of subscription payloads.
pub type EventStream = BoxStream<'static, Value>;

/// User code that computes a field value from its materialized parameters.
///
/// Any `Fn(Params) -> impl Future<Output = Result<Value, ResolverError>>`
/// closure is a handler.
pub trait Handler: Send + Sync + 'static {
    /// Runs the handler.
    fn call(&self, params: Params) -> HandlerFuture;
}

impl<F, Fut> Handler for F
where
    F: Fn(Params) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, ResolverError>> + Send + 'static,
{
    fn call(&self, params: Params) -> HandlerFuture {
        Box::pin(self(params))
    }
}

/// Produces the event stream backing a subscription field.
///
/// The source runs once per subscription, with the field's arguments,
/// context and injected dependencies; each yielded payload is then
/// resolved through the field's stage chain as the root value.
pub trait EventSource: Send + Sync + 'static {
    /// Opens the stream.
    fn subscribe(&self, params: Params) -> BoxFuture<'static, Result<EventStream, ResolverError>>;
}

impl<F, Fut> EventSource for F
where
    F: Fn(Params) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<EventStream, ResolverError>> + Send + 'static,
{
    fn subscribe(&self, params: Params) -> BoxFuture<'static, Result<EventStream, ResolverError>> {
        Box::pin(self(params))
    }
}
