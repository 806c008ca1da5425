//! Request/response mutators and passive monitors.
//!
//! Mutators run strictly in registration order. A mutator does its
//! synchronous work against the context it is handed and then tells the
//! pipeline what remains: nothing, a future to await, or a second-phase
//! function that needs the context again. The next mutator is not invoked
//! until the previous one's chain has fully resolved, so later mutators and
//! the dispatcher observe the cumulative mutations.
//!
//! Monitors are different: they observe the finished result read-only, and
//! a panicking monitor is isolated from both the caller and the monitors
//! registered after it.

use anyhow::Result;
use futures::future::BoxFuture;
use http::{HeaderMap, Method};
use serde_json::Value;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::query::QueryParams;
use crate::response::ApiResponse;

/// Per-call options bag.
///
/// Everything here stays mutable up to the point of dispatch; request
/// mutators may rewrite any of it.
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    /// Merged over the client's default headers before the mutators run.
    pub headers: HeaderMap,
    pub query: QueryParams,
    /// Structured body; serialized to JSON bytes for body-bearing methods
    /// and omitted for the rest.
    pub body: Option<Value>,
    /// Overrides the client-level transport deadline.
    pub timeout: Option<Duration>,
    /// Overrides the client-level cancellation token.
    pub cancel: Option<CancellationToken>,
}

/// Ephemeral state of one call, alive until dispatch.
#[derive(Debug)]
pub struct RequestContext {
    /// Target path, resolved against the base address at dispatch time.
    pub path: String,
    pub method: Method,
    pub options: CallOptions,
}

/// Second-phase async function: re-invoked with the same context, awaited
/// before the next mutator runs.
pub type Continuation<C> =
    Box<dyn for<'a> FnOnce(&'a mut C) -> BoxFuture<'a, Result<()>> + Send>;

/// What remains of a mutator after its synchronous part ran.
pub enum TransformStep<C> {
    /// All work done synchronously.
    Done,
    /// Await this before running the next mutator.
    Await(BoxFuture<'static, Result<()>>),
    /// Call with the same context, await, then run the next mutator.
    Chain(Continuation<C>),
}

impl<C> std::fmt::Debug for TransformStep<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransformStep::Done => f.write_str("TransformStep::Done"),
            TransformStep::Await(_) => f.write_str("TransformStep::Await(..)"),
            TransformStep::Chain(_) => f.write_str("TransformStep::Chain(..)"),
        }
    }
}

/// Mutates an outbound request before dispatch.
pub trait RequestTransform: Send + Sync {
    fn apply(&self, ctx: &mut RequestContext) -> Result<TransformStep<RequestContext>>;
}

impl<F> RequestTransform for F
where
    F: Fn(&mut RequestContext) -> Result<TransformStep<RequestContext>> + Send + Sync,
{
    fn apply(&self, ctx: &mut RequestContext) -> Result<TransformStep<RequestContext>> {
        self(ctx)
    }
}

/// Mutates the settled result before monitors and the caller see it.
pub trait ResponseTransform: Send + Sync {
    fn apply(&self, response: &mut ApiResponse) -> Result<TransformStep<ApiResponse>>;
}

impl<F> ResponseTransform for F
where
    F: Fn(&mut ApiResponse) -> Result<TransformStep<ApiResponse>> + Send + Sync,
{
    fn apply(&self, response: &mut ApiResponse) -> Result<TransformStep<ApiResponse>> {
        self(response)
    }
}

/// Passive observer of finished results.
pub trait Monitor: Send + Sync {
    fn observe(&self, response: &ApiResponse);
}

impl<F> Monitor for F
where
    F: Fn(&ApiResponse) + Send + Sync,
{
    fn observe(&self, response: &ApiResponse) {
        self(response)
    }
}

pub(crate) async fn run_request_transforms(
    transforms: &[Arc<dyn RequestTransform>],
    ctx: &mut RequestContext,
) -> Result<()> {
    for transform in transforms {
        match transform.apply(ctx)? {
            TransformStep::Done => {}
            TransformStep::Await(fut) => fut.await?,
            TransformStep::Chain(next) => next(ctx).await?,
        }
    }
    Ok(())
}

pub(crate) async fn run_response_transforms(
    transforms: &[Arc<dyn ResponseTransform>],
    response: &mut ApiResponse,
) -> Result<()> {
    for transform in transforms {
        match transform.apply(response)? {
            TransformStep::Done => {}
            TransformStep::Await(fut) => fut.await?,
            TransformStep::Chain(next) => next(response).await?,
        }
    }
    Ok(())
}

/// Fan the finished result out to every monitor, in registration order.
/// A panicking monitor is logged and skipped; the rest still run.
pub(crate) fn run_monitors(monitors: &[Arc<dyn Monitor>], response: &ApiResponse) {
    for monitor in monitors {
        if catch_unwind(AssertUnwindSafe(|| monitor.observe(response))).is_err() {
            log::warn!("monitor panicked; ignoring");
        }
    }
}
