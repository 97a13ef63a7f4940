//! Middleware trait, type erasure, and chains.
//!
//! # How async middleware is stored
//!
//! A pipeline holds middleware of many different concrete types, so each one
//! is hidden behind a trait object and stored as a [`BoxedMiddleware`]:
//!
//! ```text
//! async fn stamp(req, prev, ev) -> Outcome { … }   ← user writes this
//!        ↓ Chain::new().then(stamp)
//! stamp.into_boxed_middleware()                    ← Middleware blanket impl
//!        ↓
//! Arc::new(FnMiddleware(stamp))                    ← stored as Arc<dyn ErasedMiddleware>
//!        ↓
//! middleware.call(req, prev, ev)  at dispatch time ← one vtable dispatch
//!        ↓
//! Box::pin(async { stamp(..).await.into_outcome() })
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::error::BoxError;
use crate::event::Event;
use crate::exchange::Exchange;
use crate::outcome::{IntoOutcome, Outcome};

// ── Internal types ────────────────────────────────────────────────────────────

/// A heap-allocated, type-erased future resolving to a middleware's result.
pub(crate) type BoxFuture = Pin<Box<dyn Future<Output = Result<Outcome, BoxError>> + Send + 'static>>;

/// Internal dispatch interface.
#[doc(hidden)]
pub trait ErasedMiddleware {
    fn call(&self, exchange: Exchange, prior: Option<Outcome>, event: Event) -> BoxFuture;
}

/// A type-erased middleware, shared by every dispatch of a pipeline.
#[doc(hidden)]
pub type BoxedMiddleware = Arc<dyn ErasedMiddleware + Send + Sync + 'static>;

// ── Public Middleware trait ──────────────────────────────────────────────────

/// Implemented for every valid middleware function.
///
/// You never implement this yourself. It is satisfied by any async function
/// (or closure returning a future) with the shape:
///
/// ```text
/// async fn name(exchange: Exchange, prior: Option<Outcome>, event: Event) -> impl IntoOutcome
/// ```
///
/// `prior` is the outcome accumulated so far for the current path dispatch
/// (`None` for the first stage and for global hooks).
pub trait Middleware: private::Sealed + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_middleware(self) -> BoxedMiddleware;
}

mod private {
    pub trait Sealed {}
}

impl<F, Fut, R> private::Sealed for F
where
    F: Fn(Exchange, Option<Outcome>, Event) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoOutcome + Send + 'static,
{
}

impl<F, Fut, R> Middleware for F
where
    F: Fn(Exchange, Option<Outcome>, Event) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoOutcome + Send + 'static,
{
    fn into_boxed_middleware(self) -> BoxedMiddleware {
        Arc::new(FnMiddleware(self))
    }
}

struct FnMiddleware<F>(F);

impl<F, Fut, R> ErasedMiddleware for FnMiddleware<F>
where
    F: Fn(Exchange, Option<Outcome>, Event) -> Fut + Send + Sync,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoOutcome + Send + 'static,
{
    fn call(&self, exchange: Exchange, prior: Option<Outcome>, event: Event) -> BoxFuture {
        let fut = (self.0)(exchange, prior, event);
        Box::pin(async move { fut.await.into_outcome() })
    }
}

// ── Chain ────────────────────────────────────────────────────────────────────

/// An ordered list of middleware bound to one path pattern.
///
/// ```rust
/// use nemo::{Chain, Event, Exchange, Outcome};
///
/// async fn auth(_: Exchange, _: Option<Outcome>, _: Event) -> Outcome { Outcome::next() }
/// async fn audit(_: Exchange, _: Option<Outcome>, _: Event) -> Outcome { Outcome::next() }
///
/// let chain = Chain::new().then(auth).then(audit);
/// assert_eq!(chain.len(), 2);
/// ```
///
/// An empty chain is rejected when the pipeline is built.
#[derive(Clone, Default)]
pub struct Chain {
    stages: Vec<BoxedMiddleware>,
}

impl Chain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `middleware` to the end of the chain.
    pub fn then(mut self, middleware: impl Middleware) -> Self {
        self.stages.push(middleware.into_boxed_middleware());
        self
    }

    pub fn len(&self) -> usize { self.stages.len() }
    pub fn is_empty(&self) -> bool { self.stages.is_empty() }

    pub(crate) fn stages(&self) -> &[BoxedMiddleware] {
        &self.stages
    }
}

impl std::fmt::Debug for Chain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chain").field("len", &self.stages.len()).finish()
    }
}
