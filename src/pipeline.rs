//! Pipeline configuration and the dispatcher.
//!
//! One dispatch walks a fixed sequence:
//!
//! ```text
//! before hook ─┬─ ends dispatch ──────────────────────────────► bridge ─► return
//!              └─ every matching path entry, in order ─► after hook ─┬─ ends ─► bridge ─► return
//!                                                                    └─ chain outcome or Outcome::next()
//! ```
//!
//! Every entry whose pattern matches runs. This is not a first-match router.

use bytes::Bytes;
use http::StatusCode;
use http_body_util::{BodyExt, Full};
use tracing::{debug, error, Instrument};

use crate::bridge::bridge;
use crate::chain::run_chain;
use crate::error::{BoxError, ConfigError, Error};
use crate::event::Event;
use crate::exchange::{merge_cookies_into, merge_headers_into, Exchange};
use crate::hooks::{run_global, GlobalHooks, Phase};
use crate::middleware::{Chain, Middleware};
use crate::outcome::Outcome;
use crate::pattern::PathPattern;

/// A compiled path entry.
struct Entry {
    pattern: PathPattern,
    chain: Chain,
}

/// A built, immutable middleware pipeline.
///
/// Build it once at startup and share it (it is `Send + Sync`); each
/// [`dispatch`](Pipeline::dispatch) is independent and holds no state
/// between requests.
///
/// ```rust
/// use nemo::{Chain, Event, Exchange, Outcome, Pipeline};
/// use http::Method;
///
/// async fn tag(_: Exchange, _: Option<Outcome>, _: Event) -> Outcome {
///     Outcome::next().with_header("x-api", "1")
/// }
///
/// # tokio_test_block_on(async {
/// let pipeline = Pipeline::builder()
///     .route("/api/**", tag)
///     .build()
///     .unwrap();
///
/// let outcome = pipeline
///     .dispatch(Exchange::new(Method::GET, "/api/users"), &Event::new())
///     .await
///     .unwrap();
/// assert_eq!(outcome.header("x-api"), Some("1"));
/// # });
/// # fn tokio_test_block_on<F: std::future::Future>(f: F) -> F::Output {
/// #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
/// # }
/// ```
pub struct Pipeline {
    entries: Vec<Entry>,
    hooks: GlobalHooks,
}

impl Pipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    /// Dispatches one request and decides its outcome.
    ///
    /// Fails only when a middleware fails or `event` is cancelled; redirects
    /// and error statuses come back as `Ok` outcomes.
    pub async fn dispatch(&self, exchange: Exchange, event: &Event) -> Result<Outcome, Error> {
        let span = tracing::debug_span!("dispatch", method = %exchange.method(), path = exchange.path());
        self.dispatch_inner(exchange, event).instrument(span).await
    }

    async fn dispatch_inner(&self, request: Exchange, event: &Event) -> Result<Outcome, Error> {
        let path = request.path().to_owned();
        let mut exchange = request.clone();

        if let Some(before) = run_global(Phase::Before, &exchange, event, &self.hooks).await? {
            if before.ends_dispatch() {
                return Ok(bridge(&request, before.outcome, before.intent.as_ref()));
            }
            exchange = exchange.folded(&before.outcome.headers, &before.outcome.cookies);
        }

        let mut outcome: Option<Outcome> = None;
        for entry in self.entries.iter().filter(|e| e.pattern.matches(&path)) {
            debug!(pattern = entry.pattern.as_str(), stages = entry.chain.len(), "path entry matched");
            let run = run_chain(&exchange, &entry.chain, outcome.take(), event).await?;
            exchange = run.exchange;
            outcome = Some(run.outcome);

            if run.verdict.is_terminal() {
                debug!(pattern = entry.pattern.as_str(), verdict = ?run.verdict, "path dispatch stopped");
                break;
            }
        }

        if let Some(after) = run_global(Phase::After, &exchange, event, &self.hooks).await? {
            if after.ends_dispatch() {
                return Ok(bridge(&request, after.outcome, after.intent.as_ref()));
            }
            let mut last = outcome.unwrap_or_else(Outcome::next);
            merge_headers_into(&mut last.headers, &after.outcome.headers);
            merge_cookies_into(&mut last.cookies, &after.outcome.cookies);
            outcome = Some(last);
        }

        Ok(outcome.unwrap_or_else(Outcome::next))
    }

    /// Adapter for `http`-based runtimes: collects the body, dispatches with
    /// a fresh [`Event`], and renders the result. Any dispatch failure becomes
    /// one generic `500 Internal Server Error`.
    pub async fn handle<B>(&self, req: http::Request<B>) -> http::Response<Full<Bytes>>
    where
        B: hyper::body::Body<Data = Bytes>,
        B::Error: Into<BoxError>,
    {
        self.handle_with(req, &Event::new()).await
    }

    /// [`handle`](Pipeline::handle) with a caller-owned event, so the runtime
    /// can cancel the dispatch.
    pub async fn handle_with<B>(&self, req: http::Request<B>, event: &Event) -> http::Response<Full<Bytes>>
    where
        B: hyper::body::Body<Data = Bytes>,
        B::Error: Into<BoxError>,
    {
        let (parts, body) = req.into_parts();
        let body = match body.collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) => {
                let e: BoxError = e.into();
                error!(error = %e, "failed to read request body");
                return Outcome::status(StatusCode::INTERNAL_SERVER_ERROR).into_response();
            }
        };

        let exchange = Exchange::from_request(http::Request::from_parts(parts, body));
        match self.dispatch(exchange, event).await {
            Ok(outcome) => outcome.into_response(),
            Err(e) => {
                error!(error = %e, "dispatch failed");
                Outcome::status(StatusCode::INTERNAL_SERVER_ERROR).into_response()
            }
        }
    }

    /// Registered patterns, in evaluation order.
    pub fn patterns(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.pattern.as_str())
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("patterns", &self.patterns().collect::<Vec<_>>())
            .field("hooks", &self.hooks)
            .finish()
    }
}

// ── Builder ──────────────────────────────────────────────────────────────────

/// Collects path entries and hooks; [`build`](PipelineBuilder::build)
/// validates and compiles them. Every method returns `self` so registrations
/// chain naturally.
#[derive(Default)]
pub struct PipelineBuilder {
    entries: Vec<(String, Chain)>,
    hooks: GlobalHooks,
}

impl PipelineBuilder {
    /// Binds a single middleware to `pattern`.
    pub fn route(self, pattern: &str, middleware: impl Middleware) -> Self {
        self.chain(pattern, Chain::new().then(middleware))
    }

    /// Binds an ordered chain to `pattern`.
    pub fn chain(mut self, pattern: &str, chain: Chain) -> Self {
        self.entries.push((pattern.to_owned(), chain));
        self
    }

    /// Installs the global hook that runs before any path entry.
    pub fn before(mut self, hook: impl Middleware) -> Self {
        self.hooks.set(Phase::Before, hook);
        self
    }

    /// Installs the global hook that runs after all path entries.
    pub fn after(mut self, hook: impl Middleware) -> Self {
        self.hooks.set(Phase::After, hook);
        self
    }

    /// Compiles every pattern and checks every chain. A pipeline that fails
    /// here never dispatches.
    pub fn build(self) -> Result<Pipeline, ConfigError> {
        let mut entries: Vec<Entry> = Vec::with_capacity(self.entries.len());
        for (pattern, chain) in self.entries {
            if entries.iter().any(|e| e.pattern.as_str() == pattern) {
                return Err(ConfigError::DuplicatePattern { pattern });
            }
            if chain.is_empty() {
                return Err(ConfigError::EmptyChain { pattern });
            }
            entries.push(Entry { pattern: PathPattern::parse(&pattern)?, chain });
        }

        debug!(entries = entries.len(), hooks = ?self.hooks, "pipeline built");
        Ok(Pipeline { entries, hooks: self.hooks })
    }
}

/// Builds through [`PipelineBuilder::build`], widening the error so startup
/// code returning [`Error`] can use `?` for both building and dispatching.
impl TryFrom<PipelineBuilder> for Pipeline {
    type Error = Error;

    fn try_from(builder: PipelineBuilder) -> Result<Self, Error> {
        Ok(builder.build()?)
    }
}

#[cfg(test)]
mod tests {
    use http::Method;

    use super::*;

    async fn noop(_: Exchange, _: Option<Outcome>, _: Event) -> Outcome {
        Outcome::next()
    }

    #[test]
    fn build_rejects_empty_chain() {
        let err = Pipeline::builder().chain("/a", Chain::new()).build().unwrap_err();
        assert!(matches!(err, ConfigError::EmptyChain { ref pattern } if pattern == "/a"));
    }

    #[test]
    fn build_rejects_duplicate_pattern() {
        let err = Pipeline::builder().route("/a", noop).route("/a", noop).build().unwrap_err();
        assert!(matches!(err, ConfigError::DuplicatePattern { .. }));
    }

    #[test]
    fn build_rejects_bad_pattern() {
        let err = Pipeline::builder().route("/a/**/b", noop).build().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPattern { .. }));
    }

    #[test]
    fn try_from_builder_reports_config_errors() {
        let err = Pipeline::try_from(Pipeline::builder().route("relative", noop)).unwrap_err();
        assert!(matches!(err, Error::Config(ConfigError::InvalidPattern { .. })), "{err}");

        let pipeline = Pipeline::try_from(Pipeline::builder().route("/a", noop)).unwrap();
        assert_eq!(pipeline.patterns().collect::<Vec<_>>(), ["/a"]);
    }

    #[test]
    fn patterns_keep_registration_order() {
        let pipeline = Pipeline::builder()
            .route("/z", noop)
            .route("/a", noop)
            .route("**", noop)
            .build()
            .unwrap();
        assert_eq!(pipeline.patterns().collect::<Vec<_>>(), ["/z", "/a", "**"]);
    }

    #[tokio::test]
    async fn no_match_defaults_to_pass_through() {
        let pipeline = Pipeline::builder().route("/only", noop).build().unwrap();
        let out = pipeline.dispatch(Exchange::new(Method::GET, "/other"), &Event::new()).await.unwrap();
        assert!(out.is_pass_through());
    }

    #[tokio::test]
    async fn cancelled_dispatch_fails() {
        let pipeline = Pipeline::builder().route("**", noop).build().unwrap();
        let event = Event::new();
        event.cancel();
        let err = pipeline.dispatch(Exchange::new(Method::GET, "/"), &event).await.unwrap_err();
        assert!(err.is_cancelled());
    }
}
