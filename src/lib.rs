//! # nemo
//!
//! Path-keyed middleware composition for HTTP request pipelines.
//!
//! You hand nemo a set of path patterns, each bound to an ordered chain of
//! middleware, plus optional global `before` / `after` hooks. For every
//! request nemo runs the chains of *all* matching patterns, threads header and
//! cookie changes from stage to stage, and decides the one outcome to return.
//! Middleware authors never have to know about each other.
//!
//! ## What a dispatch does
//!
//! 1. `before` hook. A redirect or concrete response ends the dispatch.
//! 2. Every path entry whose pattern matches, in registration order. Each
//!    stage sees the headers and cookies set by every stage before it.
//!    A redirect or error status stops path dispatch.
//! 3. `after` hook. Same rules as `before`.
//! 4. The last outcome produced, or [`Outcome::next`] if nothing had an opinion.
//!
//! Hook redirects go through the [redirect bridge](bridge), which turns them
//! into one client-facing redirect carrying the request's cookies.
//!
//! What nemo does not do: transport, HTTP parsing, state between requests.
//! Pair it with whatever server you already run; [`Pipeline::handle`] speaks
//! `http::Request` / `http::Response`.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use nemo::{Cookie, Event, Exchange, Outcome, Pipeline};
//! use http::Method;
//!
//! #[tokio::main]
//! async fn main() {
//!     let pipeline = Pipeline::builder()
//!         .route("/", to_demo)
//!         .build()
//!         .expect("invalid pipeline");
//!
//!     let outcome = pipeline
//!         .dispatch(Exchange::new(Method::GET, "/foo"), &Event::new())
//!         .await
//!         .unwrap();
//!     assert_eq!(outcome.location(), Some("/demo/foo"));
//! }
//!
//! async fn to_demo(req: Exchange, _prev: Option<Outcome>, _ev: Event) -> Outcome {
//!     if req.path().starts_with("/demo") {
//!         return Outcome::next();
//!     }
//!     Outcome::redirect(&format!("/demo{}", req.path()))
//!         .with_cookie(Cookie::new("nemo", "demo"))
//! }
//! ```

mod chain;
mod cookie;
mod error;
mod event;
mod exchange;
mod executor;
mod hooks;
mod middleware;
mod outcome;
mod pattern;
mod pipeline;

pub mod bridge;

pub use chain::{run_chain, ChainRun};
pub use cookie::{Cookie, CookieJar, SameSite};
pub use error::{BoxError, ConfigError, Error};
pub use event::Event;
pub use exchange::{merge_cookies_into, merge_headers_into, Exchange};
pub use executor::{execute, Executed, Verdict};
pub use hooks::{run_global, GlobalHooks, HookRun, Phase};
pub use middleware::{BoxedMiddleware, Chain, Middleware};
pub use outcome::{IntoOutcome, Outcome, OutcomeBuilder, PASS_THROUGH_HEADER};
pub use pattern::{matches, PathPattern};
pub use pipeline::{Pipeline, PipelineBuilder};
