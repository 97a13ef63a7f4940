//! Runs one middleware against the current exchange and classifies the result.

use http::header::{self, HeaderName};
use tracing::{trace, warn};

use crate::bridge::REDIRECT_MARKER;
use crate::error::Error;
use crate::event::Event;
use crate::exchange::{merge_cookies_into, merge_headers_into, Exchange};
use crate::middleware::BoxedMiddleware;
use crate::outcome::Outcome;

/// Headers describing a body. The prior outcome's body is never carried
/// forward, so neither are these.
const BODY_HEADERS: [HeaderName; 3] = [header::CONTENT_TYPE, header::CONTENT_LENGTH, header::CONTENT_ENCODING];

/// How an outcome reads to the stage that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Normal,
    Redirect,
    Error,
}

impl Verdict {
    pub fn of(outcome: &Outcome) -> Self {
        if outcome.is_redirect() {
            Self::Redirect
        } else if outcome.is_error() {
            Self::Error
        } else {
            Self::Normal
        }
    }

    /// Redirects and errors end the phase that produced them.
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Normal)
    }
}

/// The outcome of one stage and its classification.
#[derive(Debug)]
pub struct Executed {
    pub outcome: Outcome,
    pub verdict: Verdict,
}

/// Invokes `middleware` and carries `prior`'s headers and cookies into the
/// result wherever the new outcome does not set the same name itself. Body
/// headers stay with the body they describe.
///
/// The middleware future is raced against `event`; cancellation drops it and
/// yields [`Error::Cancelled`]. A failing middleware yields
/// [`Error::Middleware`]. Classification never changes what is returned.
pub async fn execute(
    exchange: Exchange,
    middleware: &BoxedMiddleware,
    prior: Option<&Outcome>,
    event: &Event,
) -> Result<Executed, Error> {
    if event.is_cancelled() {
        return Err(Error::Cancelled);
    }

    let call = middleware.call(exchange, prior.cloned(), event.clone());
    let mut outcome = tokio::select! {
        biased;
        () = event.cancelled() => return Err(Error::Cancelled),
        result = call => result.map_err(Error::Middleware)?,
    };

    if outcome.headers.remove(REDIRECT_MARKER).is_some() {
        warn!(header = REDIRECT_MARKER, "middleware set a reserved header; dropped");
    }

    if let Some(prior) = prior {
        let mut headers = prior.headers.clone();
        for name in BODY_HEADERS {
            headers.remove(name);
        }
        merge_headers_into(&mut headers, &outcome.headers);
        outcome.headers = headers;

        let mut cookies = prior.cookies.clone();
        merge_cookies_into(&mut cookies, &outcome.cookies);
        outcome.cookies = cookies;
    }

    let verdict = Verdict::of(&outcome);
    trace!(status = outcome.status.as_u16(), ?verdict, "stage executed");
    Ok(Executed { outcome, verdict })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    use http::{Method, StatusCode};

    use super::*;
    use crate::cookie::Cookie;
    use crate::middleware::Middleware;

    fn boxed(mw: impl Middleware) -> BoxedMiddleware {
        mw.into_boxed_middleware()
    }

    fn req() -> Exchange {
        Exchange::new(Method::GET, "/x")
    }

    async fn tag_b(_: Exchange, _: Option<Outcome>, _: Event) -> Outcome {
        Outcome::next().with_header("x-b", "new").with_header("x-shared", "new")
    }

    #[tokio::test]
    async fn prior_headers_fill_in_and_new_stage_wins_collisions() {
        let prior = Outcome::next()
            .with_header("x-a", "old")
            .with_header("x-shared", "old")
            .with_cookie(Cookie::new("c", "old"));

        let done = execute(req(), &boxed(tag_b), Some(&prior), &Event::new()).await.unwrap();

        assert_eq!(done.outcome.header("x-a"), Some("old"));
        assert_eq!(done.outcome.header("x-b"), Some("new"));
        assert_eq!(done.outcome.header("x-shared"), Some("new"));
        assert_eq!(done.outcome.cookie("c"), Some("old"));
        assert_eq!(done.verdict, Verdict::Normal);
    }

    #[tokio::test]
    async fn body_headers_do_not_outlive_their_body() {
        let prior = Outcome::text("hello").with_header("x-a", "old");

        let done = execute(req(), &boxed(tag_b), Some(&prior), &Event::new()).await.unwrap();

        assert!(done.outcome.is_pass_through());
        assert!(done.outcome.body().is_none());
        assert!(done.outcome.header("content-type").is_none());
        assert_eq!(done.outcome.header("x-a"), Some("old"));

        async fn json(_: Exchange, _: Option<Outcome>, _: Event) -> Outcome {
            Outcome::json(b"{}".to_vec())
        }
        let done = execute(req(), &boxed(json), Some(&prior), &Event::new()).await.unwrap();
        assert_eq!(done.outcome.header("content-type"), Some("application/json"));
    }

    #[tokio::test]
    async fn classifies_without_swallowing() {
        async fn moved(_: Exchange, _: Option<Outcome>, _: Event) -> Outcome {
            Outcome::redirect_with(StatusCode::MOVED_PERMANENTLY, "/new")
        }
        async fn teapot(_: Exchange, _: Option<Outcome>, _: Event) -> StatusCode {
            StatusCode::IM_A_TEAPOT
        }

        let done = execute(req(), &boxed(moved), None, &Event::new()).await.unwrap();
        assert_eq!(done.verdict, Verdict::Redirect);
        assert_eq!(done.outcome.location(), Some("/new"));

        let done = execute(req(), &boxed(teapot), None, &Event::new()).await.unwrap();
        assert_eq!(done.verdict, Verdict::Error);
        assert_eq!(done.outcome.status_code(), StatusCode::IM_A_TEAPOT);
    }

    #[tokio::test]
    async fn middleware_failure_propagates() {
        async fn broken(_: Exchange, _: Option<Outcome>, _: Event) -> Result<Outcome, &'static str> {
            Err("backend unreachable")
        }

        let err = execute(req(), &boxed(broken), None, &Event::new()).await.unwrap_err();
        assert!(matches!(err, Error::Middleware(_)));
        assert_eq!(err.to_string(), "middleware failed: backend unreachable");
    }

    #[tokio::test]
    async fn reserved_marker_is_stripped() {
        async fn sneaky(_: Exchange, _: Option<Outcome>, _: Event) -> Outcome {
            Outcome::next().with_header(REDIRECT_MARKER, "/elsewhere")
        }

        let done = execute(req(), &boxed(sneaky), None, &Event::new()).await.unwrap();
        assert!(done.outcome.header(REDIRECT_MARKER).is_none());
    }

    #[tokio::test]
    async fn cancelled_event_skips_the_call() {
        let called = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&called);
        let mw = move |_: Exchange, _: Option<Outcome>, _: Event| {
            flag.store(true, Ordering::SeqCst);
            async { Outcome::next() }
        };

        let event = Event::new();
        event.cancel();
        let err = execute(req(), &boxed(mw), None, &event).await.unwrap_err();

        assert!(err.is_cancelled());
        assert!(!called.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn cancellation_aborts_in_flight_middleware() {
        let finished = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&finished);
        let mw = move |_: Exchange, _: Option<Outcome>, _: Event| {
            let flag = Arc::clone(&flag);
            async move {
                tokio::time::sleep(Duration::from_secs(30)).await;
                flag.store(true, Ordering::SeqCst);
                Outcome::next()
            }
        };

        let event = Event::new();
        let canceller = event.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            canceller.cancel();
        });

        let err = execute(req(), &boxed(mw), None, &event).await.unwrap_err();
        assert!(err.is_cancelled());
        assert!(!finished.load(Ordering::SeqCst));
    }
}
