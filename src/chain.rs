//! Runs the middleware chain of one matched path entry.

use tracing::debug;

use crate::error::Error;
use crate::event::Event;
use crate::exchange::Exchange;
use crate::executor::{execute, Verdict};
use crate::middleware::Chain;
use crate::outcome::Outcome;

/// What a chain leaves behind for the rest of the dispatch.
#[derive(Debug)]
pub struct ChainRun {
    /// The exchange with every completed stage's headers and cookies folded in.
    pub exchange: Exchange,
    /// The last outcome produced by the chain.
    pub outcome: Outcome,
    /// Classification of `outcome`. Terminal when a stage stopped the chain.
    pub verdict: Verdict,
}

/// Runs `chain` stage by stage.
///
/// - Each stage sees an exchange carrying the cumulative header/cookie effects
///   of all earlier stages. `exchange` itself is never mutated; every stage
///   gets a freshly folded copy.
/// - Each stage's outcome becomes the running outcome handed to the next
///   stage as `prior`. `prior` seeds that slot for the first stage.
/// - A redirect or error outcome stops the chain: later stages do not run
///   and that outcome is the chain's result.
///
/// `chain` must be non-empty; the pipeline builder guarantees it.
pub async fn run_chain(
    exchange: &Exchange,
    chain: &Chain,
    prior: Option<Outcome>,
    event: &Event,
) -> Result<ChainRun, Error> {
    let mut current = exchange.clone();
    let mut running = prior;
    let mut verdict = Verdict::Normal;

    for (stage, middleware) in chain.stages().iter().enumerate() {
        let done = execute(current.clone(), middleware, running.as_ref(), event).await?;
        current = current.folded(&done.outcome.headers, &done.outcome.cookies);
        verdict = done.verdict;
        running = Some(done.outcome);

        if verdict.is_terminal() {
            debug!(stage, ?verdict, "chain stopped early");
            break;
        }
    }

    let outcome = running.unwrap_or_else(Outcome::next);
    Ok(ChainRun { exchange: current, outcome, verdict })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use http::{Method, StatusCode};

    use super::*;
    use crate::cookie::Cookie;

    async fn set_user(_: Exchange, _: Option<Outcome>, _: Event) -> Outcome {
        Outcome::next().with_header("x-user", "alice").with_cookie(Cookie::new("seen", "1"))
    }

    async fn echo_user(req: Exchange, _: Option<Outcome>, _: Event) -> Outcome {
        let user = req.header("x-user").unwrap_or("nobody").to_owned();
        let seen = req.cookie("seen").unwrap_or("0").to_owned();
        Outcome::next().with_header("x-echo", &format!("{user}:{seen}"))
    }

    #[tokio::test]
    async fn later_stages_see_earlier_effects() {
        let req = Exchange::new(Method::GET, "/p");
        let chain = Chain::new().then(set_user).then(echo_user);

        let run = run_chain(&req, &chain, None, &Event::new()).await.unwrap();

        assert_eq!(run.outcome.header("x-echo"), Some("alice:1"));
        assert_eq!(run.outcome.header("x-user"), Some("alice"));
        assert_eq!(run.outcome.cookie("seen"), Some("1"));
        assert_eq!(run.exchange.header("x-user"), Some("alice"));
        assert_eq!(run.verdict, Verdict::Normal);
        assert!(req.header("x-user").is_none(), "caller's exchange is untouched");
    }

    #[tokio::test]
    async fn error_stage_stops_the_chain() {
        let second_ran = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&second_ran);
        let second = move |_: Exchange, _: Option<Outcome>, _: Event| {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Outcome::next() }
        };
        async fn fail(_: Exchange, _: Option<Outcome>, _: Event) -> StatusCode {
            StatusCode::INTERNAL_SERVER_ERROR
        }

        let chain = Chain::new().then(fail).then(second);
        let run = run_chain(&Exchange::new(Method::GET, "/"), &chain, None, &Event::new())
            .await
            .unwrap();

        assert_eq!(run.outcome.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(run.verdict, Verdict::Error);
        assert_eq!(second_ran.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn prior_outcome_seeds_the_first_stage() {
        async fn inspect(_: Exchange, prior: Option<Outcome>, _: Event) -> Outcome {
            let from = prior.and_then(|p| p.header("x-from").map(str::to_owned));
            Outcome::next().with_header("x-saw", from.as_deref().unwrap_or("none"))
        }

        let prior = Outcome::next().with_header("x-from", "entry-1");
        let run = run_chain(
            &Exchange::new(Method::GET, "/"),
            &Chain::new().then(inspect),
            Some(prior),
            &Event::new(),
        )
        .await
        .unwrap();

        assert_eq!(run.outcome.header("x-saw"), Some("entry-1"));
        assert_eq!(run.outcome.header("x-from"), Some("entry-1"));
    }
}
