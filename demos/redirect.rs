//! Path-rewrite-and-redirect demo.
//!
//! Every request outside `/demo` is redirected to the same path under `/demo`
//! with a `nemo=demo` cookie. Requests already under `/demo` pass through, so
//! following the redirect does not loop. A global `before` hook sends
//! everything under `/closed` to `/maintenance`.
//!
//! Run with:
//!   RUST_LOG=debug cargo run --example redirect

use http::Method;
use nemo::{Cookie, Event, Exchange, Outcome, Pipeline};

#[tokio::main]
async fn main() -> Result<(), nemo::Error> {
    tracing_subscriber::fmt::init();

    let pipeline = Pipeline::try_from(
        Pipeline::builder().route("/", rewrite_to_demo).before(maintenance),
    )?;

    for path in ["/foo", "/demo/foo", "/closed/shop"] {
        let outcome = pipeline
            .dispatch(Exchange::new(Method::GET, path), &Event::new())
            .await?;

        println!(
            "{path:<14} -> {} location={:?} cookies=[{}] pass_through={}",
            outcome.status_code(),
            outcome.location(),
            outcome.cookies().to_request_header(),
            outcome.is_pass_through(),
        );
    }
    Ok(())
}

// `/demo` guard first: the redirect target must not redirect again.
async fn rewrite_to_demo(req: Exchange, _prev: Option<Outcome>, _ev: Event) -> Outcome {
    if req.path().starts_with("/demo") {
        return Outcome::next();
    }
    Outcome::redirect(&format!("/demo{}", req.path()))
        .with_cookie(Cookie::new("nemo", "demo"))
}

async fn maintenance(req: Exchange, _prev: Option<Outcome>, _ev: Event) -> Outcome {
    if req.path().starts_with("/closed") {
        Outcome::redirect("/maintenance").with_cookie(Cookie::new("reason", "down"))
    } else {
        Outcome::next()
    }
}
