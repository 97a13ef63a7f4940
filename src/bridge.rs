//! Redirect bridge: turns a hook-triggered redirect into a single
//! client-facing redirect.
//!
//! When a global hook redirects, the hook runner captures where to and which
//! cookies to set as a [`RedirectIntent`]. The dispatcher then hands the
//! intent to [`bridge`], which builds a fresh redirect from the request plus
//! the intent instead of returning the hook's outcome verbatim.
//!
//! The redirected client comes back as a brand-new request with no intent
//! attached, so the bridge cannot fire twice for one redirect. A hook that
//! redirects unconditionally will still loop across requests; hooks guard on
//! their own target path (see `demos/redirect.rs`).

use http::header::{self, HeaderName};
use http::StatusCode;

use crate::cookie::CookieJar;
use crate::exchange::{merge_cookies_into, Exchange};
use crate::outcome::Outcome;

/// Reserved header name. Never forwarded from a client and never accepted
/// from a middleware outcome.
pub const REDIRECT_MARKER: &str = "x-nemo-redirect";

/// Request headers that describe the request's own body or connection and
/// must not appear on the bodiless redirect.
const NOT_FORWARDED: [HeaderName; 11] = [
    header::COOKIE,
    header::CONTENT_LENGTH,
    header::CONTENT_TYPE,
    header::CONTENT_ENCODING,
    header::TRANSFER_ENCODING,
    header::HOST,
    header::CONNECTION,
    header::TE,
    header::TRAILER,
    header::UPGRADE,
    header::PROXY_AUTHORIZATION,
];

const NOT_FORWARDED_LEGACY: [&str; 2] = ["keep-alive", "proxy-connection"];

/// What a redirecting hook asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectIntent {
    pub status: StatusCode,
    pub location: String,
    pub cookies: CookieJar,
}

impl RedirectIntent {
    /// Captures the intent behind a redirect outcome. `None` when the outcome
    /// is not a redirect or carries no `location`.
    pub fn from_outcome(outcome: &Outcome) -> Option<Self> {
        if !outcome.is_redirect() {
            return None;
        }
        Some(Self {
            status: outcome.status_code(),
            location: outcome.location()?.to_owned(),
            cookies: outcome.cookies().clone(),
        })
    }
}

/// With an intent: a fresh redirect to the intent's location carrying the
/// request's end-to-end headers, every request cookie and then the intent's
/// cookies. Body, framing and connection headers stay behind.
/// Without one: `outcome`, unchanged.
pub fn bridge(request: &Exchange, outcome: Outcome, intent: Option<&RedirectIntent>) -> Outcome {
    let Some(intent) = intent else {
        return outcome;
    };

    tracing::debug!(location = %intent.location, status = intent.status.as_u16(), "bridging hook redirect");

    let mut redirect = Outcome::redirect_with(intent.status, &intent.location);
    let location = redirect.headers.remove(header::LOCATION);

    redirect.headers = request.headers().clone();
    for name in &NOT_FORWARDED {
        redirect.headers.remove(name);
    }
    for name in NOT_FORWARDED_LEGACY.into_iter().chain([REDIRECT_MARKER]) {
        redirect.headers.remove(name);
    }
    if let Some(location) = location {
        redirect.headers.insert(header::LOCATION, location);
    }

    merge_cookies_into(&mut redirect.cookies, request.cookies());
    merge_cookies_into(&mut redirect.cookies, &intent.cookies);
    redirect
}
