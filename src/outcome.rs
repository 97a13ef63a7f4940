//! Candidate and final responses, and the [`IntoOutcome`] conversion trait.
//!
//! Every middleware produces an [`Outcome`]. It is one type for every kind of
//! answer a middleware can give: "no opinion, carry on" ([`Outcome::next`]),
//! a redirect, or a full response with status, headers, cookies and body.

use bytes::Bytes;
use http::header::{self, HeaderMap, HeaderValue};
use http::StatusCode;
use http_body_util::Full;

use crate::cookie::{Cookie, CookieJar};
use crate::error::BoxError;
use crate::exchange::{header_pair, try_header_pair};

/// Header set on a rendered pass-through outcome, telling the surrounding
/// runtime to forward the original request unchanged.
pub const PASS_THROUGH_HEADER: &str = "x-middleware-next";

// ── Outcome ──────────────────────────────────────────────────────────────────

/// A candidate or final response.
///
/// ```rust
/// use nemo::{Cookie, Outcome};
/// use http::StatusCode;
///
/// Outcome::next();
/// Outcome::redirect("/login").with_cookie(Cookie::new("from", "/cart"));
/// Outcome::status(StatusCode::FORBIDDEN);
///
/// Outcome::builder()
///     .status(StatusCode::CREATED)
///     .header("location", "/users/42")
///     .json(br#"{"id":42}"#.to_vec());
/// ```
#[derive(Debug, Clone)]
pub struct Outcome {
    pub(crate) status: StatusCode,
    pub(crate) headers: HeaderMap,
    pub(crate) cookies: CookieJar,
    pub(crate) body: Option<Bytes>,
    pub(crate) pass_through: bool,
}

impl Outcome {
    /// Pass-through: no opinion, proceed with the original request.
    pub fn next() -> Self {
        Self { pass_through: true, ..Self::status(StatusCode::OK) }
    }

    /// `307 Temporary Redirect` to `location`.
    ///
    /// # Panics
    ///
    /// Panics if `location` is not a valid header value.
    pub fn redirect(location: &str) -> Self {
        Self::redirect_with(StatusCode::TEMPORARY_REDIRECT, location)
    }

    /// Redirect to `location` with an explicit status (301/302/303/307/308).
    ///
    /// # Panics
    ///
    /// Panics if `location` is not a valid header value.
    pub fn redirect_with(status: StatusCode, location: &str) -> Self {
        let (name, value) = header_pair(header::LOCATION.as_str(), location);
        let mut outcome = Self::status(status);
        outcome.headers.insert(name, value);
        outcome
    }

    /// Fallible [`Outcome::redirect`], for locations built from request data.
    ///
    /// ```rust
    /// use nemo::{BoxError, Event, Exchange, Outcome};
    ///
    /// async fn back(req: Exchange, _prev: Option<Outcome>, _ev: Event) -> Result<Outcome, BoxError> {
    ///     Outcome::try_redirect(req.header("referer").unwrap_or("/"))
    /// }
    /// ```
    pub fn try_redirect(location: &str) -> Result<Self, BoxError> {
        let (name, value) = try_header_pair(header::LOCATION.as_str(), location)?;
        let mut outcome = Self::status(StatusCode::TEMPORARY_REDIRECT);
        outcome.headers.insert(name, value);
        Ok(outcome)
    }

    /// Response with no body.
    pub fn status(code: StatusCode) -> Self {
        Self {
            status: code,
            headers: HeaderMap::new(),
            cookies: CookieJar::new(),
            body: None,
            pass_through: false,
        }
    }

    /// `200 OK` — `text/plain; charset=utf-8`.
    pub fn text(body: impl Into<String>) -> Self {
        Self::builder().text(body)
    }

    /// `200 OK` — `application/json`.
    pub fn json(body: Vec<u8>) -> Self {
        Self::builder().json(body)
    }

    pub fn builder() -> OutcomeBuilder {
        OutcomeBuilder { status: StatusCode::OK, headers: HeaderMap::new(), cookies: CookieJar::new() }
    }

    /// Adds a header, replacing any previous value.
    ///
    /// # Panics
    ///
    /// Panics if `name` or `value` is not a valid header name/value.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        let (name, value) = header_pair(name, value);
        self.headers.insert(name, value);
        self
    }

    /// Fallible [`Outcome::with_header`].
    pub fn try_with_header(mut self, name: &str, value: &str) -> Result<Self, BoxError> {
        let (name, value) = try_header_pair(name, value)?;
        self.headers.insert(name, value);
        Ok(self)
    }

    pub fn with_cookie(mut self, cookie: Cookie) -> Self {
        self.cookies.upsert(cookie);
        self
    }

    pub fn status_code(&self) -> StatusCode { self.status }
    pub fn headers(&self) -> &HeaderMap { &self.headers }
    pub fn headers_mut(&mut self) -> &mut HeaderMap { &mut self.headers }
    pub fn cookies(&self) -> &CookieJar { &self.cookies }
    pub fn cookies_mut(&mut self) -> &mut CookieJar { &mut self.cookies }
    pub fn body(&self) -> Option<&Bytes> { self.body.as_ref() }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(Cookie::value)
    }

    /// The redirect target, read from the `location` header.
    pub fn location(&self) -> Option<&str> {
        self.header(header::LOCATION.as_str())
    }

    /// `true` for [`Outcome::next`] outcomes.
    pub fn is_pass_through(&self) -> bool { self.pass_through }

    /// Status is 301, 302, 303, 307 or 308.
    pub fn is_redirect(&self) -> bool {
        matches!(self.status.as_u16(), 301 | 302 | 303 | 307 | 308)
    }

    /// Status is 400 or above.
    pub fn is_error(&self) -> bool {
        self.status.as_u16() >= 400
    }

    /// Renders the outcome as an `http` response. Cookies become `set-cookie`
    /// headers; a pass-through outcome is flagged with [`PASS_THROUGH_HEADER`].
    pub fn into_response(self) -> http::Response<Full<Bytes>> {
        let mut response = http::Response::new(Full::new(self.body.unwrap_or_default()));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;

        let headers = response.headers_mut();
        for cookie in &self.cookies {
            match HeaderValue::from_str(&cookie.to_header_value()) {
                Ok(value) => { headers.append(header::SET_COOKIE, value); }
                Err(e) => tracing::warn!(cookie = cookie.name(), "dropping unrenderable cookie: {e}"),
            }
        }
        if self.pass_through {
            headers.insert(PASS_THROUGH_HEADER, HeaderValue::from_static("1"));
        }
        response
    }
}

// ── OutcomeBuilder ───────────────────────────────────────────────────────────

/// Fluent builder for [`Outcome`]. Defaults to `200 OK`. Terminated by a typed
/// body method.
pub struct OutcomeBuilder {
    status: StatusCode,
    headers: HeaderMap,
    cookies: CookieJar,
}

impl OutcomeBuilder {
    pub fn status(mut self, code: StatusCode) -> Self {
        self.status = code;
        self
    }

    /// # Panics
    ///
    /// Panics if `name` or `value` is not a valid header name/value.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        let (name, value) = header_pair(name, value);
        self.headers.append(name, value);
        self
    }

    pub fn cookie(mut self, cookie: Cookie) -> Self {
        self.cookies.upsert(cookie);
        self
    }

    pub fn json(self, body: Vec<u8>) -> Outcome {
        self.finish(Some("application/json"), Some(body.into()))
    }

    pub fn text(self, body: impl Into<String>) -> Outcome {
        self.finish(Some("text/plain; charset=utf-8"), Some(Bytes::from(body.into())))
    }

    /// Terminate with an arbitrary content type.
    pub fn bytes(self, content_type: &'static str, body: impl Into<Bytes>) -> Outcome {
        self.finish(Some(content_type), Some(body.into()))
    }

    pub fn no_body(self) -> Outcome {
        self.finish(None, None)
    }

    fn finish(mut self, content_type: Option<&'static str>, body: Option<Bytes>) -> Outcome {
        if let Some(ct) = content_type {
            self.headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(ct));
        }
        Outcome {
            status: self.status,
            headers: self.headers,
            cookies: self.cookies,
            body,
            pass_through: false,
        }
    }
}

// ── IntoOutcome ──────────────────────────────────────────────────────────────

/// Conversion of a middleware's return value into an [`Outcome`], or the
/// error that makes the dispatch fail.
///
/// Implemented for [`Outcome`], [`StatusCode`], and any `Result` whose `Ok`
/// side converts and whose `Err` side is an error, so middleware can use `?`:
///
/// ```rust
/// use nemo::{Event, Exchange, Outcome};
///
/// async fn require_session(req: Exchange, _prev: Option<Outcome>, _ev: Event)
///     -> Result<Outcome, std::num::ParseIntError>
/// {
///     let uid: u64 = req.cookie("uid").unwrap_or("0").parse()?;
///     Ok(if uid == 0 { Outcome::redirect("/login") } else { Outcome::next() })
/// }
/// ```
pub trait IntoOutcome {
    fn into_outcome(self) -> Result<Outcome, BoxError>;
}

impl IntoOutcome for Outcome {
    fn into_outcome(self) -> Result<Outcome, BoxError> { Ok(self) }
}

impl IntoOutcome for StatusCode {
    fn into_outcome(self) -> Result<Outcome, BoxError> { Ok(Outcome::status(self)) }
}

impl<T, E> IntoOutcome for Result<T, E>
where
    T: IntoOutcome,
    E: Into<BoxError>,
{
    fn into_outcome(self) -> Result<Outcome, BoxError> {
        match self {
            Ok(value) => value.into_outcome(),
            Err(e) => Err(e.into()),
        }
    }
}
