//! The request side of a dispatch, and the two merge operations that carry
//! state across stage boundaries.

use bytes::Bytes;
use http::header::{self, HeaderMap, HeaderName, HeaderValue};
use http::Method;

use crate::bridge::REDIRECT_MARKER;
use crate::cookie::{Cookie, CookieJar};
use crate::error::BoxError;

/// One inbound request as it flows through the pipeline.
///
/// Header names are case-insensitive. Each middleware receives its own copy;
/// effects of earlier stages reach later ones only through the engine's
/// header/cookie folding, never by shared mutation. The body is opaque and
/// cheap to clone.
#[derive(Debug, Clone)]
pub struct Exchange {
    pub(crate) method: Method,
    pub(crate) path: String,
    pub(crate) headers: HeaderMap,
    pub(crate) cookies: CookieJar,
    pub(crate) body: Bytes,
}

impl Exchange {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: HeaderMap::new(),
            cookies: CookieJar::new(),
            body: Bytes::new(),
        }
    }

    /// Builds an exchange from an `http` request. Cookies are parsed out of
    /// the `Cookie` header; a client-supplied reserved marker header is dropped.
    pub fn from_request(req: http::Request<Bytes>) -> Self {
        let (parts, body) = req.into_parts();
        let mut headers = parts.headers;
        headers.remove(REDIRECT_MARKER);

        let cookies = headers.get_all(header::COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| CookieJar::parse(v).iter().cloned().collect::<Vec<_>>())
            .collect();

        Self {
            method: parts.method,
            path: parts.uri.path().to_owned(),
            headers,
            cookies,
            body,
        }
    }

    /// Sets a header, replacing any previous value.
    ///
    /// # Panics
    ///
    /// Panics if `name` or `value` is not a valid header name/value.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        let (name, value) = header_pair(name, value);
        self.headers.insert(name, value);
        self
    }

    pub fn with_cookie(mut self, cookie: Cookie) -> Self {
        self.cookies.upsert(cookie);
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn method(&self) -> &Method { &self.method }
    pub fn headers(&self) -> &HeaderMap { &self.headers }
    pub fn headers_mut(&mut self) -> &mut HeaderMap { &mut self.headers }
    pub fn cookies(&self) -> &CookieJar { &self.cookies }
    pub fn cookies_mut(&mut self) -> &mut CookieJar { &mut self.cookies }
    pub fn body(&self) -> &Bytes { &self.body }

    /// The request path; `/` when the request carried none.
    pub fn path(&self) -> &str {
        if self.path.is_empty() { "/" } else { &self.path }
    }

    /// Case-insensitive header lookup. Non-UTF-8 values read as absent.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(Cookie::value)
    }

    /// A fresh exchange carrying this one's method, path and body, this one's
    /// headers overlaid with `headers`, and this one's cookies upserted with
    /// `cookies`. `self` is left untouched.
    pub(crate) fn folded(&self, headers: &HeaderMap, cookies: &CookieJar) -> Self {
        let mut merged_headers = self.headers.clone();
        merge_headers_into(&mut merged_headers, headers);

        let mut next = Self {
            method: self.method.clone(),
            path: self.path.clone(),
            headers: merged_headers,
            cookies: self.cookies.clone(),
            body: self.body.clone(),
        };
        merge_cookies_into(&mut next.cookies, cookies);
        next
    }
}

/// Copies every header of `source` onto `target`. A name present in `source`
/// replaces all of `target`'s values for that name; multi-valued headers keep
/// every value from `source`. Applying the same `source` twice is a no-op the
/// second time.
pub fn merge_headers_into(target: &mut HeaderMap, source: &HeaderMap) {
    for name in source.keys() {
        target.remove(name);
        for value in source.get_all(name) {
            target.append(name.clone(), value.clone());
        }
    }
}

/// Upserts every cookie of `source` into `target`, by name.
pub fn merge_cookies_into(target: &mut CookieJar, source: &CookieJar) {
    for cookie in source {
        target.upsert(cookie.clone());
    }
}

pub(crate) fn try_header_pair(name: &str, value: &str) -> Result<(HeaderName, HeaderValue), BoxError> {
    let header_name = HeaderName::from_bytes(name.as_bytes())
        .map_err(|e| format!("invalid header name `{name}`: {e}"))?;
    let header_value = HeaderValue::from_str(value)
        .map_err(|e| format!("invalid value for header `{name}`: {e}"))?;
    Ok((header_name, header_value))
}

pub(crate) fn header_pair(name: &str, value: &str) -> (HeaderName, HeaderValue) {
    try_header_pair(name, value).unwrap_or_else(|e| panic!("{e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for (k, v) in pairs {
            headers.append(*k, HeaderValue::from_static(*v));
        }
        headers
    }

    #[test]
    fn merge_headers_last_writer_wins() {
        let mut target = map(&[("x-a", "1"), ("x-b", "1")]);
        merge_headers_into(&mut target, &map(&[("x-b", "2"), ("x-c", "2")]));

        assert_eq!(target["x-a"], "1");
        assert_eq!(target["x-b"], "2");
        assert_eq!(target["x-c"], "2");
        assert_eq!(target.len(), 3);
    }

    #[test]
    fn merge_headers_replaces_multi_values_wholesale() {
        let mut target = map(&[("vary", "a"), ("vary", "b")]);
        merge_headers_into(&mut target, &map(&[("vary", "c"), ("vary", "d")]));
        merge_headers_into(&mut target, &map(&[("vary", "c"), ("vary", "d")]));

        let values: Vec<_> = target.get_all("vary").iter().collect();
        assert_eq!(values, ["c", "d"]);
    }

    #[test]
    fn merge_cookies_upserts() {
        let mut target = CookieJar::parse("a=1; b=1");
        merge_cookies_into(&mut target, &CookieJar::parse("b=2; c=2"));
        assert_eq!(target.to_request_header(), "a=1; b=2; c=2");
    }

    #[test]
    fn header_lookup_is_case_insensitive() {
        let ex = Exchange::new(Method::GET, "/").with_header("X-Trace", "abc");
        assert_eq!(ex.header("x-trace"), Some("abc"));
        assert_eq!(ex.header("X-TRACE"), Some("abc"));
    }

    #[test]
    fn empty_path_reads_as_root() {
        assert_eq!(Exchange::new(Method::GET, "").path(), "/");
    }

    #[test]
    fn from_request_parses_cookies_and_drops_marker() {
        let req = http::Request::builder()
            .method(Method::POST)
            .uri("https://example.com/cart?step=2")
            .header("cookie", "session=abc; theme=dark")
            .header(REDIRECT_MARKER, "/spoofed")
            .body(Bytes::from_static(b"{}"))
            .unwrap();

        let ex = Exchange::from_request(req);
        assert_eq!(*ex.method(), Method::POST);
        assert_eq!(ex.path(), "/cart");
        assert_eq!(ex.cookie("session"), Some("abc"));
        assert_eq!(ex.cookie("theme"), Some("dark"));
        assert!(ex.header(REDIRECT_MARKER).is_none());
        assert_eq!(ex.body().as_ref(), b"{}");
    }

    #[test]
    fn folded_leaves_original_untouched() {
        let original = Exchange::new(Method::GET, "/a")
            .with_header("x-keep", "1")
            .with_cookie(Cookie::new("c", "old"));

        let next = original.folded(&map(&[("x-new", "2")]), &CookieJar::parse("c=new"));

        assert_eq!(next.header("x-keep"), Some("1"));
        assert_eq!(next.header("x-new"), Some("2"));
        assert_eq!(next.cookie("c"), Some("new"));
        assert!(original.header("x-new").is_none());
        assert_eq!(original.cookie("c"), Some("old"));
        assert_eq!(next.path(), "/a");
    }
}
