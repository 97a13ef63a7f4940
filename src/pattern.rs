//! Path patterns.
//!
//! A pattern is compiled once, at pipeline build time, into a single-pattern
//! radix tree ([`matchit`]). Testing a path against it is then an
//! O(path-length) lookup with no allocation.
//!
//! # Syntax
//!
//! | Pattern | Matches |
//! |---|---|
//! | `/` or `**` or `/**` | every path |
//! | `/api/users` | exactly `/api/users` |
//! | `/api/*` | `/api/` plus exactly one segment |
//! | `/api/:id` or `/api/{id}` | same as `*`, but named |
//! | `/api/**` | `/api` and everything below it |
//! | `/api/{*rest}` | everything strictly below `/api` |
//!
//! `**` is only allowed as the final segment. A trailing slash on the pattern
//! or on the path (other than `/` itself) is ignored.

use matchit::Router as MatchitRouter;

use crate::error::ConfigError;

/// A compiled path pattern.
#[derive(Clone)]
pub struct PathPattern {
    source: String,
    tree: MatchitRouter<()>,
}

impl PathPattern {
    /// Compiles `pattern`.
    ///
    /// Fails with [`ConfigError::InvalidPattern`] when the pattern is not
    /// absolute, places `**` anywhere but last, or is rejected by the tree.
    pub fn parse(pattern: &str) -> Result<Self, ConfigError> {
        let mut tree = MatchitRouter::new();
        for route in routes_for(pattern)? {
            tree.insert(route, ())
                .map_err(|e| ConfigError::invalid_pattern(pattern, e.to_string()))?;
        }
        Ok(Self { source: pattern.to_owned(), tree })
    }

    /// Tests `path` against this pattern. Pure, side-effect free.
    pub fn matches(&self, path: &str) -> bool {
        self.tree.at(normalize(path)).is_ok()
    }

    /// The pattern as it was written.
    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl std::fmt::Debug for PathPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("PathPattern").field(&self.source).finish()
    }
}

/// One-shot form of [`PathPattern::matches`]. An invalid pattern matches nothing.
pub fn matches(pattern: &str, path: &str) -> bool {
    PathPattern::parse(pattern).is_ok_and(|p| p.matches(path))
}

fn normalize(path: &str) -> &str {
    match path.trim_end_matches('/') {
        "" => "/",
        trimmed => trimmed,
    }
}

/// Translates a pattern into the matchit routes that together implement it.
fn routes_for(pattern: &str) -> Result<Vec<String>, ConfigError> {
    if matches!(pattern, "/" | "**" | "/**") {
        return Ok(vec!["/".to_owned(), "/{*rest}".to_owned()]);
    }
    if !pattern.starts_with('/') {
        return Err(ConfigError::invalid_pattern(pattern, "must start with `/`"));
    }

    let segments: Vec<&str> = normalize(pattern)[1..].split('/').collect();
    let last = segments.len() - 1;
    let mut base = String::new();

    for (i, segment) in segments.iter().enumerate() {
        if *segment == "**" {
            if i != last {
                return Err(ConfigError::invalid_pattern(pattern, "`**` must be the last segment"));
            }
            let root = if base.is_empty() { "/".to_owned() } else { base.clone() };
            return Ok(vec![root, format!("{base}/{{*rest}}")]);
        }

        base.push('/');
        match *segment {
            "*" => base.push_str(&format!("{{w{i}}}")),
            s if s.starts_with(':') && s.len() > 1 => base.push_str(&format!("{{{}}}", &s[1..])),
            s if s.starts_with('{') && s.ends_with('}') => base.push_str(s),
            s => base.push_str(&s.replace('{', "{{").replace('}', "}}")),
        }
    }

    Ok(vec![base])
}
