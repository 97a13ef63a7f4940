//! Property tests for path matching and header merging.

use http::header::{HeaderMap, HeaderName, HeaderValue};
use http::Method;
use nemo::{merge_headers_into, Event, Exchange, Outcome, PathPattern, Pipeline};
use proptest::prelude::*;

fn path() -> impl Strategy<Value = String> {
    prop::collection::vec("[a-z0-9._-]{1,8}", 0..6)
        .prop_map(|segments| format!("/{}", segments.join("/")))
}

fn headers() -> impl Strategy<Value = HeaderMap> {
    prop::collection::vec(("x-[a-z]{1,6}", "[ -~]{0,12}"), 0..8).prop_map(|pairs| {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            let name = HeaderName::from_bytes(name.as_bytes()).unwrap();
            map.append(name, HeaderValue::from_str(&value).unwrap());
        }
        map
    })
}

proptest! {
    #[test]
    fn catch_all_matches_every_path(p in path()) {
        for pattern in ["/", "**", "/**"] {
            prop_assert!(PathPattern::parse(pattern).unwrap().matches(&p), "{} vs {}", pattern, p);
        }
    }

    #[test]
    fn literal_pattern_matches_itself(p in path()) {
        let pattern = PathPattern::parse(&p).unwrap();
        prop_assert!(pattern.matches(&p));
    }

    #[test]
    fn merge_headers_is_idempotent(a in headers(), b in headers()) {
        let mut once = a.clone();
        merge_headers_into(&mut once, &b);

        let mut twice = once.clone();
        merge_headers_into(&mut twice, &b);

        prop_assert_eq!(&once, &twice);
        for name in b.keys() {
            let got: Vec<_> = once.get_all(name).iter().collect();
            let want: Vec<_> = b.get_all(name).iter().collect();
            prop_assert_eq!(got, want);
        }
    }
}

async fn noop(_: Exchange, _: Option<Outcome>, _: Event) -> Outcome {
    Outcome::next().with_header("x-hit", "1")
}

proptest! {
    #[test]
    fn without_hooks_dispatch_follows_matching_only(p in path()) {
        let pipeline = Pipeline::builder().route("/only/here", noop).build().unwrap();
        let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let out = rt
            .block_on(pipeline.dispatch(Exchange::new(Method::GET, p.clone()), &Event::new()))
            .unwrap();

        let matched = PathPattern::parse("/only/here").unwrap().matches(&p);
        prop_assert_eq!(out.header("x-hit").is_some(), matched);
        prop_assert!(out.is_pass_through());
    }
}
