//! Rate limiter
//!
//! Rule-indexed sliding windows. Every rule names a verb, a route pattern
//! and a key dimension; the limiter keeps one timestamp window per
//! `(rule, client, extracted key)`, so two requests for the same route
//! but different query dimensions (say `date=A` vs `date=B`) never share
//! a bucket.
//!
//! `check` runs before the handler: on overflow the request is rejected
//! and no side effect has happened.

use chrono::{DateTime, Duration, Utc};
use matchday_core::error::{Error, Result};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::collections::VecDeque;
use tracing::warn;

/// What, besides the client, keys a rule's buckets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyDimension {
    /// One bucket per client
    Client,
    /// One bucket per client and value of a query parameter
    QueryParam(&'static str),
}

/// One sliding-window rule
#[derive(Debug, Clone)]
pub struct RateRule {
    /// HTTP verb the rule applies to
    pub verb: &'static str,
    /// Route pattern; `*` matches one path segment
    pub route: &'static str,
    /// Requests allowed inside one window
    pub max_requests: usize,
    /// Window length
    pub window: Duration,
    /// Bucket key extractor
    pub dimension: KeyDimension,
}

type BucketKey = (usize, String, String);

/// Sliding-window rate limiter over a fixed rule table
pub struct RateLimiter {
    rules: Vec<RateRule>,
    buckets: Mutex<FxHashMap<BucketKey, VecDeque<DateTime<Utc>>>>,
}

/// `*` in a pattern matches exactly one path segment
fn route_matches(pattern: &str, path: &str) -> bool {
    let mut pattern_segments = pattern.split('/').filter(|s| !s.is_empty());
    let mut path_segments = path.split('/').filter(|s| !s.is_empty());
    loop {
        match (pattern_segments.next(), path_segments.next()) {
            (None, None) => return true,
            (Some("*"), Some(_)) => continue,
            (Some(p), Some(s)) if p == s => continue,
            _ => return false,
        }
    }
}

impl RateLimiter {
    /// Limiter over a custom rule table
    pub fn new(rules: Vec<RateRule>) -> Self {
        RateLimiter {
            rules,
            buckets: Mutex::new(FxHashMap::default()),
        }
    }

    /// The rule table covering the public endpoint surface
    pub fn with_default_rules() -> Self {
        Self::new(vec![
            RateRule {
                verb: "GET",
                route: "/api/players",
                max_requests: 120,
                window: Duration::minutes(1),
                dimension: KeyDimension::QueryParam("date"),
            },
            RateRule {
                verb: "POST",
                route: "/api/players",
                max_requests: 30,
                window: Duration::minutes(1),
                dimension: KeyDimension::QueryParam("date"),
            },
            RateRule {
                verb: "DELETE",
                route: "/api/players",
                max_requests: 30,
                window: Duration::minutes(1),
                dimension: KeyDimension::QueryParam("date"),
            },
            RateRule {
                verb: "PATCH",
                route: "/api/players",
                max_requests: 30,
                window: Duration::minutes(1),
                dimension: KeyDimension::QueryParam("date"),
            },
            RateRule {
                verb: "POST",
                route: "/api/teams",
                max_requests: 20,
                window: Duration::minutes(1),
                dimension: KeyDimension::QueryParam("date"),
            },
            RateRule {
                verb: "POST",
                route: "/api/games",
                max_requests: 30,
                window: Duration::minutes(1),
                dimension: KeyDimension::QueryParam("date"),
            },
            RateRule {
                verb: "POST",
                route: "/api/rankings",
                max_requests: 5,
                window: Duration::minutes(5),
                dimension: KeyDimension::QueryParam("year"),
            },
            RateRule {
                verb: "GET",
                route: "/api/rankings/*",
                max_requests: 60,
                window: Duration::minutes(1),
                dimension: KeyDimension::Client,
            },
            RateRule {
                verb: "POST",
                route: "/api/leagues",
                max_requests: 3,
                window: Duration::hours(1),
                dimension: KeyDimension::Client,
            },
            RateRule {
                verb: "POST",
                route: "/api/leagues/authenticate",
                max_requests: 10,
                window: Duration::minutes(5),
                dimension: KeyDimension::Client,
            },
            RateRule {
                verb: "POST",
                route: "/api/leagues/reset-access-code",
                max_requests: 3,
                window: Duration::hours(1),
                dimension: KeyDimension::Client,
            },
        ])
    }

    /// Admit or reject a request.
    ///
    /// `client` is the caller identity (ip or client id); `query` the
    /// parsed query pairs. All matching rules must admit the request;
    /// admission records one timestamp per matching rule.
    pub fn check(
        &self,
        verb: &str,
        path: &str,
        query: &[(&str, &str)],
        client: &str,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let mut buckets = self.buckets.lock();
        let mut admitted: Vec<BucketKey> = Vec::new();

        for (index, rule) in self.rules.iter().enumerate() {
            if rule.verb != verb || !route_matches(rule.route, path) {
                continue;
            }
            let dimension_value = match rule.dimension {
                KeyDimension::Client => String::new(),
                KeyDimension::QueryParam(param) => query
                    .iter()
                    .find(|(k, _)| *k == param)
                    .map(|(_, v)| (*v).to_string())
                    .unwrap_or_default(),
            };
            let key = (index, client.to_string(), dimension_value);
            let window = buckets.entry(key.clone()).or_default();
            while let Some(&oldest) = window.front() {
                if now - oldest >= rule.window {
                    window.pop_front();
                } else {
                    break;
                }
            }
            if window.len() >= rule.max_requests {
                let retry_after = window
                    .front()
                    .map(|&oldest| (rule.window - (now - oldest)).num_milliseconds().max(0))
                    .unwrap_or(0) as u64;
                warn!(verb, path, client, "rate limit exceeded");
                // nothing was recorded for this request on any rule
                for key in admitted {
                    if let Some(w) = buckets.get_mut(&key) {
                        w.pop_back();
                    }
                }
                return Err(Error::rate_limited(retry_after));
            }
            window.push_back(now);
            admitted.push(key);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(max: usize, window: Duration, dimension: KeyDimension) -> RateLimiter {
        RateLimiter::new(vec![RateRule {
            verb: "POST",
            route: "/api/players",
            max_requests: max,
            window,
            dimension,
        }])
    }

    fn at(seconds: i64) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(1_735_000_000 + seconds, 0).unwrap()
    }

    #[test]
    fn test_overflow_rejects() {
        let limiter = limiter(2, Duration::minutes(1), KeyDimension::Client);
        limiter.check("POST", "/api/players", &[], "c1", at(0)).unwrap();
        limiter.check("POST", "/api/players", &[], "c1", at(1)).unwrap();
        let err = limiter
            .check("POST", "/api/players", &[], "c1", at(2))
            .unwrap_err();
        assert_eq!(err.status_code(), 429);
    }

    #[test]
    fn test_window_slides() {
        let limiter = limiter(1, Duration::seconds(10), KeyDimension::Client);
        limiter.check("POST", "/api/players", &[], "c1", at(0)).unwrap();
        assert!(limiter.check("POST", "/api/players", &[], "c1", at(5)).is_err());
        // the first request has aged out
        limiter.check("POST", "/api/players", &[], "c1", at(10)).unwrap();
    }

    #[test]
    fn test_clients_do_not_share_buckets() {
        let limiter = limiter(1, Duration::minutes(1), KeyDimension::Client);
        limiter.check("POST", "/api/players", &[], "c1", at(0)).unwrap();
        limiter.check("POST", "/api/players", &[], "c2", at(0)).unwrap();
        assert!(limiter.check("POST", "/api/players", &[], "c1", at(1)).is_err());
    }

    #[test]
    fn test_query_dimension_separates_buckets() {
        let limiter = limiter(1, Duration::minutes(1), KeyDimension::QueryParam("date"));
        limiter
            .check("POST", "/api/players", &[("date", "2025-01-04")], "c1", at(0))
            .unwrap();
        // same client, same route, different date: independent bucket
        limiter
            .check("POST", "/api/players", &[("date", "2025-01-11")], "c1", at(0))
            .unwrap();
        assert!(limiter
            .check("POST", "/api/players", &[("date", "2025-01-04")], "c1", at(1))
            .is_err());
    }

    #[test]
    fn test_unmatched_routes_pass_through() {
        let limiter = limiter(1, Duration::minutes(1), KeyDimension::Client);
        for _ in 0..10 {
            limiter.check("GET", "/api/players", &[], "c1", at(0)).unwrap();
            limiter.check("POST", "/api/teams", &[], "c1", at(0)).unwrap();
        }
    }

    #[test]
    fn test_route_wildcard_segment() {
        assert!(route_matches("/api/rankings/*", "/api/rankings/Ann"));
        assert!(!route_matches("/api/rankings/*", "/api/rankings"));
        assert!(!route_matches("/api/rankings/*", "/api/rankings/Ann/extra"));
        assert!(route_matches("/api/players", "/api/players"));
    }

    #[test]
    fn test_rejection_records_nothing() {
        // two rules match the same request; the second rejects, so the
        // first must not keep the provisional timestamp
        let limiter = RateLimiter::new(vec![
            RateRule {
                verb: "POST",
                route: "/api/players",
                max_requests: 10,
                window: Duration::minutes(1),
                dimension: KeyDimension::Client,
            },
            RateRule {
                verb: "POST",
                route: "/api/players",
                max_requests: 1,
                window: Duration::minutes(1),
                dimension: KeyDimension::Client,
            },
        ]);
        limiter.check("POST", "/api/players", &[], "c1", at(0)).unwrap();
        for i in 1..=5 {
            assert!(limiter.check("POST", "/api/players", &[], "c1", at(i)).is_err());
        }
        // the permissive rule saw exactly one admitted request
        let buckets = limiter.buckets.lock();
        assert_eq!(buckets[&(0, "c1".to_string(), String::new())].len(), 1);
    }
}
