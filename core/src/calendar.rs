//! The calendar contract: submitting a digest for timestamping and polling
//! for a more complete proof later. This module defines only the shape of
//! that contract and the access-control value type around it; the actual
//! HTTP transport lives in the `ots-calendar` crate.

use url::Url;

use crate::error::Result;
use crate::timestamp::Timestamp;

/// A server that accepts digests and, over time, attests to them (directly
/// or by forwarding into a Bitcoin transaction).
pub trait Calendar {
    /// Submits `digest` for timestamping, returning whatever partial proof
    /// the calendar can offer immediately — typically a single `Pending`
    /// attestation pointing back at this calendar.
    fn submit(&self, digest: &[u8]) -> Result<Timestamp>;

    /// Polls for a more complete proof of a previously submitted
    /// `commitment`. Returns [`crate::error::Error::NotFound`] if the
    /// calendar has nothing new yet.
    fn get_timestamp(&self, commitment: &[u8]) -> Result<Timestamp>;

    /// The calendar's base URL, as recorded in any `Pending` attestation it
    /// issues.
    fn url(&self) -> &str;
}

/// A set of calendar URLs a client is willing to trust, matched by scheme,
/// (globbed) host, and exact path. Query strings, parameters, and fragments
/// are rejected outright: a whitelist entry names an endpoint, not a query.
#[derive(Debug, Clone, Default)]
pub struct UrlWhitelist {
    entries: Vec<WhitelistEntry>,
}

#[derive(Debug, Clone)]
struct WhitelistEntry {
    scheme: String,
    host_pattern: String,
    path: String,
}

impl UrlWhitelist {
    /// An empty whitelist, trusting nothing.
    pub fn new() -> Self {
        UrlWhitelist::default()
    }

    /// Adds a URL to the whitelist. Its host may contain glob wildcards
    /// (`*`, `?`). Both `http` and `https` variants are implicitly
    /// whitelisted once either is added, since calendars are commonly
    /// reachable over both.
    pub fn add(&mut self, url: &str) -> Result<()> {
        let parsed = Url::parse(url)
            .map_err(|e| crate::error::Error::Value(format!("invalid whitelist url: {e}")))?;

        if parsed.query().is_some() || parsed.fragment().is_some() {
            return Err(crate::error::Error::Value(
                "whitelisted url can't have a query or fragment".into(),
            ));
        }

        let host = parsed
            .host_str()
            .ok_or_else(|| crate::error::Error::Value("whitelisted url has no host".into()))?
            .to_string();
        let path = parsed.path().to_string();

        for scheme in http_variants(parsed.scheme()) {
            self.entries.push(WhitelistEntry {
                scheme: scheme.to_string(),
                host_pattern: host.clone(),
                path: path.clone(),
            });
        }
        Ok(())
    }

    /// Builds a whitelist from an iterator of URLs, failing on the first
    /// invalid one.
    pub fn from_urls<'a>(urls: impl IntoIterator<Item = &'a str>) -> Result<Self> {
        let mut wl = UrlWhitelist::new();
        for u in urls {
            wl.add(u)?;
        }
        Ok(wl)
    }

    /// Whether `url` matches some entry: same scheme, globbed host, exact
    /// path.
    pub fn contains(&self, url: &str) -> bool {
        let parsed = match Url::parse(url) {
            Ok(p) => p,
            Err(_) => return false,
        };
        let host = match parsed.host_str() {
            Some(h) => h,
            None => return false,
        };
        let path = parsed.path();

        self.entries.iter().any(|e| {
            e.scheme == parsed.scheme() && glob_match(&e.host_pattern, host) && e.path == path
        })
    }
}

fn http_variants(scheme: &str) -> Vec<&'static str> {
    match scheme {
        "http" | "https" => vec!["http", "https"],
        _ => vec![],
    }
}

/// Minimal shell-style glob matching supporting `*` and `?`, enough for
/// whitelisting hostnames like `*.calendar.example`.
fn glob_match(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();
    glob_match_rec(&p, &t)
}

fn glob_match_rec(p: &[char], t: &[char]) -> bool {
    match p.first() {
        None => t.is_empty(),
        Some('*') => {
            glob_match_rec(&p[1..], t) || (!t.is_empty() && glob_match_rec(p, &t[1..]))
        }
        Some('?') => !t.is_empty() && glob_match_rec(&p[1..], &t[1..]),
        Some(c) => t.first() == Some(c) && glob_match_rec(&p[1..], &t[1..]),
    }
}
