//! Tunables for the `stamp` and `upgrade` commands, centralized the way the
//! teacher centralizes consensus parameters: a plain value struct built
//! through a fluent `*Builder`, with `Default` supplying the spec's stated
//! defaults.

/// Default calendar servers used when the user supplies none of their own.
pub const DEFAULT_CALENDAR_URLS: &[&str] = &[
    "https://alice.btc.calendar.opentimestamps.org",
    "https://bob.btc.calendar.opentimestamps.org",
];

/// The 10,000-byte calendar response cap from spec.md §6, re-exported here
/// so callers configuring a [`StampConfig`] don't need to reach into
/// `ots-calendar` for it.
pub const MAX_RESPONSE_SIZE: u64 = 10_000;

/// Bitcoin anchoring's default ceiling on a candidate transaction's size,
/// per spec.md §4.G.
pub const DEFAULT_MAX_TX_SIZE: usize = 1000;

/// Tunables for submitting a digest to calendars and waiting for an
/// `m`-of-`n` quorum of responses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StampConfig {
    pub calendar_urls: Vec<String>,
    pub m: usize,
    pub timeout_secs: u64,
    pub max_tx_size: usize,
}

impl Default for StampConfig {
    fn default() -> Self {
        Self {
            calendar_urls: DEFAULT_CALENDAR_URLS.iter().map(|s| s.to_string()).collect(),
            m: 2,
            timeout_secs: 10,
            max_tx_size: DEFAULT_MAX_TX_SIZE,
        }
    }
}

/// Fluent builder for [`StampConfig`].
pub struct StampConfigBuilder {
    inner: StampConfig,
}

impl StampConfigBuilder {
    pub fn new() -> Self {
        Self {
            inner: StampConfig::default(),
        }
    }

    pub fn calendar_urls<I, S>(mut self, urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inner.calendar_urls = urls.into_iter().map(Into::into).collect();
        self
    }

    pub fn m(mut self, m: usize) -> Self {
        self.inner.m = m;
        self
    }

    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.inner.timeout_secs = secs;
        self
    }

    pub fn max_tx_size(mut self, size: usize) -> Self {
        self.inner.max_tx_size = size;
        self
    }

    pub fn finish(self) -> StampConfig {
        self.inner
    }
}

impl Default for StampConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Tunables for the upgrade engine's calendar sweep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpgradeConfig {
    pub calendar_url_overrides: Option<Vec<String>>,
    pub whitelist: Vec<String>,
    pub wait: bool,
    pub wait_interval_secs: u64,
    pub cache_dir: String,
}

impl Default for UpgradeConfig {
    fn default() -> Self {
        Self {
            calendar_url_overrides: None,
            whitelist: DEFAULT_CALENDAR_URLS.iter().map(|s| s.to_string()).collect(),
            wait: false,
            wait_interval_secs: 60,
            cache_dir: default_cache_dir(),
        }
    }
}

fn default_cache_dir() -> String {
    dirs_cache_dir().unwrap_or_else(|| ".ots-cache".to_string())
}

fn dirs_cache_dir() -> Option<String> {
    std::env::var("HOME")
        .ok()
        .map(|home| format!("{home}/.cache/ots"))
}

/// Fluent builder for [`UpgradeConfig`].
pub struct UpgradeConfigBuilder {
    inner: UpgradeConfig,
}

impl UpgradeConfigBuilder {
    pub fn new() -> Self {
        Self {
            inner: UpgradeConfig::default(),
        }
    }

    pub fn calendar_url_overrides<I, S>(mut self, urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inner.calendar_url_overrides = Some(urls.into_iter().map(Into::into).collect());
        self
    }

    pub fn whitelist<I, S>(mut self, urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inner.whitelist = urls.into_iter().map(Into::into).collect();
        self
    }

    pub fn wait(mut self, wait: bool) -> Self {
        self.inner.wait = wait;
        self
    }

    pub fn wait_interval_secs(mut self, secs: u64) -> Self {
        self.inner.wait_interval_secs = secs;
        self
    }

    pub fn cache_dir(mut self, dir: impl Into<String>) -> Self {
        self.inner.cache_dir = dir.into();
        self
    }

    pub fn finish(self) -> UpgradeConfig {
        self.inner
    }
}

impl Default for UpgradeConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
