use std::num::NonZeroUsize;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{CrawlError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlerConfig {
    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    #[serde(default = "default_num_questions")]
    pub num_questions: usize,

    #[serde(default = "default_reputation_threshold")]
    pub reputation_threshold: u64,

    #[serde(default = "default_threshold_scope")]
    pub threshold_scope: ThresholdScope,

    #[serde(default = "default_on_user_error")]
    pub on_user_error: OnError,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            max_depth: default_max_depth(),
            num_questions: default_num_questions(),
            reputation_threshold: default_reputation_threshold(),
            threshold_scope: default_threshold_scope(),
            on_user_error: default_on_user_error(),
        }
    }
}

impl CrawlerConfig {
    /// Reputation a user needs to be expanded at `depth`, `root_depth` being
    /// the depth the crawl was started at.
    pub fn threshold_at(&self, depth: usize, root_depth: usize) -> u64 {
        match self.threshold_scope {
            ThresholdScope::Root if depth != root_depth => 0,
            _ => self.reputation_threshold,
        }
    }
}

fn default_max_depth() -> usize {
    15
}

fn default_num_questions() -> usize {
    5
}

fn default_reputation_threshold() -> u64 {
    0
}

fn default_threshold_scope() -> ThresholdScope {
    ThresholdScope::Root
}

fn default_on_user_error() -> OnError {
    OnError::Fail
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: Url,

    #[serde(default = "default_site")]
    pub site: String,

    #[serde(default = "default_key")]
    pub key: String,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    #[serde(default = "default_max_requests_per_second")]
    pub max_requests_per_second: NonZeroUsize,

    /// Multiplier applied to the minimum request interval
    #[serde(default = "default_interval_margin")]
    pub interval_margin: f64,

    /// Multiplier applied to server-advised backoff delays
    #[serde(default = "default_backoff_margin")]
    pub backoff_margin: f64,

    /// Seconds to wait on a 429 lacking a usable `Retry-After` header
    #[serde(default = "default_retry_after")]
    pub default_retry_after: u64,

    #[serde(default)]
    pub retry: RetryPolicy,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            site: default_site(),
            key: default_key(),
            user_agent: default_user_agent(),
            max_requests_per_second: default_max_requests_per_second(),
            interval_margin: default_interval_margin(),
            backoff_margin: default_backoff_margin(),
            default_retry_after: default_retry_after(),
            retry: RetryPolicy::default(),
            timeout: default_timeout(),
        }
    }
}

impl ApiConfig {
    /// Checks the values serde can't, i.e. that margins are usable multipliers.
    pub fn validate(&self) -> Result<()> {
        for (name, margin) in [
            ("intervalMargin", self.interval_margin),
            ("backoffMargin", self.backoff_margin),
        ] {
            if !margin.is_finite() || margin < 0.0 {
                return Err(CrawlError::InvalidConfig(format!(
                    "{name} must be a non-negative number, got {margin}"
                )));
            }
        }
        Ok(())
    }

    /// Minimum spacing between two consecutive requests.
    pub fn min_interval(&self) -> Result<Duration> {
        self.validate()?;
        let secs = self.interval_margin / self.max_requests_per_second.get() as f64;
        Duration::try_from_secs_f64(secs).map_err(|e| CrawlError::InvalidConfig(e.to_string()))
    }
}

fn default_base_url() -> Url {
    Url::parse("https://api.stackexchange.com/2.3/").unwrap()
}

fn default_site() -> String {
    String::from("stackoverflow")
}

fn default_key() -> String {
    String::from("*0NsGzZLCl28rdMwbKiHQg((")
}

fn default_user_agent() -> String {
    String::from("sograph")
}

fn default_max_requests_per_second() -> NonZeroUsize {
    NonZeroUsize::new(20).unwrap()
}

fn default_interval_margin() -> f64 {
    1.25
}

fn default_backoff_margin() -> f64 {
    1.10
}

fn default_retry_after() -> u64 {
    1
}

fn default_timeout() -> u64 {
    30
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryPolicy {
    /// Retries allowed for a single request before giving up
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,

    /// Upper bound in seconds on the time spent retrying a single request
    #[serde(default = "default_max_elapsed")]
    pub max_elapsed: Option<u64>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            max_elapsed: default_max_elapsed(),
        }
    }
}

fn default_max_retries() -> usize {
    10
}

fn default_max_elapsed() -> Option<u64> {
    Some(600)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "clap", derive(clap::ArgEnum))]
pub enum OnError {
    Fail,
    SkipAndLog,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "clap", derive(clap::ArgEnum))]
pub enum ThresholdScope {
    /// Only users of the seed batch are filtered by reputation
    Root,
    /// Users are filtered by reputation at every depth
    EveryDepth,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_from_empty_yaml() {
        let conf: CrawlerConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(conf.max_depth, 15);
        assert_eq!(conf.num_questions, 5);
        assert_eq!(conf.on_user_error, OnError::Fail);
        assert_eq!(conf.threshold_scope, ThresholdScope::Root);
        assert_eq!(conf.api.site, "stackoverflow");
        assert_eq!(conf.api.max_requests_per_second.get(), 20);
        assert_eq!(conf.api.retry.max_retries, 10);
    }

    #[test]
    fn partial_yaml_overrides() {
        let conf: CrawlerConfig = serde_yaml::from_str(
            "maxDepth: 3\nthresholdScope: EveryDepth\napi:\n  maxRequestsPerSecond: 5\n  retry:\n    maxElapsed: ~\n",
        )
        .unwrap();
        assert_eq!(conf.max_depth, 3);
        assert_eq!(conf.threshold_scope, ThresholdScope::EveryDepth);
        assert_eq!(conf.api.max_requests_per_second.get(), 5);
        assert_eq!(conf.api.retry.max_elapsed, None);
        assert_eq!(conf.api.retry.max_retries, 10);
        assert_eq!(conf.api.key, default_key());
    }

    #[test]
    fn min_interval_includes_margin() {
        let api = ApiConfig::default();
        assert_eq!(api.min_interval().unwrap(), Duration::from_secs_f64(1.25 / 20.0));
    }

    #[test]
    fn unusable_margins_are_rejected() {
        for yaml in [
            "intervalMargin: -1.0",
            "intervalMargin: .nan",
            "intervalMargin: .inf",
            "backoffMargin: -0.5",
        ] {
            let api: ApiConfig = serde_yaml::from_str(yaml).unwrap();
            assert!(matches!(api.validate(), Err(CrawlError::InvalidConfig(_))), "{yaml}");
            assert!(api.min_interval().is_err(), "{yaml}");
        }

        let api: ApiConfig = serde_yaml::from_str("intervalMargin: 0.0").unwrap();
        assert_eq!(api.min_interval().unwrap(), Duration::ZERO);
    }

    #[test]
    fn threshold_scope() {
        let mut conf = CrawlerConfig {
            reputation_threshold: 100,
            ..Default::default()
        };
        assert_eq!(conf.threshold_at(1, 1), 100);
        assert_eq!(conf.threshold_at(2, 1), 0);

        conf.threshold_scope = ThresholdScope::EveryDepth;
        assert_eq!(conf.threshold_at(2, 1), 100);
    }
}
