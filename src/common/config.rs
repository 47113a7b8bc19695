use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;

use crate::common::errors::ConfigError;
use crate::common::{
    Disposition, MAX_POLL_ATTEMPTS, SCAN_TMP_DIR_DEFAULT, VT_BASE_URL_DEFAULT, VT_TIMEOUT_DEFAULT,
};

/// What to do when every status check came back pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollExhaustion {
    /// Classify using the last pending result (its malicious count is usually 0).
    UseLastResult,
    /// Fail the record with `DispatchError::PollTimeout`.
    Fail,
}

impl FromStr for PollExhaustion {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "use-last" => Ok(PollExhaustion::UseLastResult),
            "fail" => Ok(PollExhaustion::Fail),
            _ => Err(ConfigError::Invalid {
                name: "POLL_EXHAUSTION",
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub max_attempts: u32,
    pub interval: Duration,
    pub on_exhaustion: PollExhaustion,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_POLL_ATTEMPTS,
            interval: Duration::ZERO,
            on_exhaustion: PollExhaustion::UseLastResult,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestinationBuckets {
    pub safe: String,
    pub malicious: String,
}

impl DestinationBuckets {
    pub fn for_disposition(&self, disposition: Disposition) -> &str {
        match disposition {
            Disposition::Safe => &self.safe,
            Disposition::Malicious => &self.malicious,
        }
    }
}

#[derive(Debug)]
pub struct Config {
    pub vt_api_key: SecretString,
    pub vt_base_url: String,
    pub vt_timeout: Duration,
    pub destinations: DestinationBuckets,
    pub topic_arn: String,
    pub poll: PollPolicy,
    pub tmp_dir: PathBuf,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the config from any name -> value source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let required = |name: &'static str| {
            lookup(name)
                .filter(|value| !value.trim().is_empty())
                .ok_or(ConfigError::Missing(name))
        };
        let parsed = |name: &'static str, default: u64| match lookup(name) {
            Some(value) => value
                .trim()
                .parse::<u64>()
                .map_err(|_| ConfigError::Invalid { name, value }),
            None => Ok(default),
        };

        let max_attempts = parsed("POLL_MAX_ATTEMPTS", MAX_POLL_ATTEMPTS.into())?;
        let max_attempts = u32::try_from(max_attempts)
            .ok()
            .filter(|attempts| *attempts > 0)
            .ok_or_else(|| ConfigError::Invalid {
                name: "POLL_MAX_ATTEMPTS",
                value: max_attempts.to_string(),
            })?;

        let on_exhaustion = match lookup("POLL_EXHAUSTION") {
            Some(value) => value.parse::<PollExhaustion>()?,
            None => PollExhaustion::UseLastResult,
        };

        Ok(Self {
            vt_api_key: SecretString::from(required("VT_API_KEY")?),
            vt_base_url: lookup("VT_BASE_URL")
                .unwrap_or(VT_BASE_URL_DEFAULT.into())
                .trim_end_matches('/')
                .to_string(),
            vt_timeout: Duration::from_secs(parsed("VT_TIMEOUT_SECS", VT_TIMEOUT_DEFAULT.as_secs())?),
            destinations: DestinationBuckets {
                safe: required("SAFE_BUCKET")?,
                malicious: required("MALICIOUS_BUCKET")?,
            },
            topic_arn: required("SNS_TOPIC_ARN")?,
            poll: PollPolicy {
                max_attempts,
                interval: Duration::from_millis(parsed("POLL_INTERVAL_MS", 0)?),
                on_exhaustion,
            },
            tmp_dir: lookup("SCAN_TMP_DIR")
                .unwrap_or(SCAN_TMP_DIR_DEFAULT.into())
                .into(),
        })
    }
}
