//! Radio configuration read from the process environment.

use std::time::Duration;

use crate::error::{RadioError, Result};

pub const DEFAULT_MOUNT: &str = "radio";
pub const DEFAULT_POLL_SECS: u64 = 30;
pub const DEFAULT_PLAYLIST_REFRESH_SECS: u64 = 300;
pub const DEFAULT_PROBE_TIMEOUT_SECS: u64 = 5;

#[derive(Debug, Clone)]
pub struct RadioConfig {
    /// Public URL of the live stream
    pub stream_url: String,
    /// Icecast `status-json.xsl` endpoint
    pub status_url: String,
    /// Mount point searched for in the status document
    pub mount: String,
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub poll_interval: Duration,
    pub playlist_refresh: Duration,
    pub probe_timeout: Duration,
}

fn lookup_trimmed(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    lookup(name)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn required(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Result<String> {
    lookup_trimmed(lookup, name).ok_or_else(|| RadioError::Config(format!("{} not set", name)))
}

fn seconds(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: u64) -> Result<Duration> {
    let secs = match lookup_trimmed(lookup, name) {
        Some(raw) => raw
            .parse::<u64>()
            .map_err(|_| RadioError::Config(format!("{} must be a whole number of seconds", name)))?,
        None => default,
    };

    if secs == 0 {
        return Err(RadioError::Config(format!("{} must be greater than zero", name)));
    }

    Ok(Duration::from_secs(secs))
}

impl RadioConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        Ok(Self {
            stream_url: required(&lookup, "RADIO_STREAM_URL")?,
            status_url: required(&lookup, "RADIO_STATUS_URL")?,
            mount: lookup_trimmed(&lookup, "RADIO_MOUNT")
                .map(|m| m.trim_start_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_MOUNT.to_string()),
            supabase_url: required(&lookup, "SUPABASE_URL")?
                .trim_end_matches('/')
                .to_string(),
            supabase_anon_key: required(&lookup, "SUPABASE_ANON_KEY")?,
            poll_interval: seconds(&lookup, "RADIO_POLL_SECS", DEFAULT_POLL_SECS)?,
            playlist_refresh: seconds(
                &lookup,
                "RADIO_PLAYLIST_REFRESH_SECS",
                DEFAULT_PLAYLIST_REFRESH_SECS,
            )?,
            probe_timeout: seconds(&lookup, "RADIO_PROBE_TIMEOUT_SECS", DEFAULT_PROBE_TIMEOUT_SECS)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn base_env() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            ("RADIO_STREAM_URL", "https://radio.vixis.dev/radio"),
            ("RADIO_STATUS_URL", "https://radio.vixis.dev/status-json.xsl"),
            ("SUPABASE_URL", "https://abc.supabase.co/"),
            ("SUPABASE_ANON_KEY", "anon"),
        ])
    }

    fn load(env: HashMap<&'static str, &'static str>) -> Result<RadioConfig> {
        RadioConfig::from_lookup(move |name: &str| env.get(name).map(|v| v.to_string()))
    }

    #[test]
    fn test_defaults() {
        let config = load(base_env()).unwrap();

        assert_eq!(config.mount, "radio");
        assert_eq!(config.supabase_url, "https://abc.supabase.co");
        assert_eq!(config.poll_interval, Duration::from_secs(30));
        assert_eq!(config.playlist_refresh, Duration::from_secs(300));
        assert_eq!(config.probe_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_missing_stream_url() {
        let mut env = base_env();
        env.insert("RADIO_STREAM_URL", "  ");

        let err = load(env).unwrap_err();
        assert!(err.to_string().contains("RADIO_STREAM_URL"));
    }

    #[test]
    fn test_overrides_and_bad_numbers() {
        let mut env = base_env();
        env.insert("RADIO_MOUNT", "/live");
        env.insert("RADIO_POLL_SECS", "10");
        let config = load(env.clone()).unwrap();
        assert_eq!(config.mount, "live");
        assert_eq!(config.poll_interval, Duration::from_secs(10));

        env.insert("RADIO_POLL_SECS", "0");
        assert!(matches!(load(env.clone()), Err(RadioError::Config(_))));

        env.insert("RADIO_POLL_SECS", "soon");
        assert!(matches!(load(env), Err(RadioError::Config(_))));
    }
}
