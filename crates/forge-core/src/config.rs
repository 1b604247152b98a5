//! Environment-driven configuration.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context, Result};

/// A secret value whose `Debug` output is masked.
#[derive(Clone)]
pub struct Redacted(String);

impl Redacted {
    pub fn new(value: String) -> Self {
        Self(value)
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Redacted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<redacted>")
    }
}

/// Output format of the structured log stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Text,
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "json" => Ok(LogFormat::Json),
            "text" => Ok(LogFormat::Text),
            other => bail!("unknown log format {other:?}, expected \"json\" or \"text\""),
        }
    }
}

/// Caps on how long a build may sit in a state before the planner stops
/// counting it. `None` means no cap.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuildConfig {
    pub pending_max_duration: Option<Duration>,
    pub running_max_duration: Option<Duration>,
}

/// Agent pool sizing parameters.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Max number of builds that can run on one agent at any point in time.
    pub max_builds: u32,
    /// Floor on the healthy agent count.
    pub min_count: u32,
    /// Minimum lifetime before an idle agent may be destroyed. A freshly
    /// launched agent may not have been assigned work yet.
    pub min_retirement_age: Duration,
    /// Name of the autoscaling group containing the agent nodes.
    pub autoscaling_group: String,
}

/// Upstream build server endpoint.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub proto: String,
    pub host: String,
    pub auth_token: Redacted,
}

/// Full daemon configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Delay between two consecutive planner runs.
    pub probe_interval: Duration,
    pub log_format: LogFormat,
    pub debug: bool,
    /// Plan-only mode: decisions are logged but never actuated.
    pub dry: bool,
    pub build: BuildConfig,
    pub agent: AgentConfig,
    pub server: ServerConfig,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let probe_interval = match var("SCALER_PROBE_INTERVAL") {
            Some(v) => parse_duration(&v).context("SCALER_PROBE_INTERVAL is not a duration")?,
            None => Duration::from_secs(30),
        };

        let log_format = match var("SCALER_LOG_FORMAT") {
            Some(v) => v.parse().context("invalid SCALER_LOG_FORMAT")?,
            None => LogFormat::Json,
        };

        let max_builds: u32 = require("AGENT_MAX_BUILDS")?
            .parse()
            .context("AGENT_MAX_BUILDS must be an integer")?;
        if max_builds < 1 {
            bail!("AGENT_MAX_BUILDS must be at least 1");
        }

        let min_count: u32 = match var("AGENT_MIN_COUNT") {
            Some(v) => v.parse().context("AGENT_MIN_COUNT must be an integer")?,
            None => 1,
        };

        let min_retirement_age = match var("AGENT_MIN_RETIREMENT_AGE") {
            Some(v) => {
                parse_duration(&v).context("AGENT_MIN_RETIREMENT_AGE is not a duration")?
            }
            None => Duration::from_secs(10 * 60),
        };

        Ok(Self {
            probe_interval,
            log_format,
            debug: flag("SCALER_DEBUG"),
            dry: flag("SCALER_DRY"),
            build: BuildConfig {
                pending_max_duration: parse_cap("BUILD_PENDING_MAX_DURATION")?,
                running_max_duration: parse_cap("BUILD_RUNNING_MAX_DURATION")?,
            },
            agent: AgentConfig {
                max_builds,
                min_count,
                min_retirement_age,
                autoscaling_group: require("AGENT_AUTOSCALING_GROUP")?,
            },
            server: ServerConfig {
                proto: var("SERVER_PROTO").unwrap_or_else(|| "http".to_string()),
                host: require("SERVER_HOST")?,
                auth_token: Redacted::new(require("SERVER_AUTH_TOKEN")?),
            },
        })
    }
}

fn var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn require(name: &str) -> Result<String> {
    var(name).with_context(|| format!("missing required environment variable {name}"))
}

fn flag(name: &str) -> bool {
    var(name)
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

/// Read a build-age cap. A value with a leading `-` disables the cap.
fn parse_cap(name: &str) -> Result<Option<Duration>> {
    match var(name) {
        None => Ok(None),
        Some(v) if v.starts_with('-') => Ok(None),
        Some(v) => parse_duration(&v)
            .map(Some)
            .with_context(|| format!("{name} is not a duration")),
    }
}

/// Parse a duration string like "500ms", "30s", "5m", "2h" or a bare
/// number of seconds.
pub fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim();
    if let Some(ms) = s.strip_suffix("ms") {
        return Ok(Duration::from_millis(parse_num(ms)?));
    }
    if let Some(secs) = s.strip_suffix('s') {
        return Ok(Duration::from_secs(parse_num(secs)?));
    }
    if let Some(mins) = s.strip_suffix('m') {
        return Ok(Duration::from_secs(parse_num(mins)? * 60));
    }
    if let Some(hours) = s.strip_suffix('h') {
        return Ok(Duration::from_secs(parse_num(hours)? * 3600));
    }
    Ok(Duration::from_secs(parse_num(s)?))
}

fn parse_num(s: &str) -> Result<u64> {
    s.trim()
        .parse()
        .with_context(|| format!("invalid duration value {s:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Config tests mutate process-wide environment state; serialize them.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    const ALL_VARS: &[&str] = &[
        "SCALER_PROBE_INTERVAL",
        "SCALER_LOG_FORMAT",
        "SCALER_DEBUG",
        "SCALER_DRY",
        "BUILD_PENDING_MAX_DURATION",
        "BUILD_RUNNING_MAX_DURATION",
        "AGENT_MIN_RETIREMENT_AGE",
        "AGENT_MAX_BUILDS",
        "AGENT_MIN_COUNT",
        "AGENT_AUTOSCALING_GROUP",
        "SERVER_PROTO",
        "SERVER_HOST",
        "SERVER_AUTH_TOKEN",
    ];

    const REQUIRED: &[(&str, &str)] = &[
        ("AGENT_MAX_BUILDS", "10"),
        ("AGENT_AUTOSCALING_GROUP", "ci-agent-pool"),
        ("SERVER_HOST", "build.example.com"),
        ("SERVER_AUTH_TOKEN", "1234567890abcdxyz"),
    ];

    fn with_env<R>(vars: &[(&str, &str)], f: impl FnOnce() -> R) -> R {
        let _guard = ENV_LOCK.lock().unwrap();
        for name in ALL_VARS {
            std::env::remove_var(name);
        }
        for (name, value) in vars {
            std::env::set_var(name, value);
        }
        let result = f();
        for name in ALL_VARS {
            std::env::remove_var(name);
        }
        result
    }

    #[test]
    fn defaults() {
        with_env(REQUIRED, || {
            let conf = Config::from_env().unwrap();
            assert_eq!(conf.probe_interval, Duration::from_secs(30));
            assert_eq!(conf.log_format, LogFormat::Json);
            assert!(!conf.debug);
            assert!(!conf.dry);
            assert!(conf.build.pending_max_duration.is_none());
            assert!(conf.build.running_max_duration.is_none());
            assert_eq!(conf.agent.min_retirement_age, Duration::from_secs(600));
            assert_eq!(conf.agent.min_count, 1);
            assert_eq!(conf.server.proto, "http");
        });
    }

    #[test]
    fn full_override() {
        let vars: Vec<_> = REQUIRED
            .iter()
            .copied()
            .chain([
                ("SCALER_PROBE_INTERVAL", "5m"),
                ("SCALER_LOG_FORMAT", "text"),
                ("SCALER_DEBUG", "true"),
                ("SCALER_DRY", "1"),
                ("BUILD_PENDING_MAX_DURATION", "5m"),
                ("BUILD_RUNNING_MAX_DURATION", "90m"),
                ("AGENT_MIN_RETIREMENT_AGE", "25m"),
                ("AGENT_MIN_COUNT", "3"),
                ("SERVER_PROTO", "https"),
            ])
            .collect();
        with_env(&vars, || {
            let conf = Config::from_env().unwrap();
            assert_eq!(conf.probe_interval, Duration::from_secs(300));
            assert_eq!(conf.log_format, LogFormat::Text);
            assert!(conf.debug);
            assert!(conf.dry);
            assert_eq!(
                conf.build.pending_max_duration,
                Some(Duration::from_secs(300))
            );
            assert_eq!(
                conf.build.running_max_duration,
                Some(Duration::from_secs(5400))
            );
            assert_eq!(conf.agent.min_retirement_age, Duration::from_secs(1500));
            assert_eq!(conf.agent.max_builds, 10);
            assert_eq!(conf.agent.min_count, 3);
            assert_eq!(conf.agent.autoscaling_group, "ci-agent-pool");
            assert_eq!(conf.server.proto, "https");
            assert_eq!(conf.server.host, "build.example.com");
            assert_eq!(conf.server.auth_token.expose(), "1234567890abcdxyz");
        });
    }

    #[test]
    fn missing_required_var_fails() {
        let vars: Vec<_> = REQUIRED
            .iter()
            .copied()
            .filter(|(name, _)| *name != "SERVER_HOST")
            .collect();
        with_env(&vars, || {
            let err = Config::from_env().unwrap_err();
            assert!(err.to_string().contains("SERVER_HOST"));
        });
    }

    #[test]
    fn zero_max_builds_rejected() {
        let vars: Vec<_> = REQUIRED
            .iter()
            .copied()
            .map(|(name, value)| {
                if name == "AGENT_MAX_BUILDS" {
                    (name, "0")
                } else {
                    (name, value)
                }
            })
            .collect();
        with_env(&vars, || {
            let err = Config::from_env().unwrap_err();
            assert!(err.to_string().contains("AGENT_MAX_BUILDS"));
        });
    }

    #[test]
    fn negative_cap_disables_filter() {
        let vars: Vec<_> = REQUIRED
            .iter()
            .copied()
            .chain([("BUILD_PENDING_MAX_DURATION", "-1s")])
            .collect();
        with_env(&vars, || {
            let conf = Config::from_env().unwrap();
            assert!(conf.build.pending_max_duration.is_none());
        });
    }

    #[test]
    fn zero_cap_is_kept() {
        let vars: Vec<_> = REQUIRED
            .iter()
            .copied()
            .chain([("BUILD_RUNNING_MAX_DURATION", "0s")])
            .collect();
        with_env(&vars, || {
            let conf = Config::from_env().unwrap();
            assert_eq!(conf.build.running_max_duration, Some(Duration::ZERO));
        });
    }

    #[test]
    fn redacted_debug_is_masked() {
        let token = Redacted::new("secret".to_string());
        assert_eq!(format!("{token:?}"), "<redacted>");
        assert_eq!(token.expose(), "secret");
    }

    #[test]
    fn parse_duration_values() {
        assert_eq!(parse_duration("500ms").unwrap(), Duration::from_millis(500));
        assert_eq!(parse_duration("30s").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_duration("5m").unwrap(), Duration::from_secs(300));
        assert_eq!(parse_duration("2h").unwrap(), Duration::from_secs(7200));
        assert_eq!(parse_duration("45").unwrap(), Duration::from_secs(45));
        assert!(parse_duration("soon").is_err());
        assert!(parse_duration("").is_err());
    }
}
