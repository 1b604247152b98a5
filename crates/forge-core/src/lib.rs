//! Shared configuration for the forgescale autoscaler.
//!
//! Everything the daemon needs to know is read from the environment once at
//! startup and treated as immutable afterwards. See [`Config::from_env`].

pub mod config;

pub use config::{AgentConfig, BuildConfig, Config, LogFormat, Redacted, ServerConfig};
