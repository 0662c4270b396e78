//! Configuration types.
//!
//! Everything is read once at startup and never mutated afterwards. Each
//! component receives only its own slice (`LlmConfig`, `BridgeConfig`,
//! `RelaySettings`).

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;

use crate::bridge::BridgeConfig;
use crate::error::ConfigError;
use crate::llm::LlmConfig;

/// Default persona sent as the system-role message.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a warm, kind and thoughtful companion. \
Reply to Zachary in a natural, caring and dependable tone.";

/// How the relay obtains inbound messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayMode {
    /// Operator types each correspondent message on the console.
    Manual,
    /// Bridge is polled for new correspondent messages.
    Automatic,
}

impl FromStr for RelayMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "manual" | "interactive" => Ok(RelayMode::Manual),
            "auto" | "automatic" | "poll" => Ok(RelayMode::Automatic),
            other => Err(format!(
                "unknown mode {other:?} (expected manual or auto)"
            )),
        }
    }
}

impl std::fmt::Display for RelayMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RelayMode::Manual => f.write_str("manual"),
            RelayMode::Automatic => f.write_str("auto"),
        }
    }
}

/// Relay loop configuration.
#[derive(Debug, Clone)]
pub struct RelaySettings {
    /// The single correspondent whose messages are relayed.
    pub target: String,
    /// System-role text sent with every request. May be empty.
    pub persona: String,
    pub mode: RelayMode,
    /// Fixed sleep between automatic-mode cycles.
    pub poll_interval: Duration,
    /// Deadline for one LLM reply.
    pub reply_timeout: Duration,
    /// Deadline for one bridge poll.
    pub poll_timeout: Duration,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            target: "Zachary".to_string(),
            persona: DEFAULT_SYSTEM_PROMPT.to_string(),
            mode: RelayMode::Manual,
            poll_interval: Duration::from_secs(3),
            reply_timeout: Duration::from_secs(90),
            poll_timeout: Duration::from_secs(30),
        }
    }
}

/// Full process configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub llm: LlmConfig,
    pub bridge: BridgeConfig,
    pub relay: RelaySettings,
    /// Directory for the rolling log file, if file logging is wanted.
    pub log_dir: Option<PathBuf>,
}

impl Config {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup. Empty values are
    /// treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());
        let get_or = |key: &str, fallback: &str| get(key).unwrap_or_else(|| fallback.to_string());

        let api_key = get("LLM_API_KEY")
            .or_else(|| get("OPENAI_API_KEY"))
            .ok_or_else(|| ConfigError::MissingRequired {
                key: "LLM_API_KEY".to_string(),
                hint: "Set LLM_API_KEY (or OPENAI_API_KEY).".to_string(),
            })?;

        let temperature = match get("LLM_TEMPERATURE") {
            Some(raw) => Some(raw.trim().parse::<f32>().map_err(|e| {
                ConfigError::InvalidValue {
                    key: "LLM_TEMPERATURE".to_string(),
                    message: e.to_string(),
                }
            })?),
            None => None,
        };

        let defaults = RelaySettings::default();
        let reply_timeout = secs(&get, "BOT_REPLY_TIMEOUT_SECS", defaults.reply_timeout)?;

        let llm = LlmConfig {
            provider: get_or("LLM_PROVIDER", "compatible_openai"),
            api_key: SecretString::from(api_key),
            base_url: get("LLM_BASE_URL")
                .or_else(|| get("OPENAI_BASE_URL"))
                .unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
            model: get("LLM_MODEL")
                .or_else(|| get("OPENAI_MODEL"))
                .unwrap_or_else(|| "gpt-5.2".to_string()),
            temperature,
            timeout: reply_timeout,
        };

        let mode = match get("BOT_MODE") {
            Some(raw) => raw.parse::<RelayMode>().map_err(|message| ConfigError::InvalidValue {
                key: "BOT_MODE".to_string(),
                message,
            })?,
            None => RelayMode::Manual,
        };

        let relay = RelaySettings {
            target: get_or("WECHAT_TARGET", &defaults.target),
            // An explicitly empty persona is still a persona; only unset falls back.
            persona: lookup("BOT_SYSTEM_PROMPT").unwrap_or(defaults.persona),
            mode,
            poll_interval: secs(&get, "BOT_POLL_INTERVAL_SECS", defaults.poll_interval)?,
            reply_timeout,
            poll_timeout: secs(&get, "BOT_POLL_TIMEOUT_SECS", defaults.poll_timeout)?,
        };

        let bridge_defaults = BridgeConfig::default();
        let bridge = BridgeConfig {
            program: get_or("BRIDGE_HELPER_PROGRAM", &bridge_defaults.program),
            script: match lookup("BRIDGE_HELPER_SCRIPT") {
                Some(s) if s.is_empty() => None,
                Some(s) => Some(s),
                None => bridge_defaults.script,
            },
            addr: get_or("PY_BRIDGE_ADDR", &bridge_defaults.addr),
        };

        Ok(Self {
            llm,
            bridge,
            relay,
            log_dir: get("RELAY_LOG_DIR").map(PathBuf::from),
        })
    }
}

/// Parse a positive whole number of seconds.
fn secs<G>(get: &G, key: &str, default: Duration) -> Result<Duration, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    let Some(raw) = get(key) else {
        return Ok(default);
    };
    match raw.trim().parse::<u64>() {
        Ok(0) => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: "must be greater than zero".to_string(),
        }),
        Ok(n) => Ok(Duration::from_secs(n)),
        Err(e) => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use secrecy::ExposeSecret;

    use super::*;

    fn load(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn missing_api_key_is_fatal() {
        let err = load(&[]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingRequired { ref key, .. } if key == "LLM_API_KEY"));
    }

    #[test]
    fn empty_api_key_counts_as_missing() {
        assert!(load(&[("LLM_API_KEY", "")]).is_err());
    }

    #[test]
    fn defaults_applied() {
        let cfg = load(&[("LLM_API_KEY", "sk-test")]).unwrap();
        assert_eq!(cfg.llm.provider, "compatible_openai");
        assert_eq!(cfg.llm.api_key.expose_secret(), "sk-test");
        assert_eq!(cfg.llm.base_url, "https://api.openai.com/v1");
        assert_eq!(cfg.llm.model, "gpt-5.2");
        assert_eq!(cfg.llm.temperature, None);
        assert_eq!(cfg.relay.target, "Zachary");
        assert_eq!(cfg.relay.persona, DEFAULT_SYSTEM_PROMPT);
        assert_eq!(cfg.relay.mode, RelayMode::Manual);
        assert_eq!(cfg.relay.poll_interval, Duration::from_secs(3));
        assert_eq!(cfg.relay.reply_timeout, Duration::from_secs(90));
        assert_eq!(cfg.bridge.addr, "127.0.0.1:50051");
        assert_eq!(cfg.bridge.program, "python3");
        assert_eq!(cfg.bridge.script.as_deref(), Some("python/grpc_client.py"));
        assert!(cfg.log_dir.is_none());
    }

    #[test]
    fn legacy_openai_keys_are_fallbacks() {
        let cfg = load(&[
            ("OPENAI_API_KEY", "sk-legacy"),
            ("OPENAI_BASE_URL", "http://localhost:8000/v1"),
            ("OPENAI_MODEL", "qwen"),
        ])
        .unwrap();
        assert_eq!(cfg.llm.api_key.expose_secret(), "sk-legacy");
        assert_eq!(cfg.llm.base_url, "http://localhost:8000/v1");
        assert_eq!(cfg.llm.model, "qwen");
    }

    #[test]
    fn primary_keys_win_over_legacy() {
        let cfg = load(&[
            ("LLM_API_KEY", "sk-new"),
            ("OPENAI_API_KEY", "sk-old"),
            ("LLM_MODEL", "deepseek-chat"),
            ("OPENAI_MODEL", "gpt-4o"),
        ])
        .unwrap();
        assert_eq!(cfg.llm.api_key.expose_secret(), "sk-new");
        assert_eq!(cfg.llm.model, "deepseek-chat");
    }

    #[test]
    fn automatic_mode_and_interval() {
        let cfg = load(&[
            ("LLM_API_KEY", "k"),
            ("BOT_MODE", "Auto"),
            ("BOT_POLL_INTERVAL_SECS", "10"),
        ])
        .unwrap();
        assert_eq!(cfg.relay.mode, RelayMode::Automatic);
        assert_eq!(cfg.relay.poll_interval, Duration::from_secs(10));
    }

    #[test]
    fn invalid_mode_rejected() {
        let err = load(&[("LLM_API_KEY", "k"), ("BOT_MODE", "sometimes")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "BOT_MODE"));
    }

    #[test]
    fn zero_interval_rejected() {
        let err = load(&[("LLM_API_KEY", "k"), ("BOT_POLL_INTERVAL_SECS", "0")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn non_numeric_timeout_rejected() {
        assert!(load(&[("LLM_API_KEY", "k"), ("BOT_REPLY_TIMEOUT_SECS", "soon")]).is_err());
    }

    #[test]
    fn reply_timeout_also_bounds_http_client() {
        let cfg = load(&[("LLM_API_KEY", "k"), ("BOT_REPLY_TIMEOUT_SECS", "180")]).unwrap();
        assert_eq!(cfg.relay.reply_timeout, Duration::from_secs(180));
        assert_eq!(cfg.llm.timeout, Duration::from_secs(180));
    }

    #[test]
    fn empty_persona_preserved() {
        let cfg = load(&[("LLM_API_KEY", "k"), ("BOT_SYSTEM_PROMPT", "")]).unwrap();
        assert_eq!(cfg.relay.persona, "");
    }

    #[test]
    fn empty_script_disables_script_argument() {
        let cfg = load(&[
            ("LLM_API_KEY", "k"),
            ("BRIDGE_HELPER_PROGRAM", "/usr/local/bin/wx-bridge"),
            ("BRIDGE_HELPER_SCRIPT", ""),
        ])
        .unwrap();
        assert_eq!(cfg.bridge.program, "/usr/local/bin/wx-bridge");
        assert!(cfg.bridge.script.is_none());
    }

    #[test]
    fn temperature_parsed() {
        let cfg = load(&[("LLM_API_KEY", "k"), ("LLM_TEMPERATURE", "0.7")]).unwrap();
        assert_eq!(cfg.llm.temperature, Some(0.7));
        assert!(load(&[("LLM_API_KEY", "k"), ("LLM_TEMPERATURE", "warm")]).is_err());
    }

    #[test]
    fn mode_parse_synonyms() {
        assert_eq!("interactive".parse::<RelayMode>(), Ok(RelayMode::Manual));
        assert_eq!(" POLL ".parse::<RelayMode>(), Ok(RelayMode::Automatic));
        assert_eq!(RelayMode::Automatic.to_string(), "auto");
    }
}
