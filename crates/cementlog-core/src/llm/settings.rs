use anyhow::{bail, Context, Result};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// Interpretation backends the client can be wired to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Gemini,
    /// Serves a stored result file instead of calling the network.
    Replay,
}

impl ProviderKind {
    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "" | "gemini" => Ok(Self::Gemini),
            "replay" => Ok(Self::Replay),
            other => bail!("unknown provider `{other}` (expected gemini or replay)"),
        }
    }
}

/// Environment-driven configuration for the interpretation client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterpreterSettings {
    pub provider: ProviderKind,
    /// Absent keys are not an error here; the analysis fails with `MissingCredential`.
    pub api_key: Option<String>,
    pub endpoint: Option<String>,
    pub model: Option<String>,
    pub timeout: Option<Duration>,
    pub thinking_budget: u32,
    pub replay_file: Option<PathBuf>,
}

impl Default for InterpreterSettings {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Gemini,
            api_key: None,
            endpoint: None,
            model: None,
            timeout: None,
            thinking_budget: Self::DEFAULT_THINKING_BUDGET,
            replay_file: None,
        }
    }
}

impl InterpreterSettings {
    pub const PROVIDER_ENV: &'static str = "CEMENTLOG_PROVIDER";
    pub const API_KEY_ENV: &'static str = "CEMENTLOG_API_KEY";
    pub const FALLBACK_API_KEY_ENV: &'static str = "API_KEY";
    pub const ENDPOINT_ENV: &'static str = "CEMENTLOG_ENDPOINT";
    pub const MODEL_ENV: &'static str = "CEMENTLOG_MODEL";
    pub const TIMEOUT_ENV: &'static str = "CEMENTLOG_TIMEOUT";
    pub const THINKING_BUDGET_ENV: &'static str = "CEMENTLOG_THINKING_BUDGET";
    pub const REPLAY_FILE_ENV: &'static str = "CEMENTLOG_REPLAY_FILE";

    pub const DEFAULT_THINKING_BUDGET: u32 = 15_000;

    /// Parse settings from environment-style variables.
    ///
    /// * `CEMENTLOG_PROVIDER`: `gemini` (default) or `replay`.
    /// * `CEMENTLOG_API_KEY` : API key, falling back to `API_KEY`.
    /// * `CEMENTLOG_TIMEOUT` : optional request timeout, e.g. `90s` or `2m`.
    pub fn from_map(vars: HashMap<String, String>) -> Result<Self> {
        let get = |key: &str| {
            vars.get(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let provider = match get(Self::PROVIDER_ENV) {
            Some(value) => ProviderKind::parse(&value)?,
            None => ProviderKind::Gemini,
        };
        let api_key = get(Self::API_KEY_ENV).or_else(|| get(Self::FALLBACK_API_KEY_ENV));
        let timeout = get(Self::TIMEOUT_ENV)
            .map(|raw| {
                humantime::parse_duration(&raw)
                    .with_context(|| format!("invalid duration `{raw}` in {}", Self::TIMEOUT_ENV))
            })
            .transpose()?;
        let thinking_budget = get(Self::THINKING_BUDGET_ENV)
            .map(|raw| {
                raw.parse::<u32>()
                    .with_context(|| format!("invalid integer `{raw}` in {}", Self::THINKING_BUDGET_ENV))
            })
            .transpose()?
            .unwrap_or(Self::DEFAULT_THINKING_BUDGET);

        Ok(Self {
            provider,
            api_key,
            endpoint: get(Self::ENDPOINT_ENV),
            model: get(Self::MODEL_ENV),
            timeout,
            thinking_budget,
            replay_file: get(Self::REPLAY_FILE_ENV).map(PathBuf::from),
        })
    }

    /// Config-file keys and the environment variables they stand in for.
    pub const CONFIG_KEYS: [(&'static str, &'static str); 7] = [
        ("provider", Self::PROVIDER_ENV),
        ("api_key", Self::API_KEY_ENV),
        ("endpoint", Self::ENDPOINT_ENV),
        ("model", Self::MODEL_ENV),
        ("timeout", Self::TIMEOUT_ENV),
        ("thinking_budget", Self::THINKING_BUDGET_ENV),
        ("replay_file", Self::REPLAY_FILE_ENV),
    ];

    /// Layer environment variables over values from a config file and parse the result.
    ///
    /// `file_values` is keyed by [`Self::CONFIG_KEYS`] names; unknown keys are ignored.
    /// An API key from either environment variable shadows the file's `api_key`.
    pub fn from_layers(
        file_values: HashMap<String, String>,
        env: HashMap<String, String>,
    ) -> Result<Self> {
        let env_has_key = [Self::API_KEY_ENV, Self::FALLBACK_API_KEY_ENV]
            .iter()
            .any(|key| env.get(*key).is_some_and(|v| !v.trim().is_empty()));
        let mut vars: HashMap<String, String> = Self::CONFIG_KEYS
            .iter()
            .filter(|(key, _)| !(env_has_key && *key == "api_key"))
            .filter_map(|(key, env_key)| {
                file_values
                    .get(*key)
                    .map(|value| (env_key.to_string(), value.clone()))
            })
            .collect();
        vars.extend(env.into_iter().filter(|(_, v)| !v.trim().is_empty()));
        Self::from_map(vars)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn defaults_to_gemini_without_key() {
        let settings = InterpreterSettings::from_map(HashMap::new()).unwrap();
        assert_eq!(settings, InterpreterSettings::default());
        assert!(settings.api_key.is_none());
        assert!(settings.timeout.is_none());
    }

    #[test]
    fn falls_back_to_plain_api_key() {
        let settings = InterpreterSettings::from_map(vars(&[("API_KEY", "legacy")])).unwrap();
        assert_eq!(settings.api_key.as_deref(), Some("legacy"));

        let settings = InterpreterSettings::from_map(vars(&[
            ("API_KEY", "legacy"),
            ("CEMENTLOG_API_KEY", "primary"),
        ]))
        .unwrap();
        assert_eq!(settings.api_key.as_deref(), Some("primary"));
    }

    #[test]
    fn blank_key_counts_as_missing() {
        let settings = InterpreterSettings::from_map(vars(&[("CEMENTLOG_API_KEY", "   ")])).unwrap();
        assert!(settings.api_key.is_none());
    }

    #[test]
    fn parses_timeout_and_budget() {
        let settings = InterpreterSettings::from_map(vars(&[
            ("CEMENTLOG_TIMEOUT", "2m"),
            ("CEMENTLOG_THINKING_BUDGET", "2048"),
            ("CEMENTLOG_PROVIDER", "Replay"),
            ("CEMENTLOG_REPLAY_FILE", "fixtures/result.json"),
        ]))
        .unwrap();
        assert_eq!(settings.timeout, Some(Duration::from_secs(120)));
        assert_eq!(settings.thinking_budget, 2048);
        assert_eq!(settings.provider, ProviderKind::Replay);
        assert_eq!(settings.replay_file, Some(PathBuf::from("fixtures/result.json")));
    }

    #[test]
    fn rejects_bad_values() {
        let err = InterpreterSettings::from_map(vars(&[("CEMENTLOG_TIMEOUT", "soon")])).unwrap_err();
        assert!(err.to_string().contains("CEMENTLOG_TIMEOUT"));
        assert!(InterpreterSettings::from_map(vars(&[("CEMENTLOG_PROVIDER", "openai")])).is_err());
    }

    #[test]
    fn env_values_win_over_file_values() {
        let file = vars(&[
            ("model", "file-model"),
            ("endpoint", "http://localhost:9000"),
            ("timeout", "30s"),
            ("unrelated", "ignored"),
        ]);
        let env = vars(&[("CEMENTLOG_MODEL", "env-model"), ("CEMENTLOG_ENDPOINT", "")]);
        let merged = InterpreterSettings::from_layers(file, env).unwrap();
        assert_eq!(merged.model.as_deref(), Some("env-model"));
        assert_eq!(merged.endpoint.as_deref(), Some("http://localhost:9000"));
        assert_eq!(merged.timeout, Some(Duration::from_secs(30)));
    }

    #[test]
    fn fallback_env_key_wins_over_file_key() {
        let file = vars(&[("api_key", "file-key")]);
        let merged =
            InterpreterSettings::from_layers(file.clone(), vars(&[("API_KEY", "env-key")])).unwrap();
        assert_eq!(merged.api_key.as_deref(), Some("env-key"));

        let merged = InterpreterSettings::from_layers(file.clone(), vars(&[("API_KEY", "  ")])).unwrap();
        assert_eq!(merged.api_key.as_deref(), Some("file-key"));

        let merged = InterpreterSettings::from_layers(file, HashMap::new()).unwrap();
        assert_eq!(merged.api_key.as_deref(), Some("file-key"));
    }
}
