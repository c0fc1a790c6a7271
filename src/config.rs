//! Configuration loading with env-var overrides.
//!
//! Reads `config/default.toml` (or the `-f` path) relative to the current
//! working directory, then applies `CONCIERGE_WORK_DIR` and
//! `CONCIERGE_LOG_LEVEL` env overrides.  The LLM API key is read from
//! `LLM_API_KEY` (falling back to `GOOGLE_API_KEY`) and never from TOML.

use std::{
    env,
    fs,
    path::{Path, PathBuf},
};

use serde::Deserialize;

use crate::error::AppError;
use crate::underwriting::DEFAULT_ANNUAL_RATE_PCT;

pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// PTY (console) channel configuration.
#[derive(Debug, Clone)]
pub struct PtyConfig {
    /// Whether the PTY channel is enabled.  Forced off unless `-i` is given.
    pub enabled: bool,
}

/// HTTP (axum) channel configuration.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub enabled: bool,
    /// Socket address to bind the HTTP channel to.
    pub bind: String,
}

/// Comms subsystem configuration.
#[derive(Debug, Clone)]
pub struct CommsConfig {
    pub pty: PtyConfig,
    pub http: HttpConfig,
}

/// OpenAI-compatible provider configuration (`[llm.openai]`).
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    /// Full chat completions endpoint URL.
    pub api_base_url: String,
    /// Model name passed in the request body.
    pub model: String,
    pub temperature: f32,
    /// Per-request HTTP timeout in seconds.
    pub timeout_seconds: u64,
}

/// LLM subsystem configuration.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Which provider is active (`"dummy"`, `"openai"`).  Maps to `default`
    /// in `[llm]`.
    pub provider: String,
    /// Rewrite drafted agent replies in each agent's persona.
    pub voice_replies: bool,
    pub openai: OpenAiConfig,
}

/// Lending policy knobs used by the conversation flow.
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyConfig {
    pub default_rate_pct: f64,
    pub min_loan: f64,
    pub min_tenure_months: u32,
    pub max_tenure_months: u32,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            default_rate_pct: DEFAULT_ANNUAL_RATE_PCT,
            min_loan: default_min_loan(),
            min_tenure_months: default_min_tenure(),
            max_tenure_months: default_max_tenure(),
        }
    }
}

/// Fully-resolved application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub app_name: String,
    /// Working directory for session snapshots and letters (no `~`).
    pub work_dir: PathBuf,
    pub log_level: String,
    /// Synthetic customer dataset.
    pub dataset_path: PathBuf,
    /// Directory holding the layered prompt templates.
    pub prompts_dir: PathBuf,
    pub comms: CommsConfig,
    pub llm: LlmConfig,
    /// API key from `LLM_API_KEY` / `GOOGLE_API_KEY`; `None` for keyless setups.
    pub llm_api_key: Option<String>,
    pub policy: PolicyConfig,
    /// Write a JSON snapshot of each session's context after every turn.
    pub snapshot_sessions: bool,
    /// Live sessions kept in memory; the least recently active is evicted
    /// beyond this.
    pub max_sessions: usize,
}

impl Config {
    /// Where sanction letter PDFs are written.
    pub fn letters_dir(&self) -> PathBuf {
        self.work_dir.join("letters")
    }

    /// Where per-session context snapshots are written.
    pub fn sessions_dir(&self) -> PathBuf {
        self.work_dir.join("sessions")
    }

    /// Daemon runs never read stdin: without `-i` the console is off, with
    /// `-i` it still honours `[comms.pty] enabled`.
    pub fn gate_console(&mut self, interactive: bool) {
        if !interactive {
            self.comms.pty.enabled = false;
        }
    }

    pub fn comms_pty_should_load(&self) -> bool {
        self.comms.pty.enabled
    }

    pub fn comms_http_should_load(&self) -> bool {
        self.comms.http.enabled
    }

    /// Reject configurations that would only fail on the first chat turn.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.llm.provider != "dummy" && self.llm_api_key.is_none() {
            return Err(AppError::Config(format!(
                "llm provider '{}' needs an API key: set LLM_API_KEY (or GOOGLE_API_KEY)",
                self.llm.provider
            )));
        }
        let p = &self.policy;
        if p.min_tenure_months == 0 || p.min_tenure_months > p.max_tenure_months {
            return Err(AppError::Config(format!(
                "invalid tenure bounds: {}..={} months",
                p.min_tenure_months, p.max_tenure_months
            )));
        }
        if p.min_loan <= 0.0 || p.default_rate_pct < 0.0 {
            return Err(AppError::Config("policy amounts must be positive".into()));
        }
        if self.max_sessions == 0 {
            return Err(AppError::Config("max_sessions must be at least 1".into()));
        }
        Ok(())
    }
}

/// Raw TOML shape — `serde` target before resolution.
#[derive(Deserialize)]
struct RawConfig {
    app: RawApp,
    #[serde(default)]
    comms: RawComms,
    #[serde(default)]
    llm: RawLlm,
    #[serde(default)]
    policy: RawPolicy,
}

#[derive(Deserialize)]
struct RawApp {
    name: String,
    work_dir: String,
    log_level: String,
    #[serde(default = "default_dataset")]
    dataset: String,
    #[serde(default = "default_prompts_dir")]
    prompts_dir: String,
    #[serde(default = "default_true")]
    snapshot_sessions: bool,
    #[serde(default = "default_max_sessions")]
    max_sessions: usize,
}

#[derive(Deserialize, Default)]
struct RawComms {
    #[serde(default)]
    pty: RawPty,
    #[serde(default)]
    http: RawHttp,
}

#[derive(Deserialize)]
struct RawPty {
    #[serde(default = "default_true")]
    enabled: bool,
}

impl Default for RawPty {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Deserialize)]
struct RawHttp {
    /// Defaults to `true`: the browser UI is the primary surface.
    #[serde(default = "default_true")]
    enabled: bool,
    #[serde(default = "default_http_bind")]
    bind: String,
}

impl Default for RawHttp {
    fn default() -> Self {
        Self { enabled: true, bind: default_http_bind() }
    }
}

#[derive(Deserialize)]
struct RawLlm {
    #[serde(rename = "default", default = "default_llm_provider")]
    provider: String,
    #[serde(default = "default_true")]
    voice_replies: bool,
    #[serde(default)]
    openai: RawOpenAiConfig,
}

impl Default for RawLlm {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            voice_replies: true,
            openai: RawOpenAiConfig::default(),
        }
    }
}

#[derive(Deserialize)]
struct RawOpenAiConfig {
    #[serde(default = "default_openai_api_base_url")]
    api_base_url: String,
    #[serde(default = "default_openai_model")]
    model: String,
    #[serde(default = "default_openai_temperature")]
    temperature: f32,
    #[serde(default = "default_openai_timeout_seconds")]
    timeout_seconds: u64,
}

impl Default for RawOpenAiConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_openai_api_base_url(),
            model: default_openai_model(),
            temperature: default_openai_temperature(),
            timeout_seconds: default_openai_timeout_seconds(),
        }
    }
}

#[derive(Deserialize)]
struct RawPolicy {
    #[serde(default = "default_rate_pct")]
    default_rate_pct: f64,
    #[serde(default = "default_min_loan")]
    min_loan: f64,
    #[serde(default = "default_min_tenure")]
    min_tenure_months: u32,
    #[serde(default = "default_max_tenure")]
    max_tenure_months: u32,
}

impl Default for RawPolicy {
    fn default() -> Self {
        Self {
            default_rate_pct: default_rate_pct(),
            min_loan: default_min_loan(),
            min_tenure_months: default_min_tenure(),
            max_tenure_months: default_max_tenure(),
        }
    }
}

fn default_dataset() -> String { "data/sample_data.json".to_string() }
fn default_prompts_dir() -> String { "config/prompts".to_string() }
fn default_http_bind() -> String { "127.0.0.1:8080".to_string() }
fn default_llm_provider() -> String { "dummy".to_string() }
fn default_openai_api_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta/openai/chat/completions".to_string()
}
fn default_openai_model() -> String { "gemini-1.5-flash".to_string() }
fn default_openai_temperature() -> f32 { 0.2 }
fn default_openai_timeout_seconds() -> u64 { 60 }
fn default_rate_pct() -> f64 { DEFAULT_ANNUAL_RATE_PCT }
fn default_min_loan() -> f64 { 10_000.0 }
fn default_min_tenure() -> u32 { 6 }
fn default_max_tenure() -> u32 { 84 }
fn default_true() -> bool { true }
fn default_max_sessions() -> usize { 500 }

/// Load config from `path` (default `config/default.toml`), then apply
/// env-var overrides.
pub fn load(path: Option<&str>) -> Result<Config, AppError> {
    let work_dir_override = env::var("CONCIERGE_WORK_DIR").ok();
    let log_level_override = env::var("CONCIERGE_LOG_LEVEL").ok();
    let api_key = env::var("LLM_API_KEY")
        .ok()
        .or_else(|| env::var("GOOGLE_API_KEY").ok())
        .filter(|k| !k.trim().is_empty());
    load_from(
        Path::new(path.unwrap_or(DEFAULT_CONFIG_PATH)),
        work_dir_override.as_deref(),
        log_level_override.as_deref(),
        api_key,
    )
}

/// Internal loader — accepts an explicit path and optional overrides.
/// Tests pass overrides directly instead of mutating env vars.
pub fn load_from(
    path: &Path,
    work_dir_override: Option<&str>,
    log_level_override: Option<&str>,
    llm_api_key: Option<String>,
) -> Result<Config, AppError> {
    let raw = fs::read_to_string(path)
        .map_err(|e| AppError::Config(format!("cannot read {}: {e}", path.display())))?;

    let parsed: RawConfig = toml::from_str(&raw)
        .map_err(|e| AppError::Config(format!("parse error in {}: {e}", path.display())))?;

    let a = parsed.app;
    let work_dir = expand_home(work_dir_override.unwrap_or(&a.work_dir));
    let log_level = log_level_override.unwrap_or(&a.log_level).to_string();

    let config = Config {
        app_name: a.name,
        work_dir,
        log_level,
        dataset_path: expand_home(&a.dataset),
        prompts_dir: expand_home(&a.prompts_dir),
        comms: CommsConfig {
            pty: PtyConfig { enabled: parsed.comms.pty.enabled },
            http: HttpConfig {
                enabled: parsed.comms.http.enabled,
                bind: parsed.comms.http.bind,
            },
        },
        llm: LlmConfig {
            provider: parsed.llm.provider,
            voice_replies: parsed.llm.voice_replies,
            openai: OpenAiConfig {
                api_base_url: parsed.llm.openai.api_base_url,
                model: parsed.llm.openai.model,
                temperature: parsed.llm.openai.temperature,
                timeout_seconds: parsed.llm.openai.timeout_seconds,
            },
        },
        llm_api_key,
        policy: PolicyConfig {
            default_rate_pct: parsed.policy.default_rate_pct,
            min_loan: parsed.policy.min_loan,
            min_tenure_months: parsed.policy.min_tenure_months,
            max_tenure_months: parsed.policy.max_tenure_months,
        },
        snapshot_sessions: a.snapshot_sessions,
        max_sessions: a.max_sessions,
    };
    config.validate()?;
    Ok(config)
}

/// Expand a leading `~` to the user's home directory.
/// Absolute or relative paths without `~` are returned unchanged.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    PathBuf::from(path)
}

// ── test helpers ──────────────────────────────────────────────────────────────

impl Config {
    /// Safe `Config` for tests — dummy LLM, no API keys, no external calls.
    pub fn test_default(work_dir: &Path) -> Self {
        let root = Path::new(env!("CARGO_MANIFEST_DIR"));
        Self {
            app_name: "test".into(),
            work_dir: work_dir.to_path_buf(),
            log_level: "info".into(),
            dataset_path: root.join("data/sample_data.json"),
            prompts_dir: root.join("config/prompts"),
            comms: CommsConfig {
                pty: PtyConfig { enabled: false },
                http: HttpConfig { enabled: false, bind: default_http_bind() },
            },
            llm: LlmConfig {
                provider: "dummy".into(),
                voice_replies: true,
                openai: OpenAiConfig {
                    api_base_url: "http://localhost:0/v1/chat/completions".into(),
                    model: "test-model".into(),
                    temperature: 0.0,
                    timeout_seconds: 1,
                },
            },
            llm_api_key: None,
            policy: PolicyConfig::default(),
            snapshot_sessions: false,
            max_sessions: default_max_sessions(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const MINIMAL_TOML: &str = r#"
[app]
name = "test-concierge"
work_dir = "~/.loan-concierge"
log_level = "info"
"#;

    fn write_toml(content: &str) -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f
    }

    #[test]
    fn parse_minimal_config_with_defaults() {
        let f = write_toml(MINIMAL_TOML);
        let cfg = load_from(f.path(), None, None, None).unwrap();
        assert_eq!(cfg.app_name, "test-concierge");
        assert_eq!(cfg.llm.provider, "dummy");
        assert_eq!(cfg.llm.openai.model, "gemini-1.5-flash");
        assert_eq!(cfg.comms.http.bind, "127.0.0.1:8080");
        assert_eq!(cfg.policy, PolicyConfig::default());
        assert_eq!(cfg.policy.min_tenure_months, 6);
        assert_eq!(cfg.policy.max_tenure_months, 84);
        assert!(cfg.letters_dir().ends_with("letters"));
    }

    #[test]
    fn policy_section_overrides_defaults() {
        let f = write_toml(&format!(
            "{MINIMAL_TOML}\n[policy]\ndefault_rate_pct = 11.5\nmin_loan = 25000\n"
        ));
        let cfg = load_from(f.path(), None, None, None).unwrap();
        assert_eq!(cfg.policy.default_rate_pct, 11.5);
        assert_eq!(cfg.policy.min_loan, 25_000.0);
    }

    #[test]
    fn hosted_provider_without_key_is_rejected() {
        let f = write_toml(&format!("{MINIMAL_TOML}\n[llm]\ndefault = \"openai\"\n"));
        let err = load_from(f.path(), None, None, None).unwrap_err();
        assert!(err.to_string().contains("LLM_API_KEY"));

        let cfg = load_from(f.path(), None, None, Some("sk-test".into())).unwrap();
        assert_eq!(cfg.llm.provider, "openai");
    }

    #[test]
    fn inverted_tenure_bounds_are_rejected() {
        let f = write_toml(&format!(
            "{MINIMAL_TOML}\n[policy]\nmin_tenure_months = 90\nmax_tenure_months = 12\n"
        ));
        assert!(load_from(f.path(), None, None, None).is_err());
    }

    #[test]
    fn tilde_expands_to_home() {
        let home = dirs::home_dir().expect("home dir must exist in test env");
        let expanded = expand_home("~/.loan-concierge");
        assert!(expanded.starts_with(&home));
        assert!(expanded.ends_with(".loan-concierge"));
    }

    #[test]
    fn relative_path_unchanged() {
        assert_eq!(expand_home("data/x.json"), PathBuf::from("data/x.json"));
    }

    #[test]
    fn missing_file_errors() {
        let result = load_from(Path::new("/nonexistent/config.toml"), None, None, None);
        assert!(result.unwrap_err().to_string().contains("config error"));
    }

    #[test]
    fn env_overrides_apply() {
        let f = write_toml(MINIMAL_TOML);
        let cfg = load_from(f.path(), Some("/tmp/concierge-override"), Some("debug"), None).unwrap();
        assert_eq!(cfg.work_dir, PathBuf::from("/tmp/concierge-override"));
        assert_eq!(cfg.log_level, "debug");
    }

    #[test]
    fn shipped_default_config_loads() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join(DEFAULT_CONFIG_PATH);
        let cfg = load_from(&path, None, None, None).unwrap();
        assert!(cfg.comms_http_should_load());
    }

    #[test]
    fn console_needs_interactive_and_config() {
        let f = write_toml(&format!("{MINIMAL_TOML}\n[comms.pty]\nenabled = false\n"));
        let mut cfg = load_from(f.path(), None, None, None).unwrap();
        cfg.gate_console(true);
        assert!(!cfg.comms_pty_should_load());

        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join(DEFAULT_CONFIG_PATH);
        let mut cfg = load_from(&path, None, None, None).unwrap();
        cfg.gate_console(true);
        assert!(cfg.comms_pty_should_load());
        cfg.gate_console(false);
        assert!(!cfg.comms_pty_should_load());
    }
}
