//! Logging initialisation via tracing-subscriber.
//!
//! Call [`init`] once at startup, after the effective level is resolved.
//! Output goes to stderr so the console chat keeps stdout to itself.

use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use crate::error::AppError;

/// Transport crates that flood `debug` with per-request frames.
const NOISY_TARGETS: &[&str] = &["hyper", "hyper_util", "h2", "reqwest", "rustls"];

/// Install the global subscriber.
///
/// With `prefer_level` (a `-v` flag was given) `level` wins over `RUST_LOG`;
/// otherwise `RUST_LOG` wins and `level` is the fallback.
pub fn init(level: &str, prefer_level: bool) -> Result<(), AppError> {
    let env = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let filter = build_filter(level, prefer_level, env.as_deref())?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| AppError::Logger(format!("failed to set subscriber: {e}")))
}

/// Resolve the filter directives.  A bare level below `trace` also caps the
/// HTTP transport crates at `warn`; explicit `RUST_LOG` directives are taken
/// as written.
fn build_filter(level: &str, prefer_level: bool, env: Option<&str>) -> Result<EnvFilter, AppError> {
    let env = env.filter(|e| !e.trim().is_empty());
    let directives = match (prefer_level, env) {
        (false, Some(env)) => return parse_directives(env),
        (true, Some(env)) if parse_level(level).is_err() => return parse_directives(env),
        _ => level_directives(parse_level(level)?),
    };
    parse_directives(&directives)
}

fn level_directives(level: LevelFilter) -> String {
    let mut directives = level.to_string().to_lowercase();
    if level < LevelFilter::TRACE {
        for target in NOISY_TARGETS {
            directives.push_str(&format!(",{target}=warn"));
        }
    }
    directives
}

fn parse_directives(directives: &str) -> Result<EnvFilter, AppError> {
    EnvFilter::try_new(directives)
        .map_err(|e| AppError::Logger(format!("invalid log filter '{directives}': {e}")))
}

/// Parse a bare level name; `"verbose"` or `""` is an error.
pub fn parse_level(level: &str) -> Result<LevelFilter, AppError> {
    if level.is_empty() {
        return Err(AppError::Logger("log level must not be empty".into()));
    }
    level
        .parse::<LevelFilter>()
        .map_err(|_| AppError::Logger(format!("unrecognised log level: '{level}'")))
}
