use tracing_subscriber::EnvFilter;

fn parse_level(level: &str) -> Option<&'static str> {
    match level.trim().to_ascii_lowercase().as_str() {
        "trace" => Some("trace"),
        "debug" => Some("debug"),
        "info" => Some("info"),
        "warn" | "warning" => Some("warn"),
        "error" | "critical" => Some("error"),
        _ => None,
    }
}

/// Maps a configured log level (`DEBUG`, `info`, `WARNING`, ...) to an
/// `EnvFilter` directive. Unknown levels resolve to `info`.
#[must_use]
pub fn level_directive(level: &str) -> &'static str {
    parse_level(level).unwrap_or("info")
}

/// Installs the global fmt subscriber. `RUST_LOG` wins over `level`.
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
pub fn init_tracing(level: &str) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let directive = level_directive(level);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));
    tracing_subscriber::fmt().with_env_filter(filter).try_init()?;
    if parse_level(level).is_none() {
        tracing::warn!(configured = level, using = directive, "Unrecognized log level");
    }
    Ok(())
}
