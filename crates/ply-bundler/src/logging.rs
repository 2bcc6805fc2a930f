//! Subscriber setup for hosts (available with the `logging` feature).
//!
//! The ply crates only emit `tracing` events. A host that has no subscriber
//! of its own can install one here; the level applies to the ply crates and
//! everything else stays at `warn` unless `RUST_LOG` says otherwise.

use std::fmt;
use std::str::FromStr;
use std::sync::Once;

use tracing_subscriber::{EnvFilter, fmt as layer_fmt, layer::SubscriberExt, util::SubscriberInitExt};

static INSTALLED: Once = Once::new();

/// Crates whose events [`LogLevel`] controls.
const PLY_TARGETS: &[&str] = &[
    "ply_vfs",
    "ply_bundler",
    "ply_plugin_css",
    "ply_plugin_svelte",
    "ply_worker",
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Silent,
    Error,
    Warn,
    /// One line per pass.
    #[default]
    Info,
    /// Pass state transitions and one line per module.
    Debug,
    /// Plugin resolution decisions.
    Trace,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Silent => "off",
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }

    /// Filter directives: `warn` globally, `self` for the ply crates.
    pub fn directives(self) -> String {
        let mut directives = String::from(if self == LogLevel::Silent { "off" } else { "warn" });
        for target in PLY_TARGETS {
            directives.push_str(&format!(",{target}={}", self.as_str()));
        }
        directives
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "silent" | "off" | "none" => Ok(LogLevel::Silent),
            "error" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            other => Err(format!("Unknown log level '{other}'")),
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Installs a compact stderr subscriber for the ply crates at `level`.
///
/// `RUST_LOG` directives are appended, so they can still raise or lower
/// individual targets. Only the first call in a process has an effect.
///
/// ```rust,no_run
/// use ply_bundler::logging::{LogLevel, init_logging};
///
/// init_logging(LogLevel::Debug);
/// ```
pub fn init_logging(level: LogLevel) {
    let mut directives = level.directives();
    if let Ok(extra) = std::env::var(EnvFilter::DEFAULT_ENV) {
        if !extra.trim().is_empty() {
            directives.push(',');
            directives.push_str(&extra);
        }
    }
    install(EnvFilter::new(directives));
}

/// Installs a subscriber driven by `RUST_LOG` alone, defaulting to
/// [`LogLevel::Info`] for the ply crates when it is unset or invalid.
pub fn init_logging_from_env() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(LogLevel::Info.directives()));
    install(filter);
}

fn install(filter: EnvFilter) {
    INSTALLED.call_once(|| {
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(layer_fmt::layer().compact().with_target(true).without_time().with_writer(std::io::stderr))
            .try_init();
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_levels() {
        assert_eq!("info".parse::<LogLevel>().unwrap(), LogLevel::Info);
        assert_eq!(" DEBUG ".parse::<LogLevel>().unwrap(), LogLevel::Debug);
        assert_eq!("warning".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        assert_eq!("none".parse::<LogLevel>().unwrap(), LogLevel::Silent);
        assert!("verbose".parse::<LogLevel>().is_err());
    }

    #[test]
    fn test_directives_scope_ply_crates() {
        let directives = LogLevel::Debug.directives();
        assert!(directives.starts_with("warn,"));
        assert!(directives.contains("ply_bundler=debug"));
        assert!(directives.contains("ply_worker=debug"));
        assert!(LogLevel::Silent.directives().starts_with("off,"));
    }

    #[test]
    fn test_levels_are_ordered() {
        assert!(LogLevel::Trace > LogLevel::Debug);
        assert!(LogLevel::Silent < LogLevel::Error);
        assert_eq!(LogLevel::default(), LogLevel::Info);
    }
}
