//! Boundary configuration read once from the environment.

use std::sync::LazyLock;

pub const ECHO_ERRORS_ENV: &str = "MLX_RS_ECHO_ERRORS";
pub const DIAG_HISTORY_ENV: &str = "MLX_RS_DIAG_HISTORY";

const DEFAULT_DIAG_HISTORY: usize = 64;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BoundaryConfig {
    /// Print `Caught exception: '...'` to stderr for every failure.
    pub echo_errors: bool,
    /// Number of failures kept by [`crate::diagnostics`].
    pub diag_history: usize,
}

impl Default for BoundaryConfig {
    fn default() -> Self {
        Self {
            echo_errors: false,
            diag_history: DEFAULT_DIAG_HISTORY,
        }
    }
}

impl BoundaryConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let echo_errors = lookup(ECHO_ERRORS_ENV)
            .map(|v| !matches!(v.trim(), "" | "0" | "false"))
            .unwrap_or(false);
        let diag_history = lookup(DIAG_HISTORY_ENV)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(DEFAULT_DIAG_HISTORY);
        Self {
            echo_errors,
            diag_history,
        }
    }
}

static CONFIG: LazyLock<BoundaryConfig> = LazyLock::new(BoundaryConfig::from_env);

pub fn config() -> &'static BoundaryConfig {
    &CONFIG
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = BoundaryConfig::from_lookup(|_| None);
        assert_eq!(cfg, BoundaryConfig::default());
    }

    #[test]
    fn test_parse() {
        let cfg = BoundaryConfig::from_lookup(|key| match key {
            ECHO_ERRORS_ENV => Some("1".into()),
            DIAG_HISTORY_ENV => Some(" 8 ".into()),
            _ => None,
        });
        assert!(cfg.echo_errors);
        assert_eq!(cfg.diag_history, 8);

        let cfg = BoundaryConfig::from_lookup(|key| match key {
            ECHO_ERRORS_ENV => Some("false".into()),
            DIAG_HISTORY_ENV => Some("lots".into()),
            _ => None,
        });
        assert!(!cfg.echo_errors);
        assert_eq!(cfg.diag_history, DEFAULT_DIAG_HISTORY);
    }
}
