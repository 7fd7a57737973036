use std::env;

use is_terminal::IsTerminal;
use tracing_subscriber::filter::EnvFilter;

// ---

const DEFAULT_LEVEL: &str = "info";

/// Install the global `tracing` subscriber. Call once at startup.
///
/// `RUST_LOG` wins when set. Otherwise `ORANGEBOX_LOG_LEVEL` picks the level
/// for this crate (default `info`) while the HTTP stack stays at `warn`.
/// `FORCE_COLOR` overrides the TTY check for ANSI colors.
pub fn init_tracing() {
    // ---
    let env_filter = if env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = env::var("ORANGEBOX_LOG_LEVEL").ok();
        EnvFilter::new(directives(level.as_deref()))
    };

    let force_color = env::var("FORCE_COLOR").ok();
    let use_color = color_enabled(force_color.as_deref(), std::io::stdout().is_terminal());

    tracing_subscriber::fmt()
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_env_filter(env_filter)
        .with_ansi(use_color)
        .compact()
        .init();
}

/// Filter directives for a level name; unknown names fall back to `info`.
fn directives(level: Option<&str>) -> String {
    // ---
    let level = level
        .map(|l| l.trim().to_ascii_lowercase())
        .filter(|l| matches!(l.as_str(), "trace" | "debug" | "info" | "warn" | "error"))
        .unwrap_or_else(|| DEFAULT_LEVEL.to_string());
    format!("{level},reqwest=warn,hyper=warn,hyper_util=warn")
}

fn color_enabled(force: Option<&str>, is_tty: bool) -> bool {
    match force {
        Some("1" | "true" | "yes") => true,
        Some("0" | "false" | "no") => false,
        _ => is_tty,
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn test_directives_keep_http_stack_quiet() {
        // ---
        assert_eq!(
            directives(Some("debug")),
            "debug,reqwest=warn,hyper=warn,hyper_util=warn"
        );
        assert!(directives(Some(" WARN ")).starts_with("warn,"));
        assert!(directives(Some("verbose")).starts_with("info,"));
        assert!(directives(None).starts_with("info,"));
    }

    #[test]
    fn test_force_color_overrides_tty() {
        // ---
        assert!(color_enabled(Some("yes"), false));
        assert!(!color_enabled(Some("0"), true));
        assert!(color_enabled(Some("maybe"), true));
        assert!(!color_enabled(None, false));
    }
}
