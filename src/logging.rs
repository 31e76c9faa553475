// =====================================================
// LOGGING
// stdout carries the host protocol, so logs go to stderr
// =====================================================

use log::LevelFilter;

/// Explicit level wins, then `RUST_LOG`, then `info`.
pub fn setup_logging(log_level: Option<&str>) {
    let mut builder = env_logger::Builder::new();
    builder.target(env_logger::Target::Stderr);

    match log_level.map(parse_level) {
        Some(level) => {
            builder.filter_level(level);
        }
        None => match std::env::var("RUST_LOG") {
            Ok(filters) if !filters.trim().is_empty() => {
                builder.parse_filters(&filters);
            }
            _ => {
                builder.filter_level(LevelFilter::Info);
            }
        },
    }

    if builder.try_init().is_err() {
        log::debug!("Logger already initialized");
    }
}

pub fn parse_level(raw: &str) -> LevelFilter {
    match raw.trim().to_uppercase().as_str() {
        "TRACE" => LevelFilter::Trace,
        "DEBUG" => LevelFilter::Debug,
        "INFO" => LevelFilter::Info,
        "WARN" | "WARNING" => LevelFilter::Warn,
        "ERROR" => LevelFilter::Error,
        "OFF" => LevelFilter::Off,
        other => {
            eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", other);
            LevelFilter::Info
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_parse_case_insensitively() {
        assert_eq!(parse_level("debug"), LevelFilter::Debug);
        assert_eq!(parse_level(" WARNING "), LevelFilter::Warn);
        assert_eq!(parse_level("off"), LevelFilter::Off);
        assert_eq!(parse_level("loud"), LevelFilter::Info);
    }
}
