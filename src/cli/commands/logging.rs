//! Log verbosity, given as repeated `-v` flags or as `HOSTELRY_LOG_LEVEL`.

use clap::{Arg, ArgAction, Command, builder::ValueParser};
use tracing::Level;

pub const ARG_VERBOSITY: &str = "verbosity";

/// Level names accepted by `HOSTELRY_LOG_LEVEL`, indexed by verbosity.
const LEVEL_NAMES: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

/// Highest numeric verbosity accepted from the environment.
const MAX_VERBOSITY: u8 = 5;

/// Parses a verbosity given as a number (`0..=5`) or as a level name.
///
/// # Errors
///
/// Returns a message naming the rejected value when it is neither.
pub fn parse_verbosity(level: &str) -> Result<u8, String> {
    let level = level.trim();
    if let Ok(verbosity) = level.parse::<u8>() {
        return if verbosity <= MAX_VERBOSITY {
            Ok(verbosity)
        } else {
            Err(format!("log level {verbosity} is above {MAX_VERBOSITY}"))
        };
    }

    LEVEL_NAMES
        .iter()
        .position(|name| name.eq_ignore_ascii_case(level))
        .and_then(|index| u8::try_from(index).ok())
        .ok_or_else(|| format!("unknown log level: {level}"))
}

/// Tracing level for a verbosity; `0` leaves telemetry at its ERROR default.
#[must_use]
pub const fn tracing_level(verbosity: u8) -> Option<Level> {
    match verbosity {
        0 => None,
        1 => Some(Level::WARN),
        2 => Some(Level::INFO),
        3 => Some(Level::DEBUG),
        _ => Some(Level::TRACE),
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command.arg(
        Arg::new(ARG_VERBOSITY)
            .short('v')
            .long("verbose")
            .help("Log level: -v warn, -vv info, -vvv debug, -vvvv trace (default: error)")
            .env("HOSTELRY_LOG_LEVEL")
            .global(true)
            .action(ArgAction::Count)
            .value_parser(ValueParser::from(parse_verbosity)),
    )
}

#[cfg(test)]
mod tests {
    use super::{parse_verbosity, tracing_level};
    use tracing::Level;

    #[test]
    fn level_names_are_case_insensitive() {
        assert_eq!(parse_verbosity("error"), Ok(0));
        assert_eq!(parse_verbosity("WARN"), Ok(1));
        assert_eq!(parse_verbosity(" Info "), Ok(2));
        assert_eq!(parse_verbosity("debug"), Ok(3));
        assert_eq!(parse_verbosity("trace"), Ok(4));
    }

    #[test]
    fn numeric_levels_are_bounded() {
        assert_eq!(parse_verbosity("0"), Ok(0));
        assert_eq!(parse_verbosity("5"), Ok(5));
        assert!(parse_verbosity("6").is_err());
        assert!(parse_verbosity("verbose").is_err());
        assert!(parse_verbosity("").is_err());
    }

    #[test]
    fn verbosity_maps_to_levels() {
        assert_eq!(tracing_level(0), None);
        assert_eq!(tracing_level(1), Some(Level::WARN));
        assert_eq!(tracing_level(2), Some(Level::INFO));
        assert_eq!(tracing_level(3), Some(Level::DEBUG));
        assert_eq!(tracing_level(4), Some(Level::TRACE));
        assert_eq!(tracing_level(9), Some(Level::TRACE));
    }
}
