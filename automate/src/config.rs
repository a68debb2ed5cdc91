//! Runtime settings and the human duration parser they are read with.

use crate::errors::ConfigError;
use std::time::Duration;
use tracing::debug;

pub const STARTUP_DELAY_VAR: &str = "AUTOMATE_STARTUP_DELAY";
pub const SCRIPT_DELAY_VAR: &str = "AUTOMATE_SCRIPT_DELAY";
pub const PICK_DELAY_VAR: &str = "AUTOMATE_PICK_DELAY";
pub const FAILSAFE_VAR: &str = "AUTOMATE_FAILSAFE";

/// Delays and switches shared by the executor, the compiler and the picker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutomateConfig {
    /// Wait before an in-process run starts touching the desktop.
    pub startup_delay: Duration,
    /// Wait written into generated scripts before they start.
    pub script_delay: Duration,
    /// Pause before the coordinate picker starts its countdown.
    pub pick_settle: Duration,
    /// Time the operator has to hover over the target before it is read.
    pub pick_delay: Duration,
    /// Abort when the pointer is pushed into a screen corner.
    pub fail_safe: bool,
}

impl Default for AutomateConfig {
    fn default() -> Self {
        Self {
            startup_delay: Duration::from_secs(3),
            script_delay: Duration::from_secs(2),
            pick_settle: Duration::from_millis(500),
            pick_delay: Duration::from_millis(2500),
            fail_safe: true,
        }
    }
}

impl AutomateConfig {
    /// Defaults overridden by `AUTOMATE_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each variable.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(value) = lookup(STARTUP_DELAY_VAR) {
            config.startup_delay = parse_duration(&value)?;
        }
        if let Some(value) = lookup(SCRIPT_DELAY_VAR) {
            config.script_delay = parse_duration(&value)?;
        }
        if let Some(value) = lookup(PICK_DELAY_VAR) {
            config.pick_delay = parse_duration(&value)?;
        }
        if let Some(value) = lookup(FAILSAFE_VAR) {
            config.fail_safe = parse_flag(FAILSAFE_VAR, &value)?;
        }
        debug!(?config, "Loaded configuration");
        Ok(config)
    }

    /// Configuration for tests and dry runs: no delays.
    pub fn immediate() -> Self {
        Self {
            startup_delay: Duration::ZERO,
            pick_settle: Duration::ZERO,
            pick_delay: Duration::ZERO,
            ..Self::default()
        }
    }
}

/// Parse human-readable duration strings like "1s", "500ms", "2m", "1.5s".
/// A bare number is taken as milliseconds.
pub fn parse_duration(input: &str) -> Result<Duration, ConfigError> {
    let input = input.trim();

    if let Ok(ms) = input.parse::<u64>() {
        return Ok(Duration::from_millis(ms));
    }

    let (number_part, unit_part) = split_number_and_unit(input)?;
    let value: f64 = number_part
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidDuration(input.to_string()))?;
    if !value.is_finite() || value < 0.0 {
        return Err(ConfigError::InvalidDuration(input.to_string()));
    }

    let multiplier = match unit_part.trim() {
        "ms" | "milliseconds" | "millisecond" | "" => 0.001,
        "s" | "sec" | "secs" | "second" | "seconds" => 1.0,
        "m" | "min" | "mins" | "minute" | "minutes" => 60.0,
        "h" | "hr" | "hrs" | "hour" | "hours" => 3600.0,
        unit => {
            return Err(ConfigError::UnknownUnit {
                input: input.to_string(),
                unit: unit.to_string(),
            })
        }
    };

    Duration::try_from_secs_f64(value * multiplier)
        .map_err(|_| ConfigError::InvalidDuration(input.to_string()))
}

/// Short form for log lines: "3s", "2.5s", "500ms".
pub fn format_duration(duration: Duration) -> String {
    let millis = duration.as_millis();
    if millis < 1000 {
        format!("{millis}ms")
    } else if millis % 1000 == 0 {
        format!("{}s", millis / 1000)
    } else {
        format!("{}s", duration.as_secs_f64())
    }
}

fn split_number_and_unit(input: &str) -> Result<(&str, &str), ConfigError> {
    let split_pos = input
        .char_indices()
        .find(|(_, ch)| ch.is_alphabetic())
        .map_or(input.len(), |(i, _)| i);

    let number_part = &input[..split_pos];
    if number_part.trim().is_empty() {
        return Err(ConfigError::InvalidDuration(input.to_string()));
    }
    Ok((number_part, &input[split_pos..]))
}

fn parse_flag(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_parse_duration_milliseconds() {
        assert_eq!(parse_duration("500").unwrap(), Duration::from_millis(500));
        assert_eq!(parse_duration("1000ms").unwrap(), Duration::from_secs(1));
        assert_eq!(
            parse_duration("250milliseconds").unwrap(),
            Duration::from_millis(250)
        );
    }

    #[test]
    fn test_parse_duration_seconds_and_minutes() {
        assert_eq!(parse_duration("3s").unwrap(), Duration::from_secs(3));
        assert_eq!(parse_duration("2.5s").unwrap(), Duration::from_millis(2500));
        assert_eq!(parse_duration("1m").unwrap(), Duration::from_secs(60));
        assert_eq!(parse_duration("0.5h").unwrap(), Duration::from_secs(1800));
    }

    #[test]
    fn test_parse_duration_errors() {
        assert!(matches!(
            parse_duration("abc"),
            Err(ConfigError::InvalidDuration(_))
        ));
        assert!(matches!(
            parse_duration("10x"),
            Err(ConfigError::UnknownUnit { .. })
        ));
        assert!(parse_duration("").is_err());
        assert!(parse_duration("-1s").is_err());
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(3)), "3s");
        assert_eq!(format_duration(Duration::from_millis(2500)), "2.5s");
        assert_eq!(format_duration(Duration::from_millis(500)), "500ms");
        assert_eq!(format_duration(Duration::ZERO), "0ms");
    }

    #[test]
    fn test_from_lookup_overrides_defaults() {
        let vars: HashMap<&str, &str> = [(STARTUP_DELAY_VAR, "1s"), (FAILSAFE_VAR, "off")]
            .into_iter()
            .collect();
        let config =
            AutomateConfig::from_lookup(|key| vars.get(key).map(|v| v.to_string())).unwrap();

        assert_eq!(config.startup_delay, Duration::from_secs(1));
        assert!(!config.fail_safe);
        assert_eq!(config.script_delay, Duration::from_secs(2));
        assert_eq!(config.pick_delay, Duration::from_millis(2500));
    }

    #[test]
    fn test_from_lookup_rejects_bad_flag() {
        let err = AutomateConfig::from_lookup(|key| {
            (key == FAILSAFE_VAR).then(|| "maybe".to_string())
        })
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }
}
