use std::time::Duration;

/// Tunables for a device session.
///
/// Defaults match what the hardware expects during normal tracking. Any field
/// can be overridden from the environment with [`SessionConfig::from_env`]:
///
/// - `VRTRACK_POLL_TIMEOUT_MS`
/// - `VRTRACK_REPORT_RATE`
/// - `VRTRACK_IDLE_REPORT_RATE`
/// - `VRTRACK_BLINK`
/// - `VRTRACK_LOW_PERSISTENCE`
/// - `VRTRACK_PIXEL_READBACK`
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Upper bound on every transport wait.
    pub poll_timeout: Duration,
    /// Sensor report rate requested at start, in Hz.
    pub report_rate: u32,
    /// Report rate restored at stop, in Hz.
    pub idle_report_rate: u32,
    /// A keepalive is resent after `keepalive_factor * report_rate` reports.
    pub keepalive_factor: u32,
    /// Initial IR LED mode: blinking patterns (true) or steady (false).
    pub blink: bool,
    pub low_persistence: bool,
    pub pixel_readback: bool,
    /// Capacity of the event channel handed to the consumer.
    pub channel_capacity: usize,
    /// Radio control status polls before a transfer counts as stuck.
    pub activation_poll_limit: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            poll_timeout: Duration::from_secs(1),
            report_rate: 500,
            idle_report_rate: 50,
            keepalive_factor: 9,
            blink: true,
            low_persistence: true,
            pixel_readback: true,
            channel_capacity: 256,
            activation_poll_limit: 64,
        }
    }
}

impl SessionConfig {
    /// Default configuration with environment overrides applied.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            poll_timeout: Duration::from_millis(read_env_u64(
                "VRTRACK_POLL_TIMEOUT_MS",
                defaults.poll_timeout.as_millis() as u64,
            )),
            report_rate: read_env_u32("VRTRACK_REPORT_RATE", defaults.report_rate),
            idle_report_rate: read_env_u32("VRTRACK_IDLE_REPORT_RATE", defaults.idle_report_rate),
            blink: read_env_bool("VRTRACK_BLINK", defaults.blink),
            low_persistence: read_env_bool("VRTRACK_LOW_PERSISTENCE", defaults.low_persistence),
            pixel_readback: read_env_bool("VRTRACK_PIXEL_READBACK", defaults.pixel_readback),
            ..defaults
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn read_env_bool(name: &str, default: bool) -> bool {
    std::env::var(name)
        .ok()
        .and_then(|v| parse_bool(&v))
        .unwrap_or(default)
}

fn read_env_u32(name: &str, default: u32) -> u32 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse::<u32>().ok())
        .unwrap_or(default)
}

fn read_env_u64(name: &str, default: u64) -> u64 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_boolean_spellings() {
        assert_eq!(parse_bool(" Yes "), Some(true));
        assert_eq!(parse_bool("off"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn env_override_applies() {
        std::env::set_var("VRTRACK_REPORT_RATE", "250");
        let config = SessionConfig::from_env();
        std::env::remove_var("VRTRACK_REPORT_RATE");
        assert_eq!(config.report_rate, 250);
        assert_eq!(config.idle_report_rate, 50);
        assert_eq!(config.poll_timeout, Duration::from_secs(1));
    }
}
