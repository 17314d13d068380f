/// Engine tuning knobs. Construct with [`Default`] or [`EngineConfig::from_env`].
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Capacity assumed when neither a covering slot nor a location resolves.
    pub default_max_capacity: u32,
    /// Occupancy percentage at or above which validations carry a warning.
    pub warning_threshold_percent: f64,
    /// How many days ahead the alternative-slot scan looks by default.
    pub alternative_days_to_check: u32,
    /// Upper bound on returned alternative slots.
    pub max_alternatives: usize,
    /// Minutes before a slot instance's start at which cancellation closes.
    /// None disables the cutoff.
    pub cancellation_cutoff_minutes: Option<i64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_max_capacity: 100,
            warning_threshold_percent: 80.0,
            alternative_days_to_check: 7,
            max_alternatives: 5,
            cancellation_cutoff_minutes: Some(0),
        }
    }
}

impl EngineConfig {
    /// Read overrides from `GATEHOUSE_*` environment variables; anything
    /// unset or unparseable keeps its default.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            default_max_capacity: env_parse(
                "GATEHOUSE_DEFAULT_MAX_CAPACITY",
                defaults.default_max_capacity,
            ),
            warning_threshold_percent: env_parse(
                "GATEHOUSE_WARNING_THRESHOLD_PERCENT",
                defaults.warning_threshold_percent,
            ),
            alternative_days_to_check: env_parse(
                "GATEHOUSE_ALTERNATIVE_DAYS",
                defaults.alternative_days_to_check,
            ),
            max_alternatives: env_parse("GATEHOUSE_MAX_ALTERNATIVES", defaults.max_alternatives),
            cancellation_cutoff_minutes: match std::env::var("GATEHOUSE_CANCELLATION_CUTOFF_MINUTES")
            {
                Ok(v) if v.eq_ignore_ascii_case("none") => None,
                Ok(v) => v
                    .parse::<i64>()
                    .ok()
                    .map(Some)
                    .unwrap_or(defaults.cancellation_cutoff_minutes),
                Err(_) => defaults.cancellation_cutoff_minutes,
            },
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_policy() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.default_max_capacity, 100);
        assert_eq!(cfg.warning_threshold_percent, 80.0);
        assert_eq!(cfg.alternative_days_to_check, 7);
        assert_eq!(cfg.max_alternatives, 5);
        assert_eq!(cfg.cancellation_cutoff_minutes, Some(0));
    }
}
