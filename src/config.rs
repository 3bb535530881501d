use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorSource {
    /// Samples arrive from the AR client as `accel` frames.
    Remote,
    /// A local task fakes a tilting phone.
    Simulated,
}

impl SensorSource {
    pub fn from_env(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "remote" => Some(SensorSource::Remote),
            "simulated" | "sim" => Some(SensorSource::Simulated),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub bind: String,
    pub tick_hz: u32,
    pub sensor: SensorSource,
    pub sensor_hz: u32, // simulated sensor rate; remote clients get it in `welcome`
    pub template_path: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:9001".to_string(),
            tick_hz: 60,
            sensor: SensorSource::Remote,
            sensor_hz: 60,
            template_path: None,
        }
    }
}

fn parse_rate(key: &str, value: &str) -> Option<u32> {
    match u32::from_str(value.trim()) {
        Ok(hz) if hz > 0 => Some(hz),
        _ => {
            warn!("ignoring {key}={value:?}: expected a positive integer");
            None
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` knows about.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = ServerConfig::default();

        if let Some(bind) = lookup("AR_DRIVE_BIND") {
            config.bind = bind;
        }
        if let Some(hz) = lookup("AR_DRIVE_TICK_HZ").and_then(|v| parse_rate("AR_DRIVE_TICK_HZ", &v)) {
            config.tick_hz = hz;
        }
        if let Some(value) = lookup("AR_DRIVE_SENSOR") {
            match SensorSource::from_env(&value) {
                Some(source) => config.sensor = source,
                None => warn!("ignoring AR_DRIVE_SENSOR={value:?}: expected remote or simulated"),
            }
        }
        if let Some(hz) = lookup("AR_DRIVE_SENSOR_HZ").and_then(|v| parse_rate("AR_DRIVE_SENSOR_HZ", &v)) {
            config.sensor_hz = hz;
        }
        if let Some(path) = lookup("AR_DRIVE_TEMPLATE") {
            if !path.trim().is_empty() {
                config.template_path = Some(path.into());
            }
        }

        config
    }

    pub fn tick_period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.tick_hz))
    }

    pub fn sensor_period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.sensor_hz))
    }

    pub fn dt(&self) -> f32 {
        1.0 / self.tick_hz as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_without_environment() {
        let config = ServerConfig::from_lookup(|_| None);
        assert_eq!(config, ServerConfig::default());
        assert_eq!(config.tick_period(), Duration::from_secs_f64(1.0 / 60.0));
    }

    #[test]
    fn environment_overrides() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("AR_DRIVE_BIND", "127.0.0.1:7000"),
            ("AR_DRIVE_TICK_HZ", "120"),
            ("AR_DRIVE_SENSOR", "Simulated"),
            ("AR_DRIVE_SENSOR_HZ", "30"),
            ("AR_DRIVE_TEMPLATE", "assets/car.json"),
        ]));

        assert_eq!(config.bind, "127.0.0.1:7000");
        assert_eq!(config.tick_hz, 120);
        assert_eq!(config.sensor, SensorSource::Simulated);
        assert_eq!(config.sensor_hz, 30);
        assert_eq!(config.template_path, Some(PathBuf::from("assets/car.json")));
    }

    #[test]
    fn bad_values_keep_defaults() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("AR_DRIVE_TICK_HZ", "0"),
            ("AR_DRIVE_SENSOR", "gyro"),
            ("AR_DRIVE_SENSOR_HZ", "fast"),
            ("AR_DRIVE_TEMPLATE", "  "),
        ]));
        assert_eq!(config, ServerConfig::default());
    }
}
