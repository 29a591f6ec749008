use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

const MIN_INTERVAL_SECS: u64 = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MowerConfig {
    pub liveness_interval_secs: u64,
    pub liveness_offset_secs: u64,
    pub poll_interval_secs: u64,
    pub poll_offset_secs: u64,
    /// Pause between the zone meter override and the start action.
    pub zone_start_delay_ms: u64,
    pub max_payload_bytes: usize,
}

impl Default for MowerConfig {
    fn default() -> Self {
        Self {
            liveness_interval_secs: 1_200,
            liveness_offset_secs: 30,
            poll_interval_secs: 3_600,
            poll_offset_secs: 60,
            zone_start_delay_ms: 2_000,
            max_payload_bytes: 64 * 1024,
        }
    }
}

impl MowerConfig {
    pub fn sanitize(&mut self) {
        self.liveness_interval_secs = self.liveness_interval_secs.max(MIN_INTERVAL_SECS);
        self.poll_interval_secs = self.poll_interval_secs.max(MIN_INTERVAL_SECS);
        self.zone_start_delay_ms = self.zone_start_delay_ms.min(60_000);
        if self.max_payload_bytes == 0 {
            self.max_payload_bytes = Self::default().max_payload_bytes;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub mqtt_host: String,
    pub mqtt_port: u16,
    pub mqtt_user: String,
    pub mqtt_pass: String,
    pub client_id: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            mqtt_host: "127.0.0.1".to_string(),
            mqtt_port: 1883,
            mqtt_user: String::new(),
            mqtt_pass: String::new(),
            client_id: "landroid-bridge".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    pub base_url: String,
    pub access_token: String,
    pub request_timeout_secs: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.worxlandroid.com/api/v2".to_string(),
            access_token: String::new(),
            request_timeout_secs: 15,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default)]
    pub mower: MowerConfig,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub registry: RegistryConfig,
    #[serde(default)]
    pub serial_number: String,
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default = "default_http_port")]
    pub http_port: u16,
}

fn default_timezone() -> String {
    "UTC".to_string()
}

fn default_http_port() -> u16 {
    8080
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            mower: MowerConfig::default(),
            network: NetworkConfig::default(),
            registry: RegistryConfig::default(),
            serial_number: String::new(),
            timezone: default_timezone(),
            http_port: default_http_port(),
        }
    }
}

impl RuntimeConfig {
    pub fn sanitize(&mut self) {
        self.mower.sanitize();
        if self.timezone.parse::<Tz>().is_err() {
            self.timezone = "UTC".to_string();
        }
        self.registry.base_url = self.registry.base_url.trim_end_matches('/').to_string();
        if self.registry.request_timeout_secs == 0 {
            self.registry.request_timeout_secs = RegistryConfig::default().request_timeout_secs;
        }
    }

    /// Device timezone used to read `cfg.dt`/`cfg.tm`.
    pub fn tz(&self) -> Tz {
        self.timezone.parse().unwrap_or(Tz::UTC)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_clamps_intervals_and_timezone() {
        let mut config = RuntimeConfig {
            timezone: "Mars/Olympus_Mons".to_string(),
            ..RuntimeConfig::default()
        };
        config.mower.liveness_interval_secs = 1;
        config.mower.poll_interval_secs = 0;
        config.registry.base_url = "https://registry.local/api/".to_string();

        config.sanitize();

        assert_eq!(config.mower.liveness_interval_secs, MIN_INTERVAL_SECS);
        assert_eq!(config.mower.poll_interval_secs, MIN_INTERVAL_SECS);
        assert_eq!(config.timezone, "UTC");
        assert_eq!(config.tz(), Tz::UTC);
        assert_eq!(config.registry.base_url, "https://registry.local/api");
    }

    #[test]
    fn partial_file_fills_defaults() {
        let config: RuntimeConfig = serde_json::from_str(
            r#"{"timezone":"Europe/Berlin","mower":{"poll_interval_secs":600}}"#,
        )
        .unwrap();

        assert_eq!(config.tz(), chrono_tz::Europe::Berlin);
        assert_eq!(config.mower.poll_interval_secs, 600);
        assert_eq!(config.mower.liveness_interval_secs, 1_200);
        assert_eq!(config.network.mqtt_port, 1883);
        assert_eq!(config.http_port, 8080);
    }
}
