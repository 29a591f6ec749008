use std::time::Duration;

use async_trait::async_trait;
use landroid_common::{Capabilities, RegistryConfig, SyncError};
use serde::Deserialize;
use serde_json::Value;

/// What the cloud registry knows about one device at attach time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryDevice {
    pub serial_number: String,
    pub online: bool,
    pub capabilities: Capabilities,
    /// Topic the device listens on for commands.
    pub command_in: String,
    /// Topic the device pushes telemetry to.
    pub command_out: String,
}

#[async_trait]
pub trait DeviceRegistry: Send + Sync {
    async fn fetch_device(&self, serial: &str) -> Result<RegistryDevice, SyncError>;
    async fn fetch_online_status(&self, serial: &str) -> Result<bool, SyncError>;
    async fn fetch_last_known_status(&self, serial: &str) -> Result<Value, SyncError>;
}

#[derive(Debug, Deserialize)]
struct ProductItem {
    serial_number: String,
    #[serde(default)]
    online: bool,
    #[serde(default)]
    mqtt_topics: MqttTopics,
    #[serde(default)]
    features: Features,
}

#[derive(Debug, Default, Deserialize)]
struct MqttTopics {
    #[serde(default)]
    command_in: String,
    #[serde(default)]
    command_out: String,
}

#[derive(Debug, Default, Deserialize)]
struct Features {
    #[serde(default)]
    lock: bool,
    #[serde(default)]
    rain_delay: bool,
    #[serde(default)]
    multi_zone: bool,
}

impl From<ProductItem> for RegistryDevice {
    fn from(item: ProductItem) -> Self {
        Self {
            serial_number: item.serial_number,
            online: item.online,
            capabilities: Capabilities {
                lock: item.features.lock,
                rain_delay: item.features.rain_delay,
                multi_zone: item.features.multi_zone,
            },
            command_in: item.mqtt_topics.command_in,
            command_out: item.mqtt_topics.command_out,
        }
    }
}

pub struct HttpRegistry {
    client: reqwest::Client,
    base_url: String,
    access_token: String,
}

impl HttpRegistry {
    pub fn new(config: &RegistryConfig) -> Result<Self, SyncError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(registry_failure)?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            access_token: config.access_token.clone(),
        })
    }

    async fn get<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, SyncError> {
        let url = format!("{}/{path}", self.base_url);
        self.client
            .get(&url)
            .bearer_auth(&self.access_token)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(registry_failure)?
            .json::<T>()
            .await
            .map_err(registry_failure)
    }

    async fn product_items(&self) -> Result<Vec<ProductItem>, SyncError> {
        self.get("product-items").await
    }
}

#[async_trait]
impl DeviceRegistry for HttpRegistry {
    async fn fetch_device(&self, serial: &str) -> Result<RegistryDevice, SyncError> {
        self.product_items()
            .await?
            .into_iter()
            .find(|item| item.serial_number == serial)
            .map(RegistryDevice::from)
            .ok_or_else(|| SyncError::RegistryFailure(format!("device {serial} is not registered")))
    }

    async fn fetch_online_status(&self, serial: &str) -> Result<bool, SyncError> {
        // A device missing from the list counts as offline.
        Ok(self
            .product_items()
            .await?
            .iter()
            .any(|item| item.serial_number == serial && item.online))
    }

    async fn fetch_last_known_status(&self, serial: &str) -> Result<Value, SyncError> {
        self.get(&format!("product-items/{serial}/status")).await
    }
}

fn registry_failure(err: reqwest::Error) -> SyncError {
    SyncError::RegistryFailure(err.to_string())
}
