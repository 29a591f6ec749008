use async_trait::async_trait;
use landroid_common::SyncError;
use rumqttc::{AsyncClient, QoS};

/// Publish/subscribe side of the broker. Inbound messages are delivered by the host's
/// event loop, which routes them by topic.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn publish(&self, topic: &str, payload: String) -> Result<(), SyncError>;
    async fn subscribe(&self, topic: &str) -> Result<(), SyncError>;
}

#[derive(Clone)]
pub struct MqttTransport {
    client: AsyncClient,
}

impl MqttTransport {
    pub fn new(client: AsyncClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for MqttTransport {
    async fn publish(&self, topic: &str, payload: String) -> Result<(), SyncError> {
        self.client
            .publish(topic, QoS::AtMostOnce, false, payload.into_bytes())
            .await
            .map_err(|err| SyncError::TransportFailure(format!("publish to {topic}: {err}")))
    }

    async fn subscribe(&self, topic: &str) -> Result<(), SyncError> {
        self.client
            .subscribe(topic, QoS::AtMostOnce)
            .await
            .map_err(|err| SyncError::TransportFailure(format!("subscribe to {topic}: {err}")))
    }
}
