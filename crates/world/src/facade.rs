//! Typed world façade over the transport client.

use async_trait::async_trait;
use blockwright_config::WorldConfig;
use blockwright_core::error::TransportError;
use blockwright_core::world::{Inventory, World};
use serde::de::DeserializeOwned;

use crate::client::TransportClient;
use crate::protocol::Command;

/// A remote world reached over the command channel.
pub struct WorldClient {
    transport: TransportClient,
}

impl WorldClient {
    pub async fn connect(config: WorldConfig) -> Result<Self, TransportError> {
        Ok(Self {
            transport: TransportClient::connect(config).await?,
        })
    }

    pub fn address(&self) -> String {
        self.transport.address()
    }

    /// Liveness probe; the listener answers `"pong"`.
    pub async fn ping(&mut self) -> Result<String, TransportError> {
        self.request(Command::Ping).await
    }

    pub async fn close(&mut self) {
        self.transport.close().await;
    }

    async fn request<T: DeserializeOwned>(&mut self, command: Command) -> Result<T, TransportError> {
        let method = command.method();
        let value = self.transport.call(&command).await?;
        serde_json::from_value(value)
            .map_err(|e| TransportError::Protocol(format!("unexpected result for `{method}`: {e}")))
    }
}

#[async_trait]
impl World for WorldClient {
    async fn position(&mut self) -> Result<[f64; 3], TransportError> {
        self.request(Command::GetPosition).await
    }

    async fn move_to(&mut self, x: f64, y: f64, z: f64) -> Result<(), TransportError> {
        self.transport.call(&Command::MoveTo { x, y, z }).await?;
        Ok(())
    }

    async fn place_block(
        &mut self,
        x: i64,
        y: i64,
        z: i64,
        material: &str,
    ) -> Result<bool, TransportError> {
        self.request(Command::PlaceBlock {
            x,
            y,
            z,
            material: material.to_string(),
        })
        .await
    }

    async fn block_at(&mut self, x: i64, y: i64, z: i64) -> Result<String, TransportError> {
        self.request(Command::GetBlockAt { x, y, z }).await
    }

    async fn inventory(&mut self) -> Result<Inventory, TransportError> {
        self.request(Command::GetInventory).await
    }

    async fn set_inventory(&mut self, item: &str, count: i64) -> Result<(), TransportError> {
        self.transport
            .call(&Command::SetInventory {
                item: item.to_string(),
                count,
            })
            .await?;
        Ok(())
    }
}
