//! Configuration push to the emulated phone
//!
//! The receiving app expects to be told that a transfer is starting before
//! the payload arrives, and nothing is acknowledged. Each variant therefore
//! gets `Setup` then `Response`, separated by fixed settle intervals.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::error::E2eResult;
use watchshot_common::{
    AppConfigMessage, Configuration, DelayConfig, EmulatorInfo, PhonesimClient, TargetVariant,
};

/// Open connection to one variant's phone simulator
#[async_trait]
pub trait DeviceTransport: Send {
    async fn send(&mut self, message: &AppConfigMessage) -> E2eResult<()>;

    async fn close(&mut self) -> E2eResult<()> {
        Ok(())
    }
}

/// Opens transports per variant
#[async_trait]
pub trait TransportConnector: Send + Sync {
    async fn connect(&self, variant: TargetVariant) -> E2eResult<Box<dyn DeviceTransport>>;
}

#[async_trait]
impl DeviceTransport for PhonesimClient {
    async fn send(&mut self, message: &AppConfigMessage) -> E2eResult<()> {
        PhonesimClient::send(self, message).await?;
        Ok(())
    }

    async fn close(&mut self) -> E2eResult<()> {
        PhonesimClient::close(self).await?;
        Ok(())
    }
}

/// Connects to the phone simulators of running SDK emulators
pub struct EmulatorConnector {
    registry_path: PathBuf,
    pinned_ports: BTreeMap<TargetVariant, u16>,
}

impl EmulatorConnector {
    pub fn new(registry_path: impl Into<PathBuf>) -> Self {
        Self {
            registry_path: registry_path.into(),
            pinned_ports: BTreeMap::new(),
        }
    }

    /// Skip registry discovery for `variant`
    pub fn pin_port(mut self, variant: TargetVariant, port: u16) -> Self {
        self.pinned_ports.insert(variant, port);
        self
    }

    fn port_for(&self, variant: TargetVariant) -> E2eResult<u16> {
        if let Some(port) = self.pinned_ports.get(&variant) {
            return Ok(*port);
        }
        // Read fresh on every connect: install restarts emulators on new ports.
        let info = EmulatorInfo::load(&self.registry_path)?;
        Ok(info.phonesim_port(variant)?)
    }
}

impl Default for EmulatorConnector {
    fn default() -> Self {
        Self::new(EmulatorInfo::default_path())
    }
}

#[async_trait]
impl TransportConnector for EmulatorConnector {
    async fn connect(&self, variant: TargetVariant) -> E2eResult<Box<dyn DeviceTransport>> {
        let port = self.port_for(variant)?;
        debug!("Phone simulator for {} on port {}", variant, port);
        let client = PhonesimClient::connect_local(port).await?;
        Ok(Box::new(client))
    }
}

/// Delivers app configuration to every variant
pub struct ConfigPusher {
    connector: Box<dyn TransportConnector>,
    delays: DelayConfig,
}

impl ConfigPusher {
    pub fn new(connector: Box<dyn TransportConnector>, delays: DelayConfig) -> Self {
        Self { connector, delays }
    }

    /// Push `config` to each variant in turn, then wait for the re-render
    pub async fn push_config(&self, config: &Configuration, variants: &[TargetVariant]) -> E2eResult<()> {
        let response = AppConfigMessage::response_for(config)?;

        for &variant in variants {
            info!("Pushing configuration to {}", variant);
            let mut transport = self.connector.connect(variant).await?;
            sleep(self.delays.connect_settle()).await;

            transport.send(&AppConfigMessage::Setup).await?;
            sleep(self.delays.message_settle()).await;

            transport.send(&response).await?;

            // Delivery is already done; a failed close handshake is not fatal.
            if let Err(e) = transport.close().await {
                warn!("Closing phone simulator for {} failed: {}", variant, e);
            }
        }

        sleep(self.delays.render_settle()).await;
        Ok(())
    }
}
