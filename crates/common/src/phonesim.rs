//! Phone simulator client
//!
//! The emulator pairs every watch with a simulated phone reachable over a
//! websocket. Frames sent to it start with an endpoint byte; app configuration
//! uses endpoint `0x0a` followed by a command byte and, for the response
//! command, a big-endian length-prefixed payload.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use futures::SinkExt;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, trace};

use crate::types::{Configuration, TargetVariant};
use crate::{Error, Result};

/// Endpoint of app configuration frames
pub const APP_CONFIG_ENDPOINT: u8 = 0x0a;

const CMD_SETUP: u8 = 0x01;
const CMD_RESPONSE: u8 = 0x02;
const CMD_CANCELLED: u8 = 0x03;

/// App configuration message sent to the simulated phone
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppConfigMessage {
    /// Announces that a configuration transfer is starting
    Setup,
    /// Carries the configuration, percent-encoded JSON
    Response { data: String },
    /// Aborts a transfer
    Cancelled,
}

impl AppConfigMessage {
    /// Build the response carrying `config`
    pub fn response_for(config: &Configuration) -> Result<Self> {
        let json = serde_json::to_string(config)?;
        let data = urlencoding::encode(&json).into_owned();
        payload_len(data.len())?;
        Ok(AppConfigMessage::Response { data })
    }

    /// Serialize into a websocket frame, endpoint byte included
    pub fn encode(&self) -> Result<Bytes> {
        let mut buf = BytesMut::with_capacity(2);
        buf.put_u8(APP_CONFIG_ENDPOINT);
        match self {
            AppConfigMessage::Setup => buf.put_u8(CMD_SETUP),
            AppConfigMessage::Response { data } => {
                let len = payload_len(data.len())?;
                buf.reserve(4 + data.len());
                buf.put_u8(CMD_RESPONSE);
                buf.put_u32(len);
                buf.put_slice(data.as_bytes());
            }
            AppConfigMessage::Cancelled => buf.put_u8(CMD_CANCELLED),
        }
        Ok(buf.freeze())
    }

    /// Parse a frame produced by [`AppConfigMessage::encode`]
    pub fn decode(frame: &[u8]) -> Result<Self> {
        let mut buf = frame;
        if buf.remaining() < 2 {
            return Err(Error::Protocol(format!("Frame too short: {} bytes", frame.len())));
        }

        let endpoint = buf.get_u8();
        if endpoint != APP_CONFIG_ENDPOINT {
            return Err(Error::Protocol(format!("Unexpected endpoint 0x{:02x}", endpoint)));
        }

        match buf.get_u8() {
            CMD_SETUP => Ok(AppConfigMessage::Setup),
            CMD_CANCELLED => Ok(AppConfigMessage::Cancelled),
            CMD_RESPONSE => {
                if buf.remaining() < 4 {
                    return Err(Error::Protocol("Response without length".to_string()));
                }
                let len = buf.get_u32() as usize;
                if buf.remaining() < len {
                    return Err(Error::Protocol(format!(
                        "Response truncated: expected {} bytes, got {}",
                        len,
                        buf.remaining()
                    )));
                }
                let data = String::from_utf8(buf[..len].to_vec())
                    .map_err(|e| Error::Protocol(format!("Response is not UTF-8: {}", e)))?;
                Ok(AppConfigMessage::Response { data })
            }
            other => Err(Error::Protocol(format!("Unknown app config command 0x{:02x}", other))),
        }
    }
}

// The length prefix is a u32; larger payloads cannot be framed.
fn payload_len(len: usize) -> Result<u32> {
    u32::try_from(len)
        .map_err(|_| Error::Protocol(format!("Response payload too large: {} bytes", len)))
}

/// Websocket connection to one phone simulator
pub struct PhonesimClient {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl PhonesimClient {
    /// Connect to the phone simulator websocket at `url`
    pub async fn connect(url: impl Into<String>) -> Result<Self> {
        let url = url.into();
        let (stream, _response) = connect_async(url.as_str()).await?;
        debug!("Connected to phone simulator at {}", url);
        Ok(Self { stream })
    }

    /// Connect to the simulator on a local port
    pub async fn connect_local(port: u16) -> Result<Self> {
        Self::connect(format!("ws://localhost:{}/", port)).await
    }

    /// Send one app configuration frame
    pub async fn send(&mut self, message: &AppConfigMessage) -> Result<()> {
        let frame = message.encode()?;
        trace!("Phone simulator frame: {:02x?}", &frame[..frame.len().min(16)]);
        self.stream.send(Message::Binary(frame.to_vec())).await?;
        Ok(())
    }

    /// Close the websocket
    pub async fn close(&mut self) -> Result<()> {
        self.stream.close(None).await?;
        Ok(())
    }
}

/// Registry the SDK keeps of running emulators, keyed by platform then SDK version
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct EmulatorInfo {
    platforms: BTreeMap<String, BTreeMap<String, EmulatorInstance>>,
}

/// Processes of one emulator; only the phone simulator is of interest here
#[derive(Debug, Clone, Deserialize)]
pub struct EmulatorInstance {
    pub pypkjs: Option<ProcessInfo>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProcessInfo {
    pub port: u16,
}

impl EmulatorInfo {
    /// Default registry location in the system temp directory
    pub fn default_path() -> PathBuf {
        std::env::temp_dir().join("pb-emulator.json")
    }

    /// Read the registry; a missing file means no emulator is running
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Phone simulator port of the emulator running `variant`, newest SDK version first
    pub fn phonesim_port(&self, variant: TargetVariant) -> Result<u16> {
        self.platforms
            .get(variant.as_str())
            .and_then(|versions| {
                versions
                    .iter()
                    .filter_map(|(version, i)| i.pypkjs.as_ref().map(|p| (version_key(version), p)))
                    .max_by(|a, b| a.0.cmp(&b.0))
            })
            .map(|(_, p)| p.port)
            .ok_or_else(|| Error::EmulatorNotRunning(variant.to_string()))
    }
}

/// Numeric components of an SDK version, so that "4.10" sorts after "4.9".
/// Non-numeric suffixes ("4.3-beta2") are ignored per component.
fn version_key(version: &str) -> Vec<u32> {
    version
        .split('.')
        .map(|part| {
            let digits: String = part.chars().take_while(char::is_ascii_digit).collect();
            digits.parse().unwrap_or(0)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_setup_frame() {
        assert_eq!(&AppConfigMessage::Setup.encode().unwrap()[..], &[0x0a, 0x01]);
        assert_eq!(&AppConfigMessage::Cancelled.encode().unwrap()[..], &[0x0a, 0x03]);
    }

    #[test]
    fn test_response_frame_is_length_prefixed() {
        let frame = AppConfigMessage::Response { data: "abc".to_string() }
            .encode()
            .unwrap();
        assert_eq!(&frame[..], &[0x0a, 0x02, 0, 0, 0, 3, b'a', b'b', b'c']);
        assert_eq!(
            AppConfigMessage::decode(&frame).unwrap(),
            AppConfigMessage::Response { data: "abc".to_string() }
        );
    }

    #[test]
    fn test_response_is_percent_encoded_json() {
        let config = json!({"units": "mg/dL", "url": "http://localhost:5555"})
            .as_object()
            .cloned()
            .unwrap();

        let AppConfigMessage::Response { data } = AppConfigMessage::response_for(&config).unwrap() else {
            panic!("expected a response message");
        };
        assert!(!data.contains('{'));
        assert!(!data.contains(' '));

        let decoded = urlencoding::decode(&data).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&decoded).unwrap();
        assert_eq!(parsed, json!({"units": "mg/dL", "url": "http://localhost:5555"}));
    }

    #[test]
    fn test_payload_length_must_fit_u32() {
        assert_eq!(payload_len(0).unwrap(), 0);
        assert_eq!(payload_len(u32::MAX as usize).unwrap(), u32::MAX);
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn test_oversized_payload_is_rejected() {
        let err = payload_len(u32::MAX as usize + 1).unwrap_err();
        assert!(matches!(err, Error::Protocol(ref m) if m.contains("too large")));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(AppConfigMessage::decode(&[0x0a]).is_err());
        assert!(AppConfigMessage::decode(&[0x01, 0x01]).is_err());
        assert!(AppConfigMessage::decode(&[0x0a, 0x02, 0, 0, 0, 9, b'x']).is_err());
    }

    #[test]
    fn test_emulator_info_lookup() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pb-emulator.json");
        std::fs::write(
            &path,
            r#"{
  "basalt": {
    "4.2": {"qemu": {"port": 51000, "pid": 10}, "pypkjs": {"port": 51010, "pid": 11}},
    "4.3": {"qemu": {"port": 52000, "pid": 20}, "pypkjs": {"port": 52010, "pid": 21}}
  },
  "aplite": {
    "4.3": {"qemu": {"port": 53000, "pid": 30}}
  }
}"#,
        )
        .unwrap();

        let info = EmulatorInfo::load(&path).unwrap();
        assert_eq!(info.phonesim_port(TargetVariant::Basalt).unwrap(), 52010);
        assert!(matches!(
            info.phonesim_port(TargetVariant::Aplite),
            Err(Error::EmulatorNotRunning(_))
        ));

        let empty = EmulatorInfo::load(&dir.path().join("none.json")).unwrap();
        assert!(empty.phonesim_port(TargetVariant::Chalk).is_err());
    }

    #[test]
    fn test_emulator_info_compares_versions_numerically() {
        let info: EmulatorInfo = serde_json::from_value(json!({
            "basalt": {
                "4.9": {"pypkjs": {"port": 49000}},
                "4.10": {"pypkjs": {"port": 41000}},
                "4.2": {"pypkjs": {"port": 42000}}
            }
        }))
        .unwrap();

        assert_eq!(info.phonesim_port(TargetVariant::Basalt).unwrap(), 41000);
    }

    #[test]
    fn test_version_key() {
        assert!(version_key("4.10") > version_key("4.9"));
        assert!(version_key("4.3.1") > version_key("4.3"));
        assert_eq!(version_key("4.3-beta2"), vec![4, 3]);
    }
}
