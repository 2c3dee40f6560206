//! NetworkSink - best-effort UDP datagram per envelope
//!
//! Params:
//! - `addr`: target `host:port` (required)
//! - `format`: `json` (default) or `bincode`
//! - `max_packet_size`: larger datagrams are skipped (default 65000)
//! - `topics`: comma-separated topic prefixes to forward (default: all)

use std::collections::HashMap;
use std::net::SocketAddr;
use std::str::FromStr;

use contracts::{ContractError, DataSink, Envelope};
use tokio::net::UdpSocket;
use tracing::{debug, info, instrument, warn};

/// Encoding of one datagram
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WireFormat {
    #[default]
    Json,
    Bincode,
}

impl FromStr for WireFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "json" => Ok(Self::Json),
            "bincode" => Ok(Self::Bincode),
            other => Err(format!("unknown format '{other}' (expected json or bincode)")),
        }
    }
}

impl WireFormat {
    fn encode(self, envelope: &Envelope) -> Result<Vec<u8>, String> {
        match self {
            Self::Json => serde_json::to_vec(envelope).map_err(|e| format!("json: {e}")),
            Self::Bincode => bincode::serialize(envelope).map_err(|e| format!("bincode: {e}")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NetworkSinkConfig {
    pub addr: SocketAddr,
    pub format: WireFormat,
    pub max_packet_size: usize,
    /// Empty forwards every topic
    pub topics: Vec<String>,
}

impl NetworkSinkConfig {
    pub const DEFAULT_MAX_PACKET: usize = 65000;

    pub fn to(addr: SocketAddr) -> Self {
        Self {
            addr,
            format: WireFormat::default(),
            max_packet_size: Self::DEFAULT_MAX_PACKET,
            topics: Vec::new(),
        }
    }

    pub fn from_params(params: &HashMap<String, String>) -> Result<Self, String> {
        let raw = params.get("addr").ok_or("missing 'addr' parameter")?;
        let addr = raw
            .parse()
            .map_err(|e| format!("invalid address '{raw}': {e}"))?;

        let mut config = Self::to(addr);
        if let Some(format) = params.get("format") {
            config.format = format.parse()?;
        }
        if let Some(size) = params.get("max_packet_size") {
            config.max_packet_size = size
                .parse()
                .map_err(|e| format!("invalid max_packet_size '{size}': {e}"))?;
        }
        if let Some(topics) = params.get("topics") {
            config.topics = topics
                .split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(String::from)
                .collect();
        }
        Ok(config)
    }

    fn forwards(&self, topic: &str) -> bool {
        self.topics.is_empty() || self.topics.iter().any(|prefix| topic.starts_with(prefix.as_str()))
    }
}

pub struct NetworkSink {
    name: String,
    socket: UdpSocket,
    config: NetworkSinkConfig,
    sent: u64,
    oversized: u64,
}

impl NetworkSink {
    pub async fn new(name: impl Into<String>, config: NetworkSinkConfig) -> std::io::Result<Self> {
        let name = name.into();
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        socket.connect(config.addr).await?;
        debug!(sink = %name, target = %config.addr, format = ?config.format, "NetworkSink ready");

        Ok(Self {
            name,
            socket,
            config,
            sent: 0,
            oversized: 0,
        })
    }

    pub async fn from_params(
        name: impl Into<String>,
        params: &HashMap<String, String>,
    ) -> Result<Self, ContractError> {
        let name = name.into();
        let config = NetworkSinkConfig::from_params(params)
            .map_err(|e| ContractError::config_validation(format!("sinks[name={name}].params"), e))?;

        Self::new(name.clone(), config)
            .await
            .map_err(|e| ContractError::SinkConnection {
                sink_name: name,
                message: e.to_string(),
            })
    }
}

impl DataSink for NetworkSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "network_sink_write",
        skip(self, envelope),
        fields(sink = %self.name, topic = %envelope.topic, seq = envelope.seq)
    )]
    async fn write(&mut self, envelope: &Envelope) -> Result<(), ContractError> {
        if !self.config.forwards(&envelope.topic) {
            return Ok(());
        }

        let datagram = self
            .config
            .format
            .encode(envelope)
            .map_err(|e| ContractError::sink_write(&self.name, e))?;

        if datagram.len() > self.config.max_packet_size {
            self.oversized += 1;
            warn!(
                sink = %self.name,
                topic = %envelope.topic,
                size = datagram.len(),
                max = self.config.max_packet_size,
                "Datagram too large, skipped"
            );
            return Ok(());
        }

        // Nobody listening is not a sink failure
        match self.socket.send(&datagram).await {
            Ok(_) => self.sent += 1,
            Err(e) => debug!(sink = %self.name, error = %e, "UDP send failed"),
        }
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), ContractError> {
        Ok(())
    }

    #[instrument(name = "network_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        info!(
            sink = %self.name,
            sent = self.sent,
            oversized = self.oversized,
            "NetworkSink closed"
        );
        Ok(())
    }
}
