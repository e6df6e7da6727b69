//! JSON configuration model
//!
//! One configuration file describes every tester conversation the client
//! offers. The field names follow the established configuration schema of
//! the diagnostic tooling this client integrates with, hence the
//! non-idiomatic JSON spellings.

use std::path::Path;

use serde::Deserialize;

/// Configuration load/validation error
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file could not be read
    #[error("config file could not be read: {0}")]
    Io(#[from] std::io::Error),
    /// The file is not valid JSON or misses required fields
    #[error("config file could not be parsed: {0}")]
    Parse(#[from] serde_json::Error),
    /// The file parsed but its content is inconsistent
    #[error("config file is invalid: {0}")]
    Invalid(String),
}

/// Top level configuration object
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    /// The conversation set
    #[serde(rename = "Conversation")]
    pub conversation: ConversationBlock,
}

/// The `Conversation` member of the configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ConversationBlock {
    /// Declared number of conversation entries; must match the list length
    #[serde(rename = "NumberOfConversion")]
    pub number_of_conversion: u32,
    /// One property object per conversation
    #[serde(rename = "ConversionProperty")]
    pub properties: Vec<ConversationProperty>,
}

/// Properties of a single conversation
#[derive(Debug, Clone, Deserialize)]
pub struct ConversationProperty {
    /// Unique conversation name, the lookup key
    #[serde(rename = "ConversionName")]
    pub name: String,
    /// P2 client timeout in milliseconds
    #[serde(rename = "p2ClientMax")]
    pub p2_client_max: u16,
    /// P2* client timeout in milliseconds
    #[serde(rename = "p2StarClientMax")]
    pub p2_star_client_max: u16,
    /// Transmit buffer size in bytes
    #[serde(rename = "TxBufferSize")]
    pub tx_buffer_size: u32,
    /// Receive buffer size in bytes
    #[serde(rename = "RxBufferSize")]
    pub rx_buffer_size: u32,
    /// Logical address of the tester
    #[serde(rename = "SourceAddress")]
    pub source_address: u16,
    /// Default logical address of the target ECU
    #[serde(rename = "TargetAddress")]
    pub target_address: u16,
    /// Network endpoints
    #[serde(rename = "Network")]
    pub network: NetworkConfig,
    /// TLS parameters, carried opaquely for TLS capable transports
    #[serde(rename = "Tls", default)]
    pub tls: Option<TlsConfig>,
}

/// Network endpoints of a conversation
#[derive(Debug, Clone, Deserialize)]
pub struct NetworkConfig {
    /// Local IP address the TCP socket binds to
    #[serde(rename = "TcpIpAddress")]
    pub tcp_ip_address: String,
    /// Local IP address the UDP sockets bind to
    #[serde(rename = "UdpIpAddress")]
    pub udp_ip_address: String,
    /// Destination address for identification broadcasts
    #[serde(rename = "UdpBroadcastAddress")]
    pub udp_broadcast_address: String,
    /// Remote DoIP port
    #[serde(rename = "Port")]
    pub port: u16,
    /// Local IP address for a TLS secured socket, when configured
    #[serde(rename = "TlsIpAddress", default)]
    pub tls_ip_address: Option<String>,
}

/// TLS parameters. The core never interprets these; they are handed to a
/// TLS capable transport implementation as-is
#[derive(Debug, Clone, Deserialize)]
pub struct TlsConfig {
    /// TLS protocol version, e.g. "1.3"
    #[serde(rename = "Version", default)]
    pub version: Option<String>,
    /// OpenSSL style cipher list
    #[serde(rename = "CipherList", default)]
    pub cipher_list: Option<String>,
    /// Path to the CA certificate
    #[serde(rename = "CaCertificatePath", default)]
    pub ca_certificate_path: Option<String>,
}

impl ClientConfig {
    /// Loads and validates a configuration file
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let block = &self.conversation;
        if block.number_of_conversion as usize != block.properties.len() {
            return Err(ConfigError::Invalid(format!(
                "NumberOfConversion is {} but {} ConversionProperty entries are present",
                block.number_of_conversion,
                block.properties.len()
            )));
        }
        if block.properties.is_empty() {
            return Err(ConfigError::Invalid(
                "at least one conversation must be configured".to_string(),
            ));
        }
        let mut names: Vec<&str> = block.properties.iter().map(|p| p.name.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        if names.len() != block.properties.len() {
            return Err(ConfigError::Invalid(
                "conversation names must be unique".to_string(),
            ));
        }
        for property in &block.properties {
            for address in [
                &property.network.tcp_ip_address,
                &property.network.udp_ip_address,
                &property.network.udp_broadcast_address,
            ] {
                if address.parse::<std::net::IpAddr>().is_err() {
                    return Err(ConfigError::Invalid(format!(
                        "'{}' carries the invalid IP address '{}'",
                        property.name, address
                    )));
                }
            }
        }
        Ok(())
    }
}
