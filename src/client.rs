//! Diagnostic client facade
//!
//! The facade loads the configuration, constructs one conversation per
//! configured entry plus the single vehicle discovery conversation, and
//! vends conversations by name. The conversation set is immutable between
//! `initialize` and `de_initialize`.

use std::collections::HashMap;
use std::net::IpAddr;
use std::path::{Path, PathBuf};

use log::{error, info};

use crate::config::{ClientConfig, ConversationProperty};
use crate::conversation::{
    ActivityStatus, ConversationSettings, DiagClientConversation, VehicleAddrInfo,
    VehicleDiscoveryConversation, VehicleInfoRequest,
};
use crate::doip::PROTOCOL_VERSION_2012;
use crate::transport::{DoipTcpTransport, DoipUdpTransport};
use crate::{ConversationError, InitError, VehicleInfoError};

/// Creates a diagnostic client bound to the given configuration file. The
/// file is read when [DiagnosticClient::initialize] is called
pub fn create_diagnostic_client<P: AsRef<Path>>(config_path: P) -> DiagnosticClient {
    DiagnosticClient {
        config_path: config_path.as_ref().to_path_buf(),
        conversations: HashMap::new(),
        vehicle_discovery: None,
    }
}

/// The top level diagnostic client, owner of every conversation
pub struct DiagnosticClient {
    config_path: PathBuf,
    conversations: HashMap<String, DiagClientConversation>,
    vehicle_discovery: Option<VehicleDiscoveryConversation>,
}

impl std::fmt::Debug for DiagnosticClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiagnosticClient")
            .field("config_path", &self.config_path)
            .field("conversations", &self.conversations.len())
            .finish()
    }
}

impl DiagnosticClient {
    /// Parses the configuration and constructs the conversation set. The
    /// vehicle discovery conversation is started right away; the tester
    /// conversations are started individually by the application
    pub fn initialize(&mut self) -> Result<(), InitError> {
        if !self.conversations.is_empty() || self.vehicle_discovery.is_some() {
            return Err(InitError::InitializationFailed(
                "client is already initialized".to_string(),
            ));
        }
        let config = ClientConfig::load_from_file(&self.config_path)
            .map_err(|e| InitError::InitializationFailed(e.to_string()))?;
        for property in &config.conversation.properties {
            let conversation = Self::build_conversation(property)?;
            self.conversations
                .insert(property.name.clone(), conversation);
        }
        // The discovery conversation shares the network of the first entry
        let first = &config.conversation.properties[0];
        let local_udp: IpAddr = Self::parse_address(&first.network.udp_ip_address)?;
        let broadcast: IpAddr = Self::parse_address(&first.network.udp_broadcast_address)?;
        let udp_transport = DoipUdpTransport::new(local_udp, first.network.port);
        let discovery = VehicleDiscoveryConversation::new(
            broadcast,
            first.network.port,
            PROTOCOL_VERSION_2012,
            Box::new(udp_transport),
        );
        discovery.startup()?;
        self.vehicle_discovery = Some(discovery);
        info!(
            "diagnostic client initialized with {} conversation(s)",
            self.conversations.len()
        );
        Ok(())
    }

    /// Shuts every conversation down and drops the set. The client can be
    /// initialized again afterwards
    pub fn de_initialize(&mut self) -> Result<(), InitError> {
        for conversation in self.conversations.values() {
            if conversation.activity_status() == ActivityStatus::Active {
                conversation.shutdown()?;
            }
        }
        self.conversations.clear();
        if let Some(discovery) = self.vehicle_discovery.take() {
            if discovery.activity_status() == ActivityStatus::Active {
                discovery.shutdown()?;
            }
        }
        info!("diagnostic client de-initialized");
        Ok(())
    }

    /// Looks a conversation up by its configured name
    pub fn get_diagnostic_client_conversation(
        &self,
        name: &str,
    ) -> Result<&DiagClientConversation, ConversationError> {
        self.conversations.get(name).ok_or_else(|| {
            error!("no conversation named '{}' is configured", name);
            ConversationError::NoConversationFound
        })
    }

    /// Runs a vehicle identification round on the discovery conversation
    pub fn send_vehicle_identification_request(
        &self,
        request: &VehicleInfoRequest,
    ) -> Result<Vec<VehicleAddrInfo>, VehicleInfoError> {
        match &self.vehicle_discovery {
            Some(discovery) => discovery.send_vehicle_identification_request(request),
            None => {
                error!("vehicle identification requested on an uninitialized client");
                Err(VehicleInfoError::TransmitFailed)
            }
        }
    }

    fn parse_address(text: &str) -> Result<IpAddr, InitError> {
        text.parse::<IpAddr>().map_err(|e| {
            InitError::InitializationFailed(format!("invalid IP address '{}': {}", text, e))
        })
    }

    fn build_conversation(
        property: &ConversationProperty,
    ) -> Result<DiagClientConversation, InitError> {
        let local_tcp = Self::parse_address(&property.network.tcp_ip_address)?;
        let settings = ConversationSettings {
            name: property.name.clone(),
            source_address: property.source_address,
            target_address: property.target_address,
            p2_client_max: std::time::Duration::from_millis(u64::from(property.p2_client_max)),
            p2_star_client_max: std::time::Duration::from_millis(u64::from(
                property.p2_star_client_max,
            )),
            tx_buffer_size: property.tx_buffer_size,
            rx_buffer_size: property.rx_buffer_size,
            port_number: property.network.port,
            protocol_version: PROTOCOL_VERSION_2012,
        };
        let transport = DoipTcpTransport::new(local_tcp);
        Ok(DiagClientConversation::new(settings, Box::new(transport)))
    }
}
