//! Crate network - Transport de session pour l'assistant vocal
//!
//! Ce crate fournit le client de session temps réel du backend vocal :
//! une connexion WebSocket longue durée, supervisée, sur laquelle
//! circule le protocole JSON du pipeline STT → RAG → TTS.
//!
//! # Architecture
//!
//! Le crate est organisé en plusieurs modules :
//!
//! - `error` : Gestion d'erreurs avec types spécialisés session
//! - `types` : Types de données (états, session, configuration, événements)
//! - `protocol` : Messages du protocole filaire JSON
//! - `traits` : Traits abstraits du transport (connector, sink, stream)
//! - `transport` : Implémentations WebSocket (réelle et simulée)
//! - `manager` : Client de session haut niveau avec la logique métier
//!
//! # Examples
//!
//! ## Client basique
//!
//! ```rust,no_run
//! use network::{SessionClient, SessionConfig, SessionEvent, VoiceState};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut config = SessionConfig::default();
//! config.url = "wss://backend/voice".to_string();
//!
//! let mut client = SessionClient::new(config)?;
//! let mut events = client.take_events().unwrap();
//!
//! // Se résout à l'ouverture du transport, pas à la session prête
//! client.connect().await?;
//!
//! // La session est utilisable au passage à Ready
//! while let Some(event) = events.recv().await {
//!     if event == SessionEvent::StateChanged(VoiceState::Ready) {
//!         client.send_audio("<base64>").await?;
//!         break;
//!     }
//! }
//!
//! client.disconnect().await;
//! # Ok(())
//! # }
//! ```
//!
//! ## Tests et simulation
//!
//! ```rust
//! use network::{SessionClient, SessionConfig, SimulatedConnector};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // Pair scripté : aucun vrai réseau
//! let connector = SimulatedConnector::new();
//! let client = SessionClient::with_connector(
//!     SessionConfig::test_config(),
//!     connector.clone(),
//! )?;
//!
//! client.connect().await?;
//! // Le test pilote le "serveur" : connector.push_event(...), etc.
//! # Ok(())
//! # }
//! ```

// Modules internes
mod error;
mod types;
pub mod protocol;
mod traits;
mod transport;
mod manager;

// Re-exports publics
pub use error::{NetworkError, NetworkResult};

pub use types::{SessionConfig, SessionEvent, VoiceSession, VoiceState};

pub use protocol::{ClientMessage, ServerEvent};

pub use traits::{Connector, WireSink, WireStream};

pub use transport::{SimulatedConnector, WsConnector};

pub use manager::SessionClient;

/// Version du crate network
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Tests d'intégration du crate complet
#[cfg(test)]
mod integration_tests {
    use super::*;

    #[tokio::test]
    async fn test_client_creation() {
        // Transport réel
        let client_real = SessionClient::new(SessionConfig::default());
        assert!(client_real.is_ok());

        // Transport simulé
        let client_sim =
            SessionClient::with_connector(SessionConfig::test_config(), SimulatedConnector::new());
        assert!(client_sim.is_ok());
    }

    #[tokio::test]
    async fn test_invalid_config_rejected() {
        let mut config = SessionConfig::default();
        config.url = "http://pas-du-websocket".to_string();

        let result = SessionClient::new(config);
        assert!(matches!(result, Err(NetworkError::ConfigError(_))));
    }

    #[tokio::test]
    async fn test_event_receiver_taken_once() {
        let mut client =
            SessionClient::with_connector(SessionConfig::default(), SimulatedConnector::new())
                .unwrap();

        assert!(client.take_events().is_some());
        assert!(client.take_events().is_none());
    }

    #[test]
    fn test_protocol_round_trip_through_reexports() {
        let message = ClientMessage::Audio {
            data: "AAAA".to_string(),
        };
        let encoded = protocol::encode_client_message(&message).unwrap();
        assert!(encoded.contains("\"action\":\"audio\""));

        let event = protocol::decode_server_event(r#"{ "event": "done", "duration": 12 }"#).unwrap();
        assert_eq!(event, ServerEvent::Done { duration: 12 });
    }
}
