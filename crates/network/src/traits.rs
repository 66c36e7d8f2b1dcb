//! Traits abstraits pour le transport de session
//!
//! Ce module définit les interfaces (traits) que doivent implémenter
//! les composants de transport. Cela permet d'avoir du code modulaire
//! et testable avec différentes implémentations.

use async_trait::async_trait;

use crate::NetworkResult;

/// Moitié émission d'une connexion ouverte
///
/// Le client écrit ses messages JSON texte via ce trait. La connexion
/// WebSocket est scindée en deux moitiés : l'émission reste sous le
/// verrou de session (un seul écrivain), la réception vit dans la tâche
/// de lecture.
#[async_trait]
pub trait WireSink: Send {
    /// Envoie un message texte (JSON sérialisé) sur la connexion
    ///
    /// # Erreurs
    /// - `NetworkError::WsError` : La connexion est en panne
    async fn send_text(&mut self, text: String) -> NetworkResult<()>;

    /// Ferme proprement la connexion
    ///
    /// Les erreurs de fermeture sont ignorables : la connexion est
    /// considérée fermée quoi qu'il arrive.
    async fn close(&mut self) -> NetworkResult<()>;
}

/// Moitié réception d'une connexion ouverte
///
/// La tâche de lecture consomme les messages un par un, strictement
/// dans l'ordre d'arrivée.
#[async_trait]
pub trait WireStream: Send {
    /// Attend le prochain message texte
    ///
    /// # Returns
    /// - `Some(Ok(texte))` : Un message est arrivé
    /// - `Some(Err(e))` : La connexion est en panne
    /// - `None` : La connexion est fermée (fin de flux)
    async fn next_text(&mut self) -> Option<NetworkResult<String>>;
}

/// Ouvre des connexions vers le backend vocal
///
/// Ce trait abstrait permet d'utiliser différentes implémentations :
/// - WsConnector : Connexion WebSocket réelle avec tokio-tungstenite
/// - SimulatedConnector : Pair scripté en mémoire pour les tests
///
/// La reconnexion rouvre une connexion via le même connector : c'est lui
/// qui matérialise "une nouvelle connexion sous la même session logique".
///
/// # Example
/// ```rust,no_run
/// use network::{Connector, WsConnector};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let connector = WsConnector::new();
/// let (mut sink, _stream) = connector.connect("ws://localhost:8080/voice").await?;
/// sink.send_text(r#"{ "action": "ping" }"#.to_string()).await?;
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait Connector: Send + Sync {
    /// Ouvre une connexion et retourne ses deux moitiés
    ///
    /// # Arguments
    /// * `url` - URL WebSocket du backend
    ///
    /// # Erreurs
    /// - `NetworkError::ConnectFailed` : Backend injoignable ou refus
    async fn connect(
        &self,
        url: &str,
    ) -> NetworkResult<(Box<dyn WireSink>, Box<dyn WireStream>)>;
}
