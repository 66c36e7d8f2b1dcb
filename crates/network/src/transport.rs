//! Transports concrets pour la session vocale
//!
//! Ce module fournit les deux implémentations du seam de transport :
//! - WsConnector : WebSocket réel avec tokio-tungstenite
//! - SimulatedConnector : Pair scripté en mémoire pour les tests
//!
//! La connexion WebSocket est scindée en deux moitiés (émission/réception)
//! pour que la tâche de lecture et l'écrivain de session vivent chacun
//! de leur côté sans se bloquer.

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::{Connector, NetworkError, NetworkResult, WireSink, WireStream};
use crate::protocol::ServerEvent;

type WsConnection = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connector WebSocket réel
///
/// Ouvre une connexion tokio-tungstenite vers le backend et la scinde
/// en deux moitiés. Les frames non-texte (binaire, ping/pong) sont
/// transparentes pour la session : elles sont ignorées à la réception.
///
/// # Example
/// ```rust,no_run
/// use network::{Connector, WsConnector};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let connector = WsConnector::new();
/// let (sink, stream) = connector.connect("wss://backend/voice").await?;
/// # Ok(())
/// # }
/// ```
pub struct WsConnector;

impl WsConnector {
    /// Crée un nouveau connector WebSocket
    pub fn new() -> Self {
        Self
    }
}

impl Default for WsConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(
        &self,
        url: &str,
    ) -> NetworkResult<(Box<dyn WireSink>, Box<dyn WireStream>)> {
        let (ws, _response) = connect_async(url)
            .await
            .map_err(|e| NetworkError::connect_failed(url, e))?;

        tracing::info!(url, "connexion WebSocket ouverte");

        let (sink, stream) = ws.split();
        Ok((
            Box::new(WsSink { sink }),
            Box::new(WsTextStream { stream }),
        ))
    }
}

/// Moitié émission d'une connexion WebSocket
pub struct WsSink {
    sink: SplitSink<WsConnection, Message>,
}

#[async_trait]
impl WireSink for WsSink {
    async fn send_text(&mut self, text: String) -> NetworkResult<()> {
        self.sink.send(Message::Text(text)).await?;
        Ok(())
    }

    async fn close(&mut self) -> NetworkResult<()> {
        // Une erreur de close signifie que la connexion est déjà morte
        let _ = self.sink.send(Message::Close(None)).await;
        let _ = self.sink.close().await;
        Ok(())
    }
}

/// Moitié réception d'une connexion WebSocket
///
/// Ne remonte que les frames texte ; les pongs et frames binaires sont
/// filtrés ici pour que la session ne voie que le protocole JSON.
pub struct WsTextStream {
    stream: SplitStream<WsConnection>,
}

#[async_trait]
impl WireStream for WsTextStream {
    async fn next_text(&mut self) -> Option<NetworkResult<String>> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => return Some(Ok(text)),
                Some(Ok(Message::Close(_))) | None => return None,
                Some(Ok(_)) => continue, // Binaire, ping, pong : ignorés
                Some(Err(e)) => return Some(Err(NetworkError::WsError(e))),
            }
        }
    }
}

/// Frame circulant dans le transport simulé
enum SimFrame {
    Text(String),
    Close,
}

/// État partagé entre le connector simulé et ses moitiés de connexion
struct SimShared {
    /// Messages envoyés par le client, dans l'ordre
    sent: Mutex<Vec<String>>,

    /// Émetteur vers le flux de réception de la connexion courante
    server_tx: Mutex<Option<mpsc::UnboundedSender<SimFrame>>>,

    /// Nombre d'échecs de connexion restant à simuler
    fail_connects: AtomicU32,

    /// Nombre de connexions réussies depuis la création
    connect_count: AtomicU32,
}

/// Connector simulé pour les tests
///
/// Joue le rôle du backend : les tests poussent des événements serveur,
/// observent les messages envoyés par le client, ferment la connexion
/// pour simuler une coupure, ou font échouer les prochaines connexions.
///
/// Cloner le connector clone le handle de pilotage : le clone donné au
/// client et celui gardé par le test observent le même état.
///
/// # Example
/// ```rust
/// use network::{Connector, SimulatedConnector};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let connector = SimulatedConnector::new();
/// let pilote = connector.clone();
///
/// let (mut sink, mut stream) = connector.connect("ws://simulé").await?;
/// pilote.push_text(r#"{ "event": "stt_start" }"#.to_string());
///
/// let reçu = stream.next_text().await.unwrap()?;
/// assert!(reçu.contains("stt_start"));
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct SimulatedConnector {
    shared: Arc<SimShared>,
}

impl SimulatedConnector {
    /// Crée un nouveau connector simulé
    pub fn new() -> Self {
        Self {
            shared: Arc::new(SimShared {
                sent: Mutex::new(Vec::new()),
                server_tx: Mutex::new(None),
                fail_connects: AtomicU32::new(0),
                connect_count: AtomicU32::new(0),
            }),
        }
    }

    /// Pousse un message texte brut vers le client
    ///
    /// Sans effet si aucune connexion n'est ouverte.
    pub fn push_text(&self, text: String) {
        if let Ok(guard) = self.shared.server_tx.lock() {
            if let Some(tx) = guard.as_ref() {
                let _ = tx.send(SimFrame::Text(text));
            }
        }
    }

    /// Pousse un événement serveur sérialisé vers le client
    pub fn push_event(&self, event: &ServerEvent) {
        let text = serde_json::to_string(event).expect("sérialisation d'un événement simulé");
        self.push_text(text);
    }

    /// Ferme la connexion courante côté serveur (coupure inattendue)
    pub fn close_connection(&self) {
        if let Ok(mut guard) = self.shared.server_tx.lock() {
            if let Some(tx) = guard.take() {
                let _ = tx.send(SimFrame::Close);
            }
        }
    }

    /// Fait échouer les `count` prochaines tentatives de connexion
    pub fn fail_next_connects(&self, count: u32) {
        self.shared.fail_connects.store(count, Ordering::SeqCst);
    }

    /// Nombre de connexions réussies depuis la création
    pub fn connect_count(&self) -> u32 {
        self.shared.connect_count.load(Ordering::SeqCst)
    }

    /// Copie des messages envoyés par le client, dans l'ordre
    pub fn sent_messages(&self) -> Vec<String> {
        self.shared
            .sent
            .lock()
            .map(|sent| sent.clone())
            .unwrap_or_default()
    }

    /// Nombre de messages envoyés par le client
    pub fn sent_count(&self) -> usize {
        self.shared.sent.lock().map(|sent| sent.len()).unwrap_or(0)
    }

    /// Oublie les messages envoyés jusqu'ici
    pub fn clear_sent(&self) {
        if let Ok(mut sent) = self.shared.sent.lock() {
            sent.clear();
        }
    }
}

impl Default for SimulatedConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Connector for SimulatedConnector {
    async fn connect(
        &self,
        url: &str,
    ) -> NetworkResult<(Box<dyn WireSink>, Box<dyn WireStream>)> {
        if self.shared.fail_connects.load(Ordering::SeqCst) > 0 {
            self.shared.fail_connects.fetch_sub(1, Ordering::SeqCst);
            return Err(NetworkError::connect_failed(url, "échec simulé"));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        if let Ok(mut guard) = self.shared.server_tx.lock() {
            *guard = Some(tx);
        }
        self.shared.connect_count.fetch_add(1, Ordering::SeqCst);

        Ok((
            Box::new(SimSink {
                shared: Arc::clone(&self.shared),
            }),
            Box::new(SimStream { rx }),
        ))
    }
}

/// Moitié émission simulée : archive chaque message envoyé
struct SimSink {
    shared: Arc<SimShared>,
}

#[async_trait]
impl WireSink for SimSink {
    async fn send_text(&mut self, text: String) -> NetworkResult<()> {
        if let Ok(mut sent) = self.shared.sent.lock() {
            sent.push(text);
        }
        Ok(())
    }

    async fn close(&mut self) -> NetworkResult<()> {
        Ok(())
    }
}

/// Moitié réception simulée : rejoue ce que le test a poussé
struct SimStream {
    rx: mpsc::UnboundedReceiver<SimFrame>,
}

#[async_trait]
impl WireStream for SimStream {
    async fn next_text(&mut self) -> Option<NetworkResult<String>> {
        match self.rx.recv().await {
            Some(SimFrame::Text(text)) => Some(Ok(text)),
            Some(SimFrame::Close) | None => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_simulated_connect_and_send() {
        let connector = SimulatedConnector::new();
        let (mut sink, _stream) = connector.connect("ws://simulé").await.unwrap();

        sink.send_text("un".to_string()).await.unwrap();
        sink.send_text("deux".to_string()).await.unwrap();

        assert_eq!(connector.sent_messages(), vec!["un", "deux"]);
        assert_eq!(connector.connect_count(), 1);
    }

    #[tokio::test]
    async fn test_simulated_server_events_in_order() {
        let connector = SimulatedConnector::new();
        let (_sink, mut stream) = connector.connect("ws://simulé").await.unwrap();

        connector.push_event(&ServerEvent::SttStart);
        connector.push_event(&ServerEvent::SttComplete {
            text: "bonjour".to_string(),
        });

        let first = stream.next_text().await.unwrap().unwrap();
        let second = stream.next_text().await.unwrap().unwrap();

        assert!(first.contains("stt_start"));
        assert!(second.contains("stt_complete"));
    }

    #[tokio::test]
    async fn test_simulated_close_ends_stream() {
        let connector = SimulatedConnector::new();
        let (_sink, mut stream) = connector.connect("ws://simulé").await.unwrap();

        connector.close_connection();
        assert!(stream.next_text().await.is_none());
    }

    #[tokio::test]
    async fn test_simulated_connect_failures() {
        let connector = SimulatedConnector::new();
        connector.fail_next_connects(2);

        assert!(connector.connect("ws://simulé").await.is_err());
        assert!(connector.connect("ws://simulé").await.is_err());
        assert!(connector.connect("ws://simulé").await.is_ok());
        assert_eq!(connector.connect_count(), 1);
    }

    #[tokio::test]
    async fn test_reconnect_replaces_server_side() {
        let connector = SimulatedConnector::new();

        let (_s1, mut old_stream) = connector.connect("ws://simulé").await.unwrap();
        connector.close_connection();
        assert!(old_stream.next_text().await.is_none());

        // Nouvelle connexion : les événements vont au nouveau flux
        let (_s2, mut new_stream) = connector.connect("ws://simulé").await.unwrap();
        connector.push_event(&ServerEvent::RagStart);

        let text = new_stream.next_text().await.unwrap().unwrap();
        assert!(text.contains("rag_start"));
        assert_eq!(connector.connect_count(), 2);
    }
}
