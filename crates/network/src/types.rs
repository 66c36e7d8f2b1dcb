//! Types de données pour le transport de session
//!
//! Ce module définit les structures principales de la couche de session :
//! - VoiceState : États de la machine à états de session
//! - VoiceSession : Données de la session en cours (dernier tour)
//! - SessionConfig : Configuration du transport
//! - SessionEvent : Flux d'événements typés exposé à l'appelant

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::protocol::ServerEvent;

/// États de la machine à états de session vocale
///
/// Le cycle nominal est :
/// `Idle → Connecting → Connected → Ready → Processing → Speaking → Ready (boucle)`.
/// `Error` est atteignable depuis n'importe quel état sur condition fatale
/// et ne se quitte que par un nouveau `connect()` explicite.
/// `Idle` est aussi l'état d'arrivée d'une déconnexion ordinaire.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum VoiceState {
    /// Aucune connexion active
    Idle,

    /// Ouverture de la connexion en cours (ou reconnexion programmée)
    Connecting,

    /// Transport ouvert, init envoyé, en attente du `initialized` serveur
    Connected,

    /// Session initialisée, prête à accepter de l'audio
    Ready,

    /// Le backend traite un tour (STT, RAG ou TTS en cours)
    Processing,

    /// Réponse synthétisée reçue, lecture côté client
    Speaking,

    /// Condition fatale - seule issue : un nouveau connect()
    Error,
}

impl VoiceState {
    /// Vérifie si une connexion est ouverte (heartbeat actif)
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            VoiceState::Connected | VoiceState::Ready | VoiceState::Processing | VoiceState::Speaking
        )
    }

    /// Vérifie si la session accepte de l'audio sortant
    pub fn accepts_audio(&self) -> bool {
        matches!(self, VoiceState::Ready)
    }

    /// Description textuelle de l'état pour l'UI
    pub fn description(&self) -> &'static str {
        match self {
            VoiceState::Idle => "Inactif",
            VoiceState::Connecting => "Connexion en cours",
            VoiceState::Connected => "Connecté, initialisation",
            VoiceState::Ready => "Prêt",
            VoiceState::Processing => "Traitement en cours",
            VoiceState::Speaking => "Réponse en cours",
            VoiceState::Error => "Erreur",
        }
    }
}

impl std::fmt::Display for VoiceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Données de la session vocale en cours
///
/// Une instance n'existe qu'entre la réception d'un `initialized` et la
/// terminaison de la connexion ; elle est jetée à la déconnexion, jamais
/// archivée. Les champs de tour sont écrasés à chaque nouveau tour, ce
/// n'est pas un historique.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct VoiceSession {
    /// Identifiant de conversation attribué par le backend
    pub thread_id: String,

    /// Identifiant de la base de connaissances associée à la session
    pub kb_id: String,

    /// Transcription du dernier tour (stt_complete)
    pub transcribed_text: Option<String>,

    /// Réponse textuelle du dernier tour (rag_complete)
    pub ai_response: Option<String>,

    /// Réponse audio du dernier tour, encodée base64 (tts_complete)
    pub audio_response: Option<String>,

    /// Format annoncé de la réponse audio (ex: "wav")
    pub audio_format: Option<String>,

    /// Durée totale du dernier tour en millisecondes (done)
    pub duration_ms: Option<u64>,

    /// Dernier message d'erreur reçu du backend
    pub error: Option<String>,
}

impl VoiceSession {
    /// Crée une session fraîche à partir des identifiants du backend
    pub fn new(thread_id: impl Into<String>, kb_id: impl Into<String>) -> Self {
        Self {
            thread_id: thread_id.into(),
            kb_id: kb_id.into(),
            ..Default::default()
        }
    }
}

/// Configuration du transport de session
///
/// Centralise tous les paramètres configurables de la couche de session.
/// Fournie à la construction du client, jamais modifiée ensuite.
#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// URL WebSocket du backend vocal (ex: "wss://backend/voice")
    pub url: String,

    /// Identifiant de conversation à annoncer dans le message init
    ///
    /// Vide pour une nouvelle conversation : le backend en attribue un.
    pub thread_id: String,

    /// Format audio annoncé dans le message init (défaut: "wav")
    pub audio_format: String,

    /// Intervalle entre deux pings keep-alive (défaut: 30s)
    pub heartbeat_interval: Duration,

    /// Reconnexion automatique sur fermeture inattendue (défaut: activée)
    pub auto_reconnect: bool,

    /// Nombre maximum de tentatives de reconnexion (défaut: 3)
    pub max_reconnect_attempts: u32,

    /// Délai de base du backoff exponentiel (défaut: 1s)
    ///
    /// Le délai de la tentative n vaut min(base * 2^n, max).
    pub reconnect_base_delay: Duration,

    /// Plafond du délai de reconnexion (défaut: 10s)
    pub reconnect_max_delay: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            url: "ws://localhost:8080/voice".to_string(),
            thread_id: String::new(),
            audio_format: "wav".to_string(),
            heartbeat_interval: Duration::from_secs(30),
            auto_reconnect: true,
            max_reconnect_attempts: 3,
            reconnect_base_delay: Duration::from_secs(1),
            reconnect_max_delay: Duration::from_secs(10),
        }
    }
}

impl SessionConfig {
    /// Configuration pour tests (paramètres accélérés)
    pub fn test_config() -> Self {
        Self {
            heartbeat_interval: Duration::from_millis(100),
            reconnect_base_delay: Duration::from_millis(10),
            reconnect_max_delay: Duration::from_millis(100),
            ..Default::default()
        }
    }

    /// Calcule le délai de backoff pour une tentative donnée (1-indexée)
    ///
    /// Formule : min(base * 2^tentative, plafond).
    /// Avec les défauts : 2s, 4s, 8s.
    pub fn reconnect_delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.reconnect_base_delay
            .saturating_mul(factor)
            .min(self.reconnect_max_delay)
    }

    /// Valide que la configuration est cohérente
    pub fn validate(&self) -> Result<(), String> {
        if self.url.is_empty() {
            return Err("URL du backend vide".to_string());
        }
        if !self.url.starts_with("ws://") && !self.url.starts_with("wss://") {
            return Err(format!("URL non WebSocket: {}", self.url));
        }
        if self.heartbeat_interval.is_zero() {
            return Err("Intervalle de heartbeat nul".to_string());
        }
        Ok(())
    }
}

/// Événement typé émis sur le flux de session
///
/// Un seul flux ordonné remplace des callbacks séparés : l'appelant
/// observe les événements serveur, les changements d'état et les
/// incidents transport exactement dans leur ordre d'arrivée.
#[derive(Clone, Debug, PartialEq)]
pub enum SessionEvent {
    /// Événement serveur retransmis tel quel après parsing
    Server(ServerEvent),

    /// La machine à états vient de changer d'état
    StateChanged(VoiceState),

    /// Incident de la couche transport (perte de connexion, reconnexion...)
    ///
    /// `fatal` indique que la session est condamnée (état Error) ;
    /// sinon c'est un incident informatif (reconnexion en cours).
    Transport { message: String, fatal: bool },
}
