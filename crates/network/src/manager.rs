//! Client de session vocale haut niveau
//!
//! Ce module implémente la logique métier de la session : machine à
//! états, envoi du message init, heartbeat périodique, reconnexion
//! bornée avec backoff exponentiel, et retransmission ordonnée des
//! événements serveur à l'appelant. Il orchestre le transport bas
//! niveau et fournit une API simple au contrôleur.

use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::sleep;

use crate::protocol::{self, ClientMessage, ServerEvent};
use crate::{
    Connector, NetworkError, NetworkResult, SessionConfig, SessionEvent, VoiceSession,
    VoiceState, WireSink, WireStream, WsConnector,
};

/// Capacité du canal d'événements vers l'appelant
///
/// Largement au-dessus du rythme d'un tour de session ; si l'appelant
/// ne consomme plus, les événements excédentaires sont perdus avec un log.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Client de session vocale
///
/// Cette structure détient exactement une connexion sous-jacente à la
/// fois. Une reconnexion rouvre une connexion sous la même session
/// logique mais ne fabrique pas de nouvelle VoiceSession : celle-ci
/// n'existe qu'entre un `initialized` serveur et la fin de la connexion.
///
/// # Architecture
/// - Transport abstrait (WebSocket réel ou simulé)
/// - Machine à états pour la session
/// - Tâches séparées pour heartbeat et lecture
/// - Un seul flux ordonné d'événements typés vers l'appelant
///
/// # Example
/// ```rust,no_run
/// use network::{SessionClient, SessionConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let mut config = SessionConfig::default();
/// config.url = "wss://backend/voice".to_string();
///
/// let mut client = SessionClient::new(config)?;
/// let mut events = client.take_events().unwrap();
///
/// client.connect().await?;
/// while let Some(event) = events.recv().await {
///     println!("événement: {:?}", event);
/// }
/// # Ok(())
/// # }
/// ```
pub struct SessionClient {
    /// Cœur partagé avec les tâches de fond
    inner: Arc<ClientInner>,

    /// Récepteur d'événements, cédé à l'appelant via take_events()
    event_rx: Option<mpsc::Receiver<SessionEvent>>,
}

/// Partie du client partagée entre l'API publique et les tâches de fond
struct ClientInner {
    /// Configuration de session, figée à la construction
    config: SessionConfig,

    /// Fabrique de connexions (réelle ou simulée)
    connector: Box<dyn Connector>,

    /// État mutable de la session, sous un seul verrou
    shared: Mutex<SharedState>,

    /// Émetteur du flux d'événements
    event_tx: mpsc::Sender<SessionEvent>,
}

/// État mutable de la session
///
/// Tout vit sous le même verrou : l'ordre d'application des événements
/// entrants est l'ordre d'arrivée, sans réordonnancement possible.
struct SharedState {
    /// État courant de la machine à états
    state: VoiceState,

    /// Session en cours (None tant que `initialized` n'est pas arrivé)
    session: Option<VoiceSession>,

    /// Moitié émission de la connexion courante
    sink: Option<Box<dyn WireSink>>,

    /// Tâche de lecture de la connexion courante
    reader: Option<JoinHandle<()>>,

    /// Tâche de heartbeat (au plus une par client)
    heartbeat: Option<JoinHandle<()>>,

    /// Timer de reconnexion programmé (au plus un par client)
    reconnect: Option<JoinHandle<()>>,

    /// Tentatives de reconnexion consommées depuis la dernière session établie
    reconnect_attempts: u32,

    /// Déconnexion volontaire en cours : neutralise les tâches de fond
    closing: bool,

    /// Identifie la connexion courante ; une tâche d'une connexion
    /// remplacée ne peut plus toucher l'état
    generation: u64,
}

impl SharedState {
    fn new() -> Self {
        Self {
            state: VoiceState::Idle,
            session: None,
            sink: None,
            reader: None,
            heartbeat: None,
            reconnect: None,
            reconnect_attempts: 0,
            closing: false,
            generation: 0,
        }
    }
}

impl SessionClient {
    /// Crée un client avec le transport WebSocket réel
    ///
    /// # Arguments
    /// * `config` - Configuration de session
    ///
    /// # Erreurs
    /// - `NetworkError::ConfigError` : Configuration incohérente
    pub fn new(config: SessionConfig) -> NetworkResult<Self> {
        Self::with_connector(config, WsConnector::new())
    }

    /// Crée un client avec un connector personnalisé (tests, simulation)
    pub fn with_connector(
        config: SessionConfig,
        connector: impl Connector + 'static,
    ) -> NetworkResult<Self> {
        config.validate().map_err(NetworkError::ConfigError)?;

        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

        Ok(Self {
            inner: Arc::new(ClientInner {
                config,
                connector: Box::new(connector),
                shared: Mutex::new(SharedState::new()),
                event_tx,
            }),
            event_rx: Some(event_rx),
        })
    }

    /// Cède le récepteur du flux d'événements à l'appelant
    ///
    /// Le flux est unique et strictement ordonné ; il ne peut être pris
    /// qu'une fois (None ensuite).
    pub fn take_events(&mut self) -> Option<mpsc::Receiver<SessionEvent>> {
        self.event_rx.take()
    }

    /// Configuration du client
    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    /// Ouvre la connexion vers le backend
    ///
    /// La future se résout quand le transport est ouvert et le message
    /// init envoyé - PAS quand la session est prête. L'appelant qui a
    /// besoin d'une session utilisable attend `StateChanged(Ready)` sur
    /// le flux d'événements.
    ///
    /// # Erreurs
    /// - `NetworkError::InvalidState` : Une session est déjà active
    /// - `NetworkError::ConnectFailed` : Backend injoignable ; l'état
    ///   passe à Error et aucune reconnexion n'est programmée (le retry
    ///   automatique ne couvre que les coupures inattendues)
    pub async fn connect(&self) -> NetworkResult<()> {
        {
            let mut shared = self.inner.shared.lock().await;
            match shared.state {
                VoiceState::Idle | VoiceState::Error => {}
                current => {
                    return Err(NetworkError::invalid_state("connect", current));
                }
            }
            shared.closing = false;
            shared.reconnect_attempts = 0;
            shared.session = None;
            self.inner.set_state(&mut shared, VoiceState::Connecting);
        }

        match self.inner.open_connection().await {
            Ok(()) => Ok(()),
            Err(e) => {
                let mut shared = self.inner.shared.lock().await;
                if !shared.closing {
                    self.inner.set_state(&mut shared, VoiceState::Error);
                    self.inner.emit(SessionEvent::Transport {
                        message: e.to_string(),
                        fatal: true,
                    });
                }
                Err(e)
            }
        }
    }

    /// Ferme la session et force l'état Idle
    ///
    /// Annule le heartbeat, le timer de reconnexion et la tâche de
    /// lecture (chacun exactement une fois), ferme le transport et
    /// jette la session courante. Idempotent.
    pub async fn disconnect(&self) {
        let mut shared = self.inner.shared.lock().await;
        shared.closing = true;

        if let Some(handle) = shared.heartbeat.take() {
            handle.abort();
        }
        if let Some(handle) = shared.reconnect.take() {
            handle.abort();
        }
        if let Some(handle) = shared.reader.take() {
            handle.abort();
        }

        if let Some(mut sink) = shared.sink.take() {
            let _ = sink.close().await;
        }

        shared.session = None;
        shared.reconnect_attempts = 0;
        self.inner.set_state(&mut shared, VoiceState::Idle);

        tracing::info!("session déconnectée");
    }

    /// Envoie un tour audio (payload base64) au backend
    ///
    /// Ne transmet que si l'état est Ready. Hors de cet état l'appel est
    /// un no-op journalisé : rien n'est écrit sur le transport et la
    /// session n'est pas affectée.
    pub async fn send_audio(&self, data: &str) -> NetworkResult<()> {
        let mut shared = self.inner.shared.lock().await;

        if !shared.state.accepts_audio() {
            tracing::warn!(etat = %shared.state, "envoi audio ignoré hors de l'état Ready");
            return Ok(());
        }

        let message = ClientMessage::Audio {
            data: data.to_string(),
        };
        let text = protocol::encode_client_message(&message)?;

        match shared.sink.as_mut() {
            Some(sink) => sink.send_text(text).await,
            None => Err(NetworkError::ConnectionClosed),
        }
    }

    /// Retourne l'état courant de la session
    pub fn state(&self) -> VoiceState {
        // Version synchrone pour éviter de bloquer
        match self.inner.shared.try_lock() {
            Ok(shared) => shared.state,
            Err(_) => VoiceState::Idle,
        }
    }

    /// Retourne un instantané de la session en cours
    ///
    /// None tant que le backend n'a pas envoyé `initialized`, et de
    /// nouveau None après la fin de la connexion.
    pub fn session(&self) -> Option<VoiceSession> {
        match self.inner.shared.try_lock() {
            Ok(shared) => shared.session.clone(),
            Err(_) => None,
        }
    }
}

impl ClientInner {
    /// Émet un événement sur le flux de l'appelant
    ///
    /// try_send : on n'attend jamais l'appelant sous le verrou de session.
    fn emit(&self, event: SessionEvent) {
        if let Err(e) = self.event_tx.try_send(event) {
            tracing::debug!("événement de session perdu: {}", e);
        }
    }

    /// Applique une transition d'état et la signale à l'appelant
    fn set_state(&self, shared: &mut SharedState, new_state: VoiceState) {
        if shared.state != new_state {
            tracing::debug!(de = %shared.state, vers = %new_state, "transition d'état");
            shared.state = new_state;
            self.emit(SessionEvent::StateChanged(new_state));
        }
    }

    /// Ouvre une connexion et installe sink, heartbeat et lecture
    ///
    /// Chemin commun du connect() explicite et des reconnexions.
    async fn open_connection(self: &Arc<Self>) -> NetworkResult<()> {
        let (mut sink, stream) = self.connector.connect(&self.config.url).await?;

        let mut shared = self.shared.lock().await;
        if shared.closing {
            // disconnect() est arrivé pendant l'ouverture : on referme
            drop(shared);
            let _ = sink.close().await;
            return Err(NetworkError::ConnectionClosed);
        }

        shared.generation += 1;
        let generation = shared.generation;

        self.set_state(&mut shared, VoiceState::Connected);

        // init part dès l'ouverture du transport
        let init = ClientMessage::Init {
            thread_id: self.config.thread_id.clone(),
            audio_format: self.config.audio_format.clone(),
        };
        let text = protocol::encode_client_message(&init)?;
        sink.send_text(text).await?;

        shared.sink = Some(sink);

        // Remplace les anciennes tâches : au plus une de chaque par client
        if let Some(handle) = shared.heartbeat.take() {
            handle.abort();
        }
        let heartbeat_inner = Arc::clone(self);
        shared.heartbeat = Some(tokio::spawn(heartbeat_inner.heartbeat_loop(generation)));

        if let Some(handle) = shared.reader.take() {
            handle.abort();
        }
        let reader_inner = Arc::clone(self);
        shared.reader = Some(tokio::spawn(reader_inner.read_loop(stream, generation)));

        Ok(())
    }

    /// Tâche de lecture : consomme la connexion message par message
    ///
    /// Les messages sont traités strictement dans l'ordre d'arrivée.
    async fn read_loop(self: Arc<Self>, mut stream: Box<dyn WireStream>, generation: u64) {
        loop {
            match stream.next_text().await {
                Some(Ok(text)) => self.handle_incoming(&text).await,
                Some(Err(e)) => {
                    tracing::warn!("connexion en panne: {}", e);
                    self.handle_connection_lost(generation).await;
                    return;
                }
                None => {
                    self.handle_connection_lost(generation).await;
                    return;
                }
            }
        }
    }

    /// Traite un message texte entrant
    async fn handle_incoming(&self, text: &str) {
        let event = match protocol::decode_server_event(text) {
            Ok(event) => event,
            Err(e) => {
                // Erreur de protocole : non fatale, le message est ignoré
                // sans toucher à l'état
                tracing::warn!(erreur = %e, brut = text, "message serveur illisible, ignoré");
                return;
            }
        };

        let mut shared = self.shared.lock().await;
        if shared.closing {
            return;
        }
        self.apply_server_event(&mut shared, event);
    }

    /// Applique un événement serveur : champs de session, retransmission,
    /// puis transition d'état
    fn apply_server_event(&self, shared: &mut SharedState, event: ServerEvent) {
        tracing::debug!(evenement = event.label(), "événement serveur");

        match &event {
            ServerEvent::Initialized { thread_id, kb_id } => {
                shared.session = Some(VoiceSession::new(thread_id.clone(), kb_id.clone()));
                // Session rétablie : budget de reconnexion neuf
                shared.reconnect_attempts = 0;
            }
            ServerEvent::SttComplete { text } => {
                if let Some(session) = shared.session.as_mut() {
                    session.transcribed_text = Some(text.clone());
                }
            }
            ServerEvent::RagComplete { text } => {
                if let Some(session) = shared.session.as_mut() {
                    session.ai_response = Some(text.clone());
                }
            }
            ServerEvent::TtsComplete { audio, format } => {
                if let Some(session) = shared.session.as_mut() {
                    session.audio_response = Some(audio.clone());
                    session.audio_format = Some(format.clone());
                }
            }
            ServerEvent::Done { duration } => {
                if let Some(session) = shared.session.as_mut() {
                    session.duration_ms = Some(*duration);
                }
            }
            ServerEvent::Error { message } => {
                tracing::warn!(%message, "erreur remontée par le backend");
                if let Some(session) = shared.session.as_mut() {
                    session.error = Some(message.clone());
                }
            }
            ServerEvent::SttStart | ServerEvent::RagStart | ServerEvent::TtsStart => {}
        }

        // L'appelant voit l'événement puis son effet sur l'état,
        // dans cet ordre
        let target = event.target_state(shared.state);
        self.emit(SessionEvent::Server(event));
        if let Some(next) = target {
            self.set_state(shared, next);
        }
    }

    /// Réagit à la perte de la connexion courante
    async fn handle_connection_lost(self: &Arc<Self>, generation: u64) {
        let mut shared = self.shared.lock().await;
        if shared.closing || shared.generation != generation {
            // Fermeture volontaire, ou connexion déjà remplacée
            return;
        }

        tracing::warn!("connexion perdue");

        shared.sink = None;
        shared.session = None; // La session meurt avec la connexion
        if let Some(handle) = shared.heartbeat.take() {
            handle.abort();
        }

        self.schedule_reconnect(&mut shared);
    }

    /// Programme la prochaine tentative de reconnexion, ou abandonne
    ///
    /// Au plus un timer de reconnexion existe à la fois. Le délai de la
    /// tentative n vaut min(base * 2^n, plafond).
    fn schedule_reconnect(self: &Arc<Self>, shared: &mut SharedState) {
        if !self.config.auto_reconnect {
            self.set_state(shared, VoiceState::Idle);
            self.emit(SessionEvent::Transport {
                message: "connexion perdue".to_string(),
                fatal: false,
            });
            return;
        }

        if shared.reconnect_attempts >= self.config.max_reconnect_attempts {
            let error = NetworkError::ReconnectExhausted {
                attempts: shared.reconnect_attempts,
            };
            tracing::error!("{}", error);
            self.set_state(shared, VoiceState::Error);
            self.emit(SessionEvent::Transport {
                message: error.to_string(),
                fatal: true,
            });
            return;
        }

        shared.reconnect_attempts += 1;
        let attempt = shared.reconnect_attempts;
        let delay = self.config.reconnect_delay(attempt);

        tracing::info!(
            tentative = attempt,
            max = self.config.max_reconnect_attempts,
            delai_ms = delay.as_millis() as u64,
            "reconnexion programmée"
        );

        self.set_state(shared, VoiceState::Connecting);
        self.emit(SessionEvent::Transport {
            message: format!(
                "connexion perdue, tentative {}/{} dans {}ms",
                attempt,
                self.config.max_reconnect_attempts,
                delay.as_millis()
            ),
            fatal: false,
        });

        if let Some(handle) = shared.reconnect.take() {
            handle.abort();
        }
        let inner = Arc::clone(self);
        shared.reconnect = Some(tokio::spawn(async move {
            sleep(delay).await;
            inner.retry_connect().await;
        }));
    }

    /// Corps du timer de reconnexion
    async fn retry_connect(self: Arc<Self>) {
        {
            let mut shared = self.shared.lock().await;
            if shared.closing {
                return;
            }
            // Ce timer est consommé ; drop du handle sans abort (c'est nous)
            shared.reconnect = None;
        }

        match self.open_connection().await {
            Ok(()) => {
                tracing::info!("reconnexion réussie");
            }
            Err(e) => {
                tracing::warn!("échec de reconnexion: {}", e);
                let mut shared = self.shared.lock().await;
                if !shared.closing {
                    self.schedule_reconnect(&mut shared);
                }
            }
        }
    }

    /// Tâche de heartbeat : un ping par intervalle tant que la connexion vit
    ///
    /// Indépendante de l'avancement du tour : un ping peut partir pendant
    /// un traitement. Hors état actif (Error notamment), le tick passe
    /// sans envoyer.
    async fn heartbeat_loop(self: Arc<Self>, generation: u64) {
        let ping = match protocol::encode_client_message(&ClientMessage::Ping) {
            Ok(text) => text,
            Err(_) => return,
        };

        loop {
            sleep(self.config.heartbeat_interval).await;

            let mut shared = self.shared.lock().await;
            if shared.closing || shared.generation != generation {
                return;
            }
            if !shared.state.is_active() {
                continue;
            }
            if let Some(sink) = shared.sink.as_mut() {
                if let Err(e) = sink.send_text(ping.clone()).await {
                    tracing::warn!("échec d'envoi du ping: {}", e);
                }
            }
        }
    }
}
