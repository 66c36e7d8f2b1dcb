//! Contrôleur de session vocale
//!
//! Ce module compose le transport de session et les composants audio
//! derrière une API simple : connect, enregistrer, envoyer, écouter la
//! réponse. C'est lui qui fait circuler l'audio entre le microphone,
//! le backend et les haut-parleurs.

use thiserror::Error;
use tokio::sync::mpsc;

use audio::{
    codec, mime_for_format, AudioConfig, AudioError, AudioPlayer, AudioRecorder, CpalPlayer,
    CpalRecorder,
};
use network::{
    NetworkError, ServerEvent, SessionClient, SessionConfig, SessionEvent, VoiceSession,
    VoiceState,
};

/// Erreurs du contrôleur de session vocale
///
/// Enveloppe les erreurs des deux couches composées, plus les erreurs
/// propres à l'orchestration.
#[derive(Error, Debug)]
pub enum ControllerError {
    /// Opération qui exige une session prête (état Ready)
    #[error("Session non prête (état {state})")]
    NotConnected { state: VoiceState },

    /// Erreur de la couche audio (micro, WAV, lecture)
    #[error(transparent)]
    Audio(#[from] AudioError),

    /// Erreur de la couche de session (transport, protocole)
    #[error(transparent)]
    Network(#[from] NetworkError),
}

/// Type Result personnalisé pour le contrôleur
pub type ControllerResult<T> = Result<T, ControllerError>;

/// Contrôleur de l'assistant vocal
///
/// Compose le client de session, l'enregistreur et le lecteur audio.
/// Le flux nominal d'un tour :
///
/// 1. `connect()` puis attendre `StateChanged(Ready)` via `next_event()`
/// 2. `start_recording()` - le micro est acquis
/// 3. `stop_recording()` - l'enregistrement est finalisé en WAV,
///    encodé base64 et envoyé au backend (seul chemin d'envoi audio)
/// 4. les événements du pipeline défilent ; `tts_complete` déclenche
///    automatiquement la lecture de la réponse
///
/// # Example
/// ```rust,no_run
/// use app::VoiceAssistantController;
/// use network::SessionConfig;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let mut config = SessionConfig::default();
/// config.url = "wss://backend/voice".to_string();
///
/// let mut controller = VoiceAssistantController::new(config)?;
/// controller.connect().await?;
///
/// while let Some(event) = controller.next_event().await {
///     println!("{:?}", event);
/// }
/// # Ok(())
/// # }
/// ```
pub struct VoiceAssistantController {
    /// Client de session (détient la connexion)
    transport: SessionClient,

    /// Enregistreur microphone (détient le micro pendant la capture)
    recorder: Box<dyn AudioRecorder>,

    /// Lecteur audio (ressource de lecture unique du processus)
    player: Box<dyn AudioPlayer>,

    /// Flux d'événements de session, consommé par next_event()
    events: Option<mpsc::Receiver<SessionEvent>>,
}

impl VoiceAssistantController {
    /// Crée un contrôleur avec la pile réelle (WebSocket + cpal)
    ///
    /// # Erreurs
    /// - `NetworkError::ConfigError` : Configuration de session invalide
    pub fn new(config: SessionConfig) -> ControllerResult<Self> {
        let transport = SessionClient::new(config)?;
        Ok(Self::with_components(
            transport,
            Box::new(CpalRecorder::new(AudioConfig::default())),
            Box::new(CpalPlayer::new()),
        ))
    }

    /// Crée un contrôleur à partir de composants déjà construits
    ///
    /// C'est le constructeur des tests : transport simulé, audio factice.
    pub fn with_components(
        mut transport: SessionClient,
        recorder: Box<dyn AudioRecorder>,
        player: Box<dyn AudioPlayer>,
    ) -> Self {
        let events = transport.take_events();
        Self {
            transport,
            recorder,
            player,
            events,
        }
    }

    /// Crée un contrôleur et ouvre immédiatement la connexion
    ///
    /// Variante auto-connect : équivalent de `new()` suivi de `connect()`.
    pub async fn new_connected(config: SessionConfig) -> ControllerResult<Self> {
        let controller = Self::new(config)?;
        controller.connect().await?;
        Ok(controller)
    }

    /// Ouvre la connexion vers le backend
    ///
    /// Comme pour le client de session, la future se résout à l'ouverture
    /// du transport ; la session est utilisable au `StateChanged(Ready)`.
    pub async fn connect(&self) -> ControllerResult<()> {
        self.transport.connect().await?;
        Ok(())
    }

    /// Ferme la session
    pub async fn disconnect(&self) {
        self.transport.disconnect().await;
    }

    /// Démarre l'enregistrement d'un tour de parole
    ///
    /// # Erreurs
    /// - `ControllerError::NotConnected` : La session n'est pas prête
    /// - `AudioError::AlreadyRecording` : Un enregistrement est déjà actif
    /// - `AudioError::PermissionDenied` : Accès micro refusé
    pub async fn start_recording(&mut self) -> ControllerResult<()> {
        let state = self.transport.state();
        if !state.accepts_audio() {
            return Err(ControllerError::NotConnected { state });
        }

        self.recorder.start_recording().await?;
        Ok(())
    }

    /// Finalise l'enregistrement et envoie le tour au backend
    ///
    /// C'est l'unique chemin qui produit de l'audio sortant : le WAV
    /// finalisé est encodé base64 puis transmis via la session.
    ///
    /// # Erreurs
    /// - `AudioError::NotRecording` : Aucun enregistrement actif
    pub async fn stop_recording(&mut self) -> ControllerResult<()> {
        let recorded = self.recorder.stop_recording().await?;
        let payload = codec::encode_for_transport(&recorded);

        tracing::info!(
            taille = recorded.len(),
            "tour de parole finalisé, envoi au backend"
        );

        self.transport.send_audio(&payload).await?;
        Ok(())
    }

    /// Décode et joue un payload audio du backend
    ///
    /// Une nouvelle lecture remplace la précédente : la ressource de
    /// lecture est unique.
    ///
    /// # Arguments
    /// * `data` - Payload base64
    /// * `format` - Format annoncé par le backend (ex: "wav")
    pub async fn play_audio(&mut self, data: &str, format: &str) -> ControllerResult<()> {
        let decoded = codec::decode_from_transport(data, &mime_for_format(format))?;
        self.player.play(&decoded).await?;
        Ok(())
    }

    /// Attend le prochain événement de session
    ///
    /// Les événements arrivent dans l'ordre strict du flux de session.
    /// Un `tts_complete` déclenche la lecture de la réponse avant d'être
    /// remis à l'appelant ; un échec de lecture est journalisé sans
    /// interrompre le flux.
    ///
    /// # Returns
    /// None quand la session est définitivement terminée (flux fermé).
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        let event = match self.events.as_mut() {
            Some(events) => events.recv().await?,
            None => return None,
        };

        if let SessionEvent::Server(ServerEvent::TtsComplete { audio, format }) = &event {
            let (audio, format) = (audio.clone(), format.clone());
            if let Err(e) = self.play_audio(&audio, &format).await {
                tracing::warn!("lecture de la réponse impossible: {}", e);
            }
        }

        Some(event)
    }

    /// Arrête proprement le contrôleur
    ///
    /// Déconnecte d'abord la session, puis arrête toute lecture en cours,
    /// dans cet ordre.
    pub async fn shutdown(&mut self) {
        self.transport.disconnect().await;
        if let Err(e) = self.player.stop().await {
            tracing::warn!("arrêt de la lecture: {}", e);
        }
    }

    /// État courant de la session
    pub fn state(&self) -> VoiceState {
        self.transport.state()
    }

    /// Instantané de la session en cours
    pub fn session(&self) -> Option<VoiceSession> {
        self.transport.session()
    }

    /// Vérifie si un enregistrement est actif
    pub fn is_recording(&self) -> bool {
        self.recorder.is_recording()
    }

    /// Vérifie si une lecture est active
    pub fn is_playing(&self) -> bool {
        self.player.is_playing()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use audio::{EncodedAudio, MockPlayer, MockRecorder, Sample};
    use network::SimulatedConnector;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio::time::{sleep, Instant};

    /// Contrôleur de test : transport simulé, audio factice
    fn sim_controller(
        recorder: MockRecorder,
    ) -> (
        VoiceAssistantController,
        SimulatedConnector,
        Arc<Mutex<Vec<EncodedAudio>>>,
    ) {
        let connector = SimulatedConnector::new();
        let transport =
            SessionClient::with_connector(SessionConfig::default(), connector.clone()).unwrap();

        let player = MockPlayer::new();
        let played = player.played_handle();

        let controller = VoiceAssistantController::with_components(
            transport,
            Box::new(recorder),
            Box::new(player),
        );
        (controller, connector, played)
    }

    /// Attend qu'une condition devienne vraie (temps virtuel)
    async fn wait_until(mut cond: impl FnMut() -> bool, context: &str) {
        let start = Instant::now();
        while !cond() {
            if start.elapsed() > Duration::from_secs(120) {
                panic!("condition jamais atteinte: {}", context);
            }
            sleep(Duration::from_millis(5)).await;
        }
    }

    /// Amène la session simulée à l'état Ready
    async fn bring_to_ready(controller: &VoiceAssistantController, connector: &SimulatedConnector) {
        controller.connect().await.unwrap();
        connector.push_event(&ServerEvent::Initialized {
            thread_id: "t1".to_string(),
            kb_id: "kb1".to_string(),
        });
        wait_until(|| controller.state() == VoiceState::Ready, "état Ready").await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_recording_requires_ready() {
        let (mut controller, connector, _played) = sim_controller(MockRecorder::new());

        // Sans connexion : refusé
        let result = controller.start_recording().await;
        assert!(matches!(
            result,
            Err(ControllerError::NotConnected {
                state: VoiceState::Idle
            })
        ));
        assert!(!controller.is_recording());

        // Connecté mais pas initialisé : refusé aussi
        controller.connect().await.unwrap();
        let result = controller.start_recording().await;
        assert!(matches!(result, Err(ControllerError::NotConnected { .. })));

        // Prêt : accepté
        connector.push_event(&ServerEvent::Initialized {
            thread_id: "t".to_string(),
            kb_id: "k".to_string(),
        });
        wait_until(|| controller.state() == VoiceState::Ready, "état Ready").await;

        controller.start_recording().await.unwrap();
        assert!(controller.is_recording());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_recording_sends_encoded_turn() {
        let samples: Vec<Sample> = vec![100, -100, 2000, -2000, 0, 42];
        let (mut controller, connector, _played) =
            sim_controller(MockRecorder::new().with_samples(samples.clone()));

        bring_to_ready(&controller, &connector).await;

        controller.start_recording().await.unwrap();
        controller.stop_recording().await.unwrap();
        assert!(!controller.is_recording());

        // Le message audio contient exactement le WAV du micro, en base64
        let audio_messages: Vec<serde_json::Value> = connector
            .sent_messages()
            .iter()
            .filter_map(|m| serde_json::from_str(m).ok())
            .filter(|v: &serde_json::Value| v["action"] == "audio")
            .collect();
        assert_eq!(audio_messages.len(), 1);

        let payload = audio_messages[0]["data"].as_str().unwrap();
        let received = codec::decode_from_transport(payload, "audio/wav").unwrap();
        let expected = codec::wav_from_samples(&samples, 16000, 1).unwrap();
        assert_eq!(received.data, expected.data);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_recording_without_start() {
        let (mut controller, connector, _played) = sim_controller(MockRecorder::new());
        bring_to_ready(&controller, &connector).await;

        let result = controller.stop_recording().await;
        assert!(matches!(
            result,
            Err(ControllerError::Audio(AudioError::NotRecording))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_tts_complete_triggers_playback() {
        let (mut controller, connector, played) = sim_controller(MockRecorder::new());
        bring_to_ready(&controller, &connector).await;

        // Réponse synthétisée par le "backend"
        let response = codec::wav_from_samples(&[7, -7, 14, -14], 16000, 1).unwrap();
        let payload = codec::encode_for_transport(&response);

        connector.push_event(&ServerEvent::SttStart);
        connector.push_event(&ServerEvent::TtsComplete {
            audio: payload,
            format: "wav".to_string(),
        });

        // Pompe les événements jusqu'au tts_complete
        loop {
            match controller.next_event().await {
                Some(SessionEvent::Server(ServerEvent::TtsComplete { .. })) => break,
                Some(_) => continue,
                None => panic!("flux terminé avant tts_complete"),
            }
        }

        // Le lecteur a reçu la réponse, byte à byte
        let history = played.lock().unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].data, response.data);
        assert!(controller.is_playing());
    }

    #[tokio::test(start_paused = true)]
    async fn test_corrupted_tts_payload_does_not_break_the_pump() {
        let (mut controller, connector, played) = sim_controller(MockRecorder::new());
        bring_to_ready(&controller, &connector).await;

        connector.push_event(&ServerEvent::TtsComplete {
            audio: "%%% pas du base64 %%%".to_string(),
            format: "wav".to_string(),
        });
        connector.push_event(&ServerEvent::Done { duration: 10 });

        // L'événement corrompu est remis quand même, et le flux continue
        let mut seen = Vec::new();
        loop {
            match controller.next_event().await {
                Some(SessionEvent::Server(event)) => {
                    let label = event.label().to_string();
                    let is_done = label == "done";
                    seen.push(label);
                    if is_done {
                        break;
                    }
                }
                Some(_) => {}
                None => break,
            }
        }
        assert!(seen.contains(&"tts_complete".to_string()));
        assert!(seen.contains(&"done".to_string()));

        // Rien n'a atteint le lecteur
        assert!(played.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_error_blocks_recording() {
        let (mut controller, connector, _played) = sim_controller(MockRecorder::new());
        bring_to_ready(&controller, &connector).await;

        connector.push_event(&ServerEvent::Error {
            message: "upstream failure".to_string(),
        });
        wait_until(|| controller.state() == VoiceState::Error, "état Error").await;

        let result = controller.start_recording().await;
        assert!(matches!(
            result,
            Err(ControllerError::NotConnected {
                state: VoiceState::Error
            })
        ));
        assert_eq!(
            controller.session().unwrap().error.as_deref(),
            Some("upstream failure")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_disconnects_then_halts_playback() {
        let (mut controller, connector, _played) = sim_controller(MockRecorder::new());
        bring_to_ready(&controller, &connector).await;

        // Une lecture en cours au moment du shutdown
        let clip = codec::wav_from_samples(&[1, 2, 3], 16000, 1).unwrap();
        controller
            .play_audio(&codec::encode_for_transport(&clip), "wav")
            .await
            .unwrap();
        assert!(controller.is_playing());

        controller.shutdown().await;

        assert_eq!(controller.state(), VoiceState::Idle);
        assert!(!controller.is_playing());

        // Shutdown idempotent
        controller.shutdown().await;
        assert_eq!(controller.state(), VoiceState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_permission_denied_surfaces() {
        let (mut controller, connector, _played) =
            sim_controller(MockRecorder::new().deny_permission());
        bring_to_ready(&controller, &connector).await;

        let result = controller.start_recording().await;
        assert!(matches!(
            result,
            Err(ControllerError::Audio(AudioError::PermissionDenied(_)))
        ));
    }
}
