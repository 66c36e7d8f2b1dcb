//! Protocole filaire de la session vocale
//!
//! Ce module définit les messages JSON échangés avec le backend vocal :
//! - ClientMessage : messages sortants, discriminés par le champ `action`
//! - ServerEvent : événements entrants, discriminés par le champ `event`
//!
//! Les formes exactes sur le fil sont contractuelles ; les tests de ce
//! module vérifient chaque message champ par champ.

use serde::{Deserialize, Serialize};

use crate::{NetworkResult, VoiceState};

/// Message sortant vers le backend vocal
///
/// Sérialisé en JSON avec un tag interne `action` :
/// ```json
/// { "action": "init", "thread_id": "...", "audio_format": "wav" }
/// { "action": "audio", "data": "<base64>" }
/// { "action": "ping" }
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Ouvre (ou reprend) une conversation côté backend
    Init {
        thread_id: String,
        audio_format: String,
    },

    /// Un tour de parole complet, audio encodé base64
    Audio { data: String },

    /// Keep-alive périodique
    Ping,
}

/// Événement entrant du backend vocal
///
/// Désérialisé depuis du JSON avec un tag interne `event`. Chaque étape
/// du pipeline STT → RAG → TTS annonce son début et sa fin ; `done`
/// clôt le tour avec sa durée totale.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Session établie ; identifiants attribués par le backend
    Initialized { thread_id: String, kb_id: String },

    /// La transcription du tour commence
    SttStart,

    /// Transcription terminée
    SttComplete { text: String },

    /// La génération de réponse commence
    RagStart,

    /// Réponse textuelle générée
    RagComplete { text: String },

    /// La synthèse vocale commence
    TtsStart,

    /// Audio synthétisé, encodé base64
    TtsComplete { audio: String, format: String },

    /// Tour terminé ; durée totale en millisecondes
    Done { duration: u64 },

    /// Erreur fatale côté backend
    Error { message: String },
}

impl ServerEvent {
    /// Nom court de l'événement, pour les logs
    pub fn label(&self) -> &'static str {
        match self {
            ServerEvent::Initialized { .. } => "initialized",
            ServerEvent::SttStart => "stt_start",
            ServerEvent::SttComplete { .. } => "stt_complete",
            ServerEvent::RagStart => "rag_start",
            ServerEvent::RagComplete { .. } => "rag_complete",
            ServerEvent::TtsStart => "tts_start",
            ServerEvent::TtsComplete { .. } => "tts_complete",
            ServerEvent::Done { .. } => "done",
            ServerEvent::Error { .. } => "error",
        }
    }

    /// État cible de la machine à états pour cet événement
    ///
    /// Retourne None si l'événement ne provoque pas de transition depuis
    /// l'état courant. C'est la table de transitions de la session :
    /// les événements de début d'étape mènent à Processing, `tts_complete`
    /// à Speaking (depuis Processing uniquement), `done` ramène à Ready,
    /// `error` mène à Error depuis n'importe où.
    pub fn target_state(&self, current: VoiceState) -> Option<VoiceState> {
        match self {
            ServerEvent::Initialized { .. } => {
                (current == VoiceState::Connected).then_some(VoiceState::Ready)
            }
            ServerEvent::SttStart | ServerEvent::RagStart | ServerEvent::TtsStart => {
                matches!(current, VoiceState::Ready | VoiceState::Processing)
                    .then_some(VoiceState::Processing)
            }
            ServerEvent::TtsComplete { .. } => {
                (current == VoiceState::Processing).then_some(VoiceState::Speaking)
            }
            ServerEvent::Done { .. } => matches!(
                current,
                VoiceState::Ready | VoiceState::Processing | VoiceState::Speaking
            )
            .then_some(VoiceState::Ready),
            ServerEvent::Error { .. } => Some(VoiceState::Error),
            ServerEvent::SttComplete { .. } | ServerEvent::RagComplete { .. } => None,
        }
    }
}

/// Sérialise un message client vers sa forme filaire JSON
pub fn encode_client_message(message: &ClientMessage) -> NetworkResult<String> {
    Ok(serde_json::to_string(message)?)
}

/// Désérialise un événement serveur depuis sa forme filaire JSON
///
/// # Erreurs
/// - `NetworkError::ParseError` : JSON invalide ou événement inconnu
pub fn decode_server_event(text: &str) -> NetworkResult<ServerEvent> {
    Ok(serde_json::from_str(text)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_init_wire_shape() {
        let message = ClientMessage::Init {
            thread_id: "thread-42".to_string(),
            audio_format: "wav".to_string(),
        };

        let encoded = encode_client_message(&message).unwrap();
        let value: serde_json::Value = serde_json::from_str(&encoded).unwrap();

        assert_eq!(
            value,
            json!({ "action": "init", "thread_id": "thread-42", "audio_format": "wav" })
        );
    }

    #[test]
    fn test_audio_wire_shape() {
        let message = ClientMessage::Audio {
            data: "UklGRg==".to_string(),
        };

        let encoded = encode_client_message(&message).unwrap();
        let value: serde_json::Value = serde_json::from_str(&encoded).unwrap();

        assert_eq!(value, json!({ "action": "audio", "data": "UklGRg==" }));
    }

    #[test]
    fn test_ping_wire_shape() {
        let encoded = encode_client_message(&ClientMessage::Ping).unwrap();
        let value: serde_json::Value = serde_json::from_str(&encoded).unwrap();

        assert_eq!(value, json!({ "action": "ping" }));
    }

    #[test]
    fn test_server_events_parse() {
        let cases = [
            (
                r#"{ "event": "initialized", "thread_id": "t1", "kb_id": "kb1" }"#,
                ServerEvent::Initialized {
                    thread_id: "t1".to_string(),
                    kb_id: "kb1".to_string(),
                },
            ),
            (r#"{ "event": "stt_start" }"#, ServerEvent::SttStart),
            (
                r#"{ "event": "stt_complete", "text": "bonjour" }"#,
                ServerEvent::SttComplete {
                    text: "bonjour".to_string(),
                },
            ),
            (r#"{ "event": "rag_start" }"#, ServerEvent::RagStart),
            (
                r#"{ "event": "rag_complete", "text": "réponse" }"#,
                ServerEvent::RagComplete {
                    text: "réponse".to_string(),
                },
            ),
            (r#"{ "event": "tts_start" }"#, ServerEvent::TtsStart),
            (
                r#"{ "event": "tts_complete", "audio": "AAAA", "format": "wav" }"#,
                ServerEvent::TtsComplete {
                    audio: "AAAA".to_string(),
                    format: "wav".to_string(),
                },
            ),
            (
                r#"{ "event": "done", "duration": 1530 }"#,
                ServerEvent::Done { duration: 1530 },
            ),
            (
                r#"{ "event": "error", "message": "upstream failure" }"#,
                ServerEvent::Error {
                    message: "upstream failure".to_string(),
                },
            ),
        ];

        for (wire, expected) in cases {
            let parsed = decode_server_event(wire).unwrap();
            assert_eq!(parsed, expected, "parsing de {}", wire);
        }
    }

    #[test]
    fn test_malformed_events_rejected() {
        assert!(decode_server_event("pas du json").is_err());
        assert!(decode_server_event(r#"{ "event": "inconnu" }"#).is_err());
        assert!(decode_server_event(r#"{ "pas_de_tag": true }"#).is_err());
        // Champ obligatoire manquant
        assert!(decode_server_event(r#"{ "event": "stt_complete" }"#).is_err());
    }

    #[test]
    fn test_target_state_transitions() {
        use VoiceState::*;

        let initialized = ServerEvent::Initialized {
            thread_id: "t".to_string(),
            kb_id: "k".to_string(),
        };
        assert_eq!(initialized.target_state(Connected), Some(Ready));
        assert_eq!(initialized.target_state(Ready), None);

        assert_eq!(ServerEvent::SttStart.target_state(Ready), Some(Processing));
        assert_eq!(ServerEvent::RagStart.target_state(Processing), Some(Processing));
        assert_eq!(ServerEvent::TtsStart.target_state(Idle), None);

        let tts = ServerEvent::TtsComplete {
            audio: String::new(),
            format: "wav".to_string(),
        };
        // Speaking inaccessible sans passer par Processing
        assert_eq!(tts.target_state(Processing), Some(Speaking));
        assert_eq!(tts.target_state(Ready), None);
        assert_eq!(tts.target_state(Connected), None);

        let done = ServerEvent::Done { duration: 10 };
        assert_eq!(done.target_state(Speaking), Some(Ready));
        assert_eq!(done.target_state(Processing), Some(Ready));
        assert_eq!(done.target_state(Idle), None);

        let error = ServerEvent::Error {
            message: "x".to_string(),
        };
        assert_eq!(error.target_state(Idle), Some(Error));
        assert_eq!(error.target_state(Speaking), Some(Error));
    }

    #[test]
    fn test_labels() {
        assert_eq!(ServerEvent::SttStart.label(), "stt_start");
        assert_eq!(
            ServerEvent::Done { duration: 1 }.label(),
            "done"
        );
    }
}
