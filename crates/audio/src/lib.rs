//! Crate audio pour Vocassist - Client d'assistant vocal
//!
//! Ce crate gère toute la chaîne audio locale :
//! - Enregistrement microphone avec cpal (un tour de parole complet)
//! - Finalisation WAV avec hound
//! - Encodage base64 pour le transport JSON
//! - Lecture des réponses synthétisées avec cpal

pub mod config;      // Configuration audio
pub mod types;       // Types de données (EncodedAudio, etc.)
pub mod traits;      // Traits abstraits
pub mod capture;     // Implémentation enregistrement avec cpal
pub mod playback;    // Implémentation lecture avec cpal
pub mod codec;       // Finalisation WAV + encodage transport
pub mod error;       // Gestion d'erreurs

// Réexports pour faciliter l'utilisation
pub use config::*;
pub use types::*;
pub use traits::*;
pub use error::*;

// Réexports des implémentations principales
pub use capture::{CpalRecorder, MockRecorder};
pub use playback::{CpalPlayer, MockPlayer};

/// Tests d'intégration du crate complet
#[cfg(test)]
mod integration_tests {
    use super::*;

    #[tokio::test]
    async fn test_record_encode_decode_chain() {
        // Chaîne complète : enregistrement simulé → WAV → base64 → WAV
        let samples: Vec<Sample> = (0..320).map(|i| (i * 50) as i16).collect();
        let mut recorder = MockRecorder::new().with_samples(samples.clone());

        recorder.start_recording().await.unwrap();
        let audio = recorder.stop_recording().await.unwrap();

        let transported = codec::encode_for_transport(&audio);
        let received = codec::decode_from_transport(&transported, "audio/wav").unwrap();

        assert_eq!(received.data, audio.data);

        let (_, decoded) = codec::samples_from_wav(&received).unwrap();
        assert_eq!(decoded, samples);
    }

    #[tokio::test]
    async fn test_received_payload_plays_byte_identical() {
        // Simule la réception d'un payload tts_complete et sa lecture
        let audio = codec::wav_from_samples(&[10, -10, 20, -20], 16000, 1).unwrap();
        let payload = codec::encode_for_transport(&audio);

        let mut player = MockPlayer::new();
        let played = player.played_handle();

        let received = codec::decode_from_transport(&payload, &mime_for_format("wav")).unwrap();
        player.play(&received).await.unwrap();

        let history = played.lock().unwrap();
        assert_eq!(history[0].data, audio.data);
    }
}
