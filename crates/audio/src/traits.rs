//! Traits abstraits pour le système audio
//!
//! Ce module définit les interfaces (traits) que doivent implémenter
//! tous les composants audio. Cela permet d'avoir du code modulaire
//! et testable avec différentes implémentations.

use async_trait::async_trait;
use crate::{AudioResult, EncodedAudio};

/// Trait pour enregistrer l'audio depuis un périphérique d'entrée
///
/// Ce trait abstrait permet d'utiliser différentes implémentations :
/// - CpalRecorder : Implémentation avec la librairie cpal
/// - MockRecorder : Implémentation factice pour les tests
///
/// `#[async_trait]` permet d'avoir des fonctions async dans les traits.
/// `Send` indique que l'objet peut être transféré entre threads.
///
/// # Cycle de vie
///
/// Un recorder tient au plus un enregistrement actif à la fois :
/// `start_recording()` pendant un enregistrement est rejeté avec
/// `AudioError::AlreadyRecording`, et `stop_recording()` sans
/// enregistrement actif avec `AudioError::NotRecording`.
#[async_trait]
pub trait AudioRecorder: Send {
    /// Démarre l'enregistrement audio
    ///
    /// Cette fonction acquiert le microphone et commence à accumuler
    /// les échantillons. Le périphérique reste détenu jusqu'à l'arrêt.
    ///
    /// # Erreurs
    /// - `AudioError::PermissionDenied` : Accès au microphone refusé
    /// - `AudioError::AlreadyRecording` : Un enregistrement est déjà actif
    /// - `AudioError::NoDeviceFound` : Aucun microphone trouvé
    /// - `AudioError::ConfigError` : Problème de configuration
    async fn start_recording(&mut self) -> AudioResult<()>;

    /// Arrête l'enregistrement et finalise le buffer
    ///
    /// Les échantillons accumulés sont encapsulés dans un conteneur WAV
    /// complet et le microphone est libéré.
    ///
    /// # Erreurs
    /// - `AudioError::NotRecording` : Aucun enregistrement actif
    /// - `AudioError::WavError` : Échec de la finalisation WAV
    async fn stop_recording(&mut self) -> AudioResult<EncodedAudio>;

    /// Vérifie si un enregistrement est actif
    ///
    /// Retourne `true` entre `start_recording()` et `stop_recording()`.
    fn is_recording(&self) -> bool;

    /// Retourne des informations sur le périphérique utilisé
    ///
    /// Utile pour l'interface utilisateur ou le debug.
    fn device_info(&self) -> String {
        "Périphérique inconnu".to_string()
    }
}

/// Trait pour jouer un objet audio sur un périphérique de sortie
///
/// La ressource de lecture est unique : démarrer une nouvelle lecture
/// arrête d'abord explicitement la précédente. Un clip interrompu libère
/// ainsi son périphérique de façon déterministe au lieu d'attendre une
/// fin de lecture qui pourrait ne jamais arriver.
#[async_trait]
pub trait AudioPlayer: Send {
    /// Joue un objet audio complet
    ///
    /// Si une lecture est déjà en cours, elle est arrêtée avant que la
    /// nouvelle ne démarre (contrat stop-avant-start).
    ///
    /// # Arguments
    /// * `audio` - L'objet audio à jouer (conteneur WAV)
    ///
    /// # Erreurs
    /// - `AudioError::PlaybackError` : Décodage impossible ou périphérique en panne
    /// - `AudioError::NoDeviceFound` : Aucun haut-parleur trouvé
    async fn play(&mut self, audio: &EncodedAudio) -> AudioResult<()>;

    /// Arrête la lecture en cours
    ///
    /// Sans effet si rien n'est en cours de lecture (idempotent).
    async fn stop(&mut self) -> AudioResult<()>;

    /// Vérifie si une lecture est active
    fn is_playing(&self) -> bool;

    /// Retourne des informations sur le périphérique utilisé
    fn device_info(&self) -> String {
        "Périphérique inconnu".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AudioError, MockPlayer, MockRecorder};

    // Vérifie que les traits sont utilisables en objets dynamiques,
    // comme les consomme le contrôleur.

    #[tokio::test]
    async fn test_recorder_as_trait_object() {
        let mut recorder: Box<dyn AudioRecorder> = Box::new(MockRecorder::new());

        assert!(!recorder.is_recording());
        recorder.start_recording().await.unwrap();
        assert!(recorder.is_recording());

        let audio = recorder.stop_recording().await.unwrap();
        assert!(!recorder.is_recording());
        assert!(audio.looks_like_wav());
    }

    #[tokio::test]
    async fn test_player_as_trait_object() {
        let mut player: Box<dyn AudioPlayer> = Box::new(MockPlayer::new());
        assert!(!player.is_playing());
        // stop sans lecture en cours : idempotent
        player.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_double_start_rejected() {
        let mut recorder = MockRecorder::new();
        recorder.start_recording().await.unwrap();

        let result = recorder.start_recording().await;
        assert!(matches!(result, Err(AudioError::AlreadyRecording)));
    }
}
