//! Gestion d'erreurs pour le système audio
//!
//! Ce module définit tous les types d'erreurs possibles dans notre système audio.
//! En Rust, nous utilisons le type Result<T, E> pour gérer les erreurs de façon explicite.

use thiserror::Error;

/// Énumération de toutes les erreurs possibles dans le système audio
///
/// `thiserror::Error` génère automatiquement l'implémentation du trait Error
/// et nous permet de définir des messages d'erreur avec `#[error("...")]`
#[derive(Error, Debug)]
pub enum AudioError {
    /// Aucun périphérique audio (microphone ou haut-parleurs) n'a été trouvé
    #[error("Aucun périphérique audio trouvé")]
    NoDeviceFound,

    /// L'accès au microphone a été refusé (permission système ou périphérique occupé)
    #[error("Accès au microphone refusé: {0}")]
    PermissionDenied(String),

    /// Un enregistrement est déjà en cours sur ce périphérique
    #[error("Enregistrement déjà en cours")]
    AlreadyRecording,

    /// Aucun enregistrement actif à finaliser
    #[error("Aucun enregistrement en cours")]
    NotRecording,

    /// Erreur lors de la configuration des paramètres audio (sample rate, etc.)
    #[error("Erreur de configuration audio: {0}")]
    ConfigError(String),

    /// Erreur provenant de la librairie cpal (Cross-Platform Audio Library)
    /// `#[from]` génère automatiquement une conversion depuis l'erreur cpal
    #[error("Erreur cpal: {0}")]
    CpalError(#[from] cpal::PlayStreamError),

    /// Erreur lors de l'écriture ou de la lecture du conteneur WAV
    #[error("Erreur WAV: {0}")]
    WavError(String),

    /// Les données base64 reçues ne peuvent pas être décodées
    #[error("Erreur de décodage base64: {0}")]
    DecodeError(String),

    /// Erreur lors de la lecture audio (décodage ou périphérique de sortie)
    #[error("Erreur de lecture audio: {0}")]
    PlaybackError(String),

    /// Le périphérique audio a été débranché pendant l'utilisation
    #[error("Périphérique audio déconnecté")]
    DeviceDisconnected,

    /// Erreur lors de l'initialisation d'un composant
    #[error("Erreur d'initialisation: {0}")]
    InitializationError(String),
}

/// Conversion automatique des erreurs hound vers AudioError
///
/// Cela nous permet d'utiliser l'opérateur `?` avec les fonctions WAV
impl From<hound::Error> for AudioError {
    fn from(err: hound::Error) -> Self {
        AudioError::WavError(err.to_string())
    }
}

/// Conversion des erreurs de décodage base64
impl From<base64::DecodeError> for AudioError {
    fn from(err: base64::DecodeError) -> Self {
        AudioError::DecodeError(err.to_string())
    }
}

/// Conversion des erreurs cpal::BuildStreamError
///
/// `DeviceNotAvailable` est traité comme un refus d'accès : c'est ce que
/// remontent les OS quand la permission micro est bloquée.
impl From<cpal::BuildStreamError> for AudioError {
    fn from(err: cpal::BuildStreamError) -> Self {
        match err {
            cpal::BuildStreamError::DeviceNotAvailable => {
                AudioError::PermissionDenied("périphérique indisponible".to_string())
            }
            other => AudioError::ConfigError(format!("Erreur construction stream: {:?}", other)),
        }
    }
}

/// Conversion des erreurs cpal::DefaultStreamConfigError
impl From<cpal::DefaultStreamConfigError> for AudioError {
    fn from(err: cpal::DefaultStreamConfigError) -> Self {
        AudioError::ConfigError(format!("Erreur config par défaut: {:?}", err))
    }
}

/// Type Result personnalisé pour notre crate
///
/// Au lieu d'écrire Result<T, AudioError> partout, on peut écrire AudioResult<T>
pub type AudioResult<T> = Result<T, AudioError>;

impl AudioError {
    /// Vérifie si l'erreur vient d'un problème de permission/périphérique
    ///
    /// Utile pour l'UI : ces erreurs se résolvent côté utilisateur,
    /// pas en réessayant automatiquement.
    pub fn is_device_error(&self) -> bool {
        matches!(
            self,
            AudioError::NoDeviceFound
                | AudioError::PermissionDenied(_)
                | AudioError::DeviceDisconnected
        )
    }
}
