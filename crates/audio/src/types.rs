//! Types de données pour le système audio
//!
//! Ce module définit les structures principales pour manipuler l'audio :
//! - EncodedAudio : Objet audio finalisé (conteneur WAV complet)
//! - Sample : Type pour un échantillon audio capturé

use serde::{Deserialize, Serialize};

/// Type pour un échantillon audio capturé
///
/// Un échantillon représente l'amplitude du son à un instant donné.
/// On travaille en PCM 16 bits signé, le format natif du conteneur WAV :
/// - 0 = silence
/// - i16::MAX = amplitude maximale positive
/// - i16::MIN = amplitude maximale négative
pub type Sample = i16;

/// Objet audio finalisé, prêt pour le transport ou la lecture
///
/// Contrairement à une frame de streaming, un EncodedAudio est un fichier
/// complet : un tour entier de parole encapsulé dans un conteneur WAV.
/// C'est l'unité échangée avec le backend de l'assistant (dans les deux sens).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedAudio {
    /// Les bytes du conteneur audio complet (header WAV + données PCM)
    pub data: Vec<u8>,

    /// Type MIME du conteneur (ex: "audio/wav")
    ///
    /// Conservé avec les données pour que la lecture sache
    /// comment interpréter le payload sans le re-deviner.
    pub mime_type: String,
}

impl EncodedAudio {
    /// Crée un nouvel objet audio encodé
    ///
    /// # Arguments
    /// * `data` - Bytes du conteneur complet
    /// * `mime_type` - Type MIME associé
    ///
    /// # Example
    /// ```rust
    /// use audio::EncodedAudio;
    ///
    /// let audio = EncodedAudio::new(vec![0x52, 0x49, 0x46, 0x46], "audio/wav");
    /// assert_eq!(audio.len(), 4);
    /// ```
    pub fn new(data: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            data,
            mime_type: mime_type.into(),
        }
    }

    /// Taille du conteneur en bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Vérifie si l'objet est vide (aucune donnée)
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Vérifie si les données commencent par un header RIFF/WAVE valide
    ///
    /// Contrôle rapide avant de tenter un vrai décodage.
    pub fn looks_like_wav(&self) -> bool {
        self.data.len() >= 12 && &self.data[0..4] == b"RIFF" && &self.data[8..12] == b"WAVE"
    }
}

/// Retourne le type MIME correspondant à un format annoncé par le backend
///
/// Le backend annonce ses payloads avec un format court ("wav") ;
/// la lecture locale travaille avec des types MIME.
pub fn mime_for_format(format: &str) -> String {
    match format.to_ascii_lowercase().as_str() {
        "wav" | "wave" => "audio/wav".to_string(),
        "mp3" => "audio/mpeg".to_string(),
        "ogg" => "audio/ogg".to_string(),
        other => format!("audio/{}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoded_audio_creation() {
        let audio = EncodedAudio::new(vec![1, 2, 3, 4], "audio/wav");

        assert_eq!(audio.len(), 4);
        assert!(!audio.is_empty());
        assert_eq!(audio.mime_type, "audio/wav");
    }

    #[test]
    fn test_empty_audio() {
        let audio = EncodedAudio::new(vec![], "audio/wav");
        assert!(audio.is_empty());
        assert!(!audio.looks_like_wav());
    }

    #[test]
    fn test_wav_header_detection() {
        // Header RIFF/WAVE minimal
        let mut data = Vec::new();
        data.extend_from_slice(b"RIFF");
        data.extend_from_slice(&[0, 0, 0, 0]);
        data.extend_from_slice(b"WAVE");

        let audio = EncodedAudio::new(data, "audio/wav");
        assert!(audio.looks_like_wav());

        let not_wav = EncodedAudio::new(vec![0xFF; 16], "audio/wav");
        assert!(!not_wav.looks_like_wav());
    }

    #[test]
    fn test_mime_for_format() {
        assert_eq!(mime_for_format("wav"), "audio/wav");
        assert_eq!(mime_for_format("WAV"), "audio/wav");
        assert_eq!(mime_for_format("mp3"), "audio/mpeg");
        assert_eq!(mime_for_format("flac"), "audio/flac");
    }
}
