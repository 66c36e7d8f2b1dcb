//! Configuration audio pour le client Vocassist
//!
//! Ce module définit tous les paramètres audio utilisés par l'application.
//! Le backend de l'assistant attend des tours complets en WAV mono : la
//! configuration est donc plus simple que pour du streaming temps réel.

use serde::{Deserialize, Serialize};

/// Configuration principale pour tout le système audio
///
/// Cette structure contient les paramètres nécessaires pour configurer :
/// - La capture audio (microphone)
/// - La finalisation WAV des enregistrements
/// - La lecture audio (haut-parleurs)
///
/// `#[derive(Clone)]` : Permet de dupliquer facilement cette config
/// `#[derive(Debug)]` : Permet d'afficher la config pour le débogage
/// `#[derive(Serialize, Deserialize)]` : Permet de sauvegarder/charger depuis un fichier
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Fréquence d'échantillonnage cible en Hz (échantillons par seconde)
    ///
    /// 16000 Hz suffit largement pour de la reconnaissance vocale :
    /// c'est le format d'entrée classique des moteurs STT.
    pub sample_rate: u32,

    /// Nombre de canaux audio
    ///
    /// 1 = Mono (un seul canal)
    /// 2 = Stéréo (gauche + droite)
    /// Pour la voix, mono suffit largement
    pub channels: u16,
}

impl Default for AudioConfig {
    /// Configuration par défaut adaptée à l'entrée d'un moteur STT
    fn default() -> Self {
        Self {
            sample_rate: 16000, // 16 kHz - standard reconnaissance vocale
            channels: 1,        // Mono pour la voix
        }
    }
}

impl AudioConfig {
    /// Calcule la taille en bytes d'une seconde d'audio brut (PCM 16 bits)
    ///
    /// Chaque échantillon = i16 = 2 bytes
    /// Taille = sample_rate * channels * 2 bytes
    pub fn bytes_per_second(&self) -> usize {
        self.sample_rate as usize * self.channels as usize * 2
    }

    /// Estime la durée en millisecondes d'un nombre d'échantillons donné
    pub fn duration_ms(&self, sample_count: usize) -> u64 {
        let frames = sample_count / self.channels.max(1) as usize;
        (frames as u64 * 1000) / self.sample_rate.max(1) as u64
    }

    /// Valide que la configuration est cohérente
    ///
    /// Vérifie que tous les paramètres sont dans des plages acceptables
    pub fn validate(&self) -> Result<(), String> {
        if self.sample_rate < 8000 || self.sample_rate > 48000 {
            return Err(format!(
                "Sample rate invalide: {} (doit être entre 8000 et 48000)",
                self.sample_rate
            ));
        }

        if self.channels == 0 || self.channels > 2 {
            return Err(format!(
                "Nombre de canaux invalide: {} (doit être 1 ou 2)",
                self.channels
            ));
        }

        Ok(())
    }

    /// Crée une configuration haute qualité (48 kHz)
    ///
    /// Utile si le backend accepte du WAV pleine bande
    pub fn high_quality() -> Self {
        Self {
            sample_rate: 48000,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AudioConfig::default();

        // Test des calculs
        assert_eq!(config.bytes_per_second(), 32000); // 16000 * 1 * 2
        assert_eq!(config.duration_ms(16000), 1000); // 1s d'échantillons
        assert_eq!(config.duration_ms(8000), 500);

        // Test de validation
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_config() {
        let mut config = AudioConfig::default();

        config.sample_rate = 1000; // Trop bas
        assert!(config.validate().is_err());

        config.sample_rate = 16000;
        config.channels = 0; // Invalide
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_preset_configs() {
        let high_qual = AudioConfig::high_quality();
        assert_eq!(high_qual.sample_rate, 48000);
        assert!(high_qual.validate().is_ok());
    }

    #[test]
    fn test_duration_stereo() {
        let config = AudioConfig {
            sample_rate: 16000,
            channels: 2,
        };
        // 32000 échantillons entrelacés = 16000 frames = 1s
        assert_eq!(config.duration_ms(32000), 1000);
    }
}
