//! Encodage des objets audio pour le transport et la lecture
//!
//! Ce module couvre les deux conversions dont le client a besoin :
//! - Finalisation WAV : échantillons PCM bruts ↔ conteneur WAV complet (hound)
//! - Encodage transport : conteneur WAV ↔ chaîne base64 embarquable dans du JSON
//!
//! Le contrat central est l'aller-retour sans perte :
//! `decode_from_transport(encode_for_transport(x), mime) == x` byte à byte.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use std::io::Cursor;

use crate::{AudioConfig, AudioError, AudioResult, EncodedAudio, Sample};

/// Encode un objet audio en chaîne base64 pour le transport
///
/// Le résultat peut être embarqué tel quel dans un message JSON
/// (champ `data` du message `audio` du protocole).
///
/// # Example
/// ```rust
/// use audio::{codec, EncodedAudio};
///
/// let audio = EncodedAudio::new(vec![1, 2, 3], "audio/wav");
/// let encoded = codec::encode_for_transport(&audio);
/// let decoded = codec::decode_from_transport(&encoded, "audio/wav").unwrap();
/// assert_eq!(decoded, audio);
/// ```
pub fn encode_for_transport(audio: &EncodedAudio) -> String {
    BASE64.encode(&audio.data)
}

/// Décode une chaîne base64 reçue du backend en objet audio
///
/// Opération inverse de `encode_for_transport`, utilisée pour la lecture
/// des réponses synthétisées.
///
/// # Arguments
/// * `data` - Chaîne base64 (les espaces périphériques sont tolérés)
/// * `mime_type` - Type MIME à associer à l'objet décodé
///
/// # Erreurs
/// - `AudioError::DecodeError` : La chaîne n'est pas du base64 valide
pub fn decode_from_transport(data: &str, mime_type: &str) -> AudioResult<EncodedAudio> {
    let bytes = BASE64.decode(data.trim())?;
    Ok(EncodedAudio::new(bytes, mime_type))
}

/// Finalise des échantillons PCM en conteneur WAV complet
///
/// Produit un fichier WAV 16 bits en mémoire, prêt à être transporté.
///
/// # Arguments
/// * `samples` - Échantillons PCM (entrelacés si plusieurs canaux)
/// * `sample_rate` - Fréquence d'échantillonnage en Hz
/// * `channels` - Nombre de canaux
pub fn wav_from_samples(samples: &[Sample], sample_rate: u32, channels: u16) -> AudioResult<EncodedAudio> {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)?;
        for &sample in samples {
            writer.write_sample(sample)?;
        }
        writer.finalize()?;
    }

    Ok(EncodedAudio::new(cursor.into_inner(), "audio/wav"))
}

/// Extrait les échantillons PCM d'un conteneur WAV
///
/// Accepte le PCM 16 bits natif ainsi que le flottant 32 bits
/// (converti vers i16), les deux formats produits par les moteurs TTS
/// courants.
///
/// # Returns
/// Les paramètres du fichier et les échantillons en i16
///
/// # Erreurs
/// - `AudioError::WavError` : Header invalide ou format non supporté
pub fn samples_from_wav(audio: &EncodedAudio) -> AudioResult<(hound::WavSpec, Vec<Sample>)> {
    let mut reader = hound::WavReader::new(Cursor::new(&audio.data))?;
    let spec = reader.spec();

    let samples = match (spec.sample_format, spec.bits_per_sample) {
        (hound::SampleFormat::Int, 16) => {
            reader.samples::<i16>().collect::<Result<Vec<_>, _>>()?
        }
        (hound::SampleFormat::Float, 32) => reader
            .samples::<f32>()
            .map(|s| s.map(|v| (v.clamp(-1.0, 1.0) * i16::MAX as f32) as i16))
            .collect::<Result<Vec<_>, _>>()?,
        (format, bits) => {
            return Err(AudioError::WavError(format!(
                "Format WAV non supporté: {:?} {} bits",
                format, bits
            )));
        }
    };

    Ok((spec, samples))
}

/// Estime la durée en millisecondes d'un conteneur WAV
///
/// Retourne None si le conteneur n'est pas décodable.
pub fn wav_duration_ms(audio: &EncodedAudio) -> Option<u64> {
    let reader = hound::WavReader::new(Cursor::new(&audio.data)).ok()?;
    let spec = reader.spec();
    let config = AudioConfig {
        sample_rate: spec.sample_rate,
        channels: spec.channels,
    };
    Some(config.duration_ms(reader.len() as usize))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Génère une courte sinusoïde 440 Hz pour les tests
    fn sine_samples(count: usize, sample_rate: u32) -> Vec<Sample> {
        (0..count)
            .map(|i| {
                let t = i as f32 / sample_rate as f32;
                ((2.0 * std::f32::consts::PI * 440.0 * t).sin() * 0.5 * i16::MAX as f32) as i16
            })
            .collect()
    }

    #[test]
    fn test_transport_round_trip_byte_identical() {
        let samples = sine_samples(1600, 16000);
        let audio = wav_from_samples(&samples, 16000, 1).unwrap();

        let encoded = encode_for_transport(&audio);
        let decoded = decode_from_transport(&encoded, "audio/wav").unwrap();

        // Le contrat : reconstruction byte à byte
        assert_eq!(decoded.data, audio.data);
        assert_eq!(decoded, audio);
    }

    #[test]
    fn test_transport_tolerates_whitespace() {
        let audio = EncodedAudio::new(vec![10, 20, 30], "audio/wav");
        let encoded = format!("  {}\n", encode_for_transport(&audio));

        let decoded = decode_from_transport(&encoded, "audio/wav").unwrap();
        assert_eq!(decoded.data, audio.data);
    }

    #[test]
    fn test_invalid_base64_rejected() {
        let result = decode_from_transport("pas du base64 !!!", "audio/wav");
        assert!(matches!(result, Err(AudioError::DecodeError(_))));
    }

    #[test]
    fn test_wav_finalization() {
        let samples = sine_samples(800, 16000);
        let audio = wav_from_samples(&samples, 16000, 1).unwrap();

        assert!(audio.looks_like_wav());
        assert_eq!(audio.mime_type, "audio/wav");

        // Relecture : mêmes paramètres, mêmes échantillons
        let (spec, decoded) = samples_from_wav(&audio).unwrap();
        assert_eq!(spec.sample_rate, 16000);
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.bits_per_sample, 16);
        assert_eq!(decoded, samples);
    }

    #[test]
    fn test_empty_recording_is_valid_wav() {
        // Un stop immédiat après start produit un WAV vide mais valide
        let audio = wav_from_samples(&[], 16000, 1).unwrap();
        assert!(audio.looks_like_wav());

        let (_, samples) = samples_from_wav(&audio).unwrap();
        assert!(samples.is_empty());
    }

    #[test]
    fn test_invalid_wav_rejected() {
        let garbage = EncodedAudio::new(vec![0xAB; 64], "audio/wav");
        assert!(matches!(
            samples_from_wav(&garbage),
            Err(AudioError::WavError(_))
        ));
    }

    #[test]
    fn test_wav_duration() {
        let samples = sine_samples(16000, 16000); // exactement 1 seconde
        let audio = wav_from_samples(&samples, 16000, 1).unwrap();

        assert_eq!(wav_duration_ms(&audio), Some(1000));

        let garbage = EncodedAudio::new(vec![1, 2, 3], "audio/wav");
        assert_eq!(wav_duration_ms(&garbage), None);
    }
}
