//! Module de lecture audio utilisant cpal
//!
//! Ce module implémente le trait AudioPlayer en utilisant la librairie cpal
//! pour jouer les réponses synthétisées via les haut-parleurs ou le casque.
//!
//! La ressource de lecture est unique pour tout le processus : démarrer
//! un nouveau clip arrête d'abord le précédent. L'arrêt est explicite et
//! déterministe, on ne s'appuie jamais sur la fin "naturelle" d'un clip
//! pour libérer le périphérique.

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, Stream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;

use crate::{codec, AudioError, AudioPlayer, AudioResult, EncodedAudio};

/// Lecteur audio basé sur cpal
///
/// Cette structure gère :
/// - La découverte du périphérique de sortie (haut-parleurs)
/// - Le décodage WAV des réponses de l'assistant
/// - L'adaptation au format natif du périphérique (canaux, sample rate)
///
/// # Architecture thread
///
/// Comme pour la capture, le `Stream` cpal n'est pas `Send` : chaque
/// lecture vit sur son propre thread, qui détient le stream jusqu'à la
/// fin du clip ou jusqu'à un arrêt explicite. `play()` remplace le
/// worker précédent avant d'en créer un nouveau.
pub struct CpalPlayer {
    /// Worker de lecture actif (None si rien ne joue)
    worker: Option<PlaybackWorker>,

    /// Nom du dernier périphérique utilisé, pour debug
    device_name: String,
}

/// Lecture en cours : thread détenteur du stream + drapeau de fin
struct PlaybackWorker {
    handle: std::thread::JoinHandle<()>,
    stop_tx: std::sync::mpsc::Sender<()>,
    finished: Arc<AtomicBool>,
}

/// Résultat de l'initialisation du worker de lecture
type PlaybackSetup = AudioResult<String>;

impl CpalPlayer {
    /// Crée un nouveau lecteur
    ///
    /// Le périphérique de sortie n'est acquis qu'au premier `play()`.
    pub fn new() -> Self {
        Self {
            worker: None,
            device_name: "Périphérique inconnu".to_string(),
        }
    }

    /// Arrête et rejoint le worker courant s'il existe
    ///
    /// C'est l'unique chemin de libération du périphérique de sortie :
    /// appelé par `stop()` et par `play()` avant toute nouvelle lecture.
    async fn halt_worker(&mut self) -> AudioResult<()> {
        if let Some(worker) = self.worker.take() {
            let _ = worker.stop_tx.send(());
            let handle = worker.handle;
            tokio::task::spawn_blocking(move || {
                let _ = handle.join();
            })
            .await
            .map_err(|e| AudioError::PlaybackError(format!("join du worker: {}", e)))?;
        }
        Ok(())
    }

    /// Ramène les échantillons décodés à un signal mono f32 [-1.0, 1.0]
    ///
    /// Le callback de sortie ré-étale ensuite ce signal sur les canaux
    /// et le sample rate natifs du périphérique.
    fn mono_f32(samples: &[i16], channels: u16) -> Vec<f32> {
        let channels = channels.max(1) as usize;
        samples
            .chunks(channels)
            .map(|frame| {
                let sum: f32 = frame.iter().map(|&s| s as f32 / i16::MAX as f32).sum();
                sum / frame.len() as f32
            })
            .collect()
    }

    /// Thread dédié : construit le stream de sortie et le tient en vie
    /// jusqu'à la fin du clip ou au signal d'arrêt.
    fn run_playback(
        source: Vec<f32>,
        source_rate: u32,
        ready_tx: oneshot::Sender<PlaybackSetup>,
        stop_rx: std::sync::mpsc::Receiver<()>,
        finished: Arc<AtomicBool>,
    ) {
        let setup = Self::build_playback_stream(source, source_rate, Arc::clone(&finished));

        match setup {
            Ok((stream, name)) => {
                if let Err(e) = stream.play() {
                    let _ = ready_tx.send(Err(e.into()));
                    return;
                }

                let _ = ready_tx.send(Ok(name));

                // Attend la fin naturelle du clip ou un arrêt explicite
                loop {
                    match stop_rx.recv_timeout(std::time::Duration::from_millis(50)) {
                        Ok(()) | Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => break,
                        Err(std::sync::mpsc::RecvTimeoutError::Timeout) => {
                            if finished.load(Ordering::Relaxed) {
                                break;
                            }
                        }
                    }
                }

                drop(stream); // Libère le périphérique de sortie
                finished.store(true, Ordering::Relaxed);
            }
            Err(e) => {
                let _ = ready_tx.send(Err(e));
            }
        }
    }

    /// Construit le stream de sortie sur la config native du périphérique
    fn build_playback_stream(
        source: Vec<f32>,
        source_rate: u32,
        finished: Arc<AtomicBool>,
    ) -> AudioResult<(Stream, String)> {
        let host = cpal::default_host();

        let device = host
            .default_output_device()
            .ok_or(AudioError::NoDeviceFound)?;

        let device_name = device
            .description()
            .ok()
            .map(|desc| desc.name().to_string())
            .unwrap_or_else(|| "Périphérique inconnu".to_string());

        let default_config = device.default_output_config()?;
        let device_rate = default_config.sample_rate();
        let device_channels = default_config.channels() as usize;
        let sample_format = default_config.sample_format();

        tracing::debug!(
            periphérique = %device_name,
            device_rate,
            device_channels,
            source_rate,
            "construction du stream de lecture"
        );

        // Position de lecture dans le signal source, en pas fractionnaires :
        // un pas de source_rate/device_rate fait la conversion de fréquence
        let step = source_rate as f64 / device_rate.max(1) as f64;
        let cursor = Mutex::new(0.0f64);

        // Produit le prochain échantillon mono, ou None si le clip est fini
        let next_sample = move || -> Option<f32> {
            let mut pos = cursor.lock().ok()?;
            let index = *pos as usize;
            if index >= source.len() {
                finished.store(true, Ordering::Relaxed);
                return None;
            }
            *pos += step;
            Some(source[index])
        };

        let stream = match sample_format {
            SampleFormat::F32 => device.build_output_stream(
                &default_config.config(),
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    for frame in data.chunks_mut(device_channels) {
                        let value = next_sample().unwrap_or(0.0);
                        frame.fill(value);
                    }
                },
                move |err| {
                    tracing::warn!("erreur stream de lecture: {}", err);
                },
                None,
            )?,
            SampleFormat::I16 => device.build_output_stream(
                &default_config.config(),
                move |data: &mut [i16], _: &cpal::OutputCallbackInfo| {
                    for frame in data.chunks_mut(device_channels) {
                        let value = next_sample().unwrap_or(0.0);
                        frame.fill((value * i16::MAX as f32) as i16);
                    }
                },
                move |err| {
                    tracing::warn!("erreur stream de lecture: {}", err);
                },
                None,
            )?,
            SampleFormat::U16 => device.build_output_stream(
                &default_config.config(),
                move |data: &mut [u16], _: &cpal::OutputCallbackInfo| {
                    for frame in data.chunks_mut(device_channels) {
                        let value = next_sample().unwrap_or(0.0);
                        frame.fill(((value + 1.0) * 0.5 * u16::MAX as f32) as u16);
                    }
                },
                move |err| {
                    tracing::warn!("erreur stream de lecture: {}", err);
                },
                None,
            )?,
            other => {
                return Err(AudioError::ConfigError(format!(
                    "Format d'échantillon non supporté : {:?}",
                    other
                )));
            }
        };

        Ok((stream, device_name))
    }
}

impl Default for CpalPlayer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AudioPlayer for CpalPlayer {
    async fn play(&mut self, audio: &EncodedAudio) -> AudioResult<()> {
        // Décode avant d'arrêter le clip courant : un payload corrompu
        // ne doit pas interrompre la lecture en cours
        let (spec, samples) = codec::samples_from_wav(audio)
            .map_err(|e| AudioError::PlaybackError(format!("décodage du clip: {}", e)))?;
        let source = Self::mono_f32(&samples, spec.channels);

        // Contrat stop-avant-start : la lecture précédente est libérée
        // explicitement avant d'acquérir le périphérique pour la nouvelle
        self.halt_worker().await?;

        let finished = Arc::new(AtomicBool::new(false));
        let (ready_tx, ready_rx) = oneshot::channel();
        let (stop_tx, stop_rx) = std::sync::mpsc::channel();

        let worker_finished = Arc::clone(&finished);
        let source_rate = spec.sample_rate;
        let handle = std::thread::spawn(move || {
            Self::run_playback(source, source_rate, ready_tx, stop_rx, worker_finished);
        });

        match ready_rx.await {
            Ok(Ok(name)) => {
                tracing::info!(periphérique = %name, "lecture démarrée");
                self.device_name = name;
                self.worker = Some(PlaybackWorker {
                    handle,
                    stop_tx,
                    finished,
                });
                Ok(())
            }
            Ok(Err(e)) => {
                let _ = handle.join();
                Err(e)
            }
            Err(_) => {
                let _ = handle.join();
                Err(AudioError::PlaybackError(
                    "worker de lecture terminé sans réponse".to_string(),
                ))
            }
        }
    }

    async fn stop(&mut self) -> AudioResult<()> {
        self.halt_worker().await
    }

    fn is_playing(&self) -> bool {
        self.worker
            .as_ref()
            .map(|w| !w.finished.load(Ordering::Relaxed))
            .unwrap_or(false)
    }

    fn device_info(&self) -> String {
        self.device_name.clone()
    }
}

/// Lecteur factice pour les tests
///
/// Mémorise chaque clip joué pour que les tests du contrôleur puissent
/// vérifier que le bon payload a atteint la lecture, byte à byte.
pub struct MockPlayer {
    played: Arc<Mutex<Vec<EncodedAudio>>>,
    playing: bool,
    fail_playback: bool,
}

impl MockPlayer {
    /// Crée un lecteur factice
    pub fn new() -> Self {
        Self {
            played: Arc::new(Mutex::new(Vec::new())),
            playing: false,
            fail_playback: false,
        }
    }

    /// Simule une panne de lecture au prochain `play()`
    pub fn fail_playback(mut self) -> Self {
        self.fail_playback = true;
        self
    }

    /// Handle partagé sur l'historique des clips joués
    ///
    /// À cloner avant de céder le lecteur au contrôleur.
    pub fn played_handle(&self) -> Arc<Mutex<Vec<EncodedAudio>>> {
        Arc::clone(&self.played)
    }
}

impl Default for MockPlayer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AudioPlayer for MockPlayer {
    async fn play(&mut self, audio: &EncodedAudio) -> AudioResult<()> {
        if self.fail_playback {
            return Err(AudioError::PlaybackError("panne simulée".to_string()));
        }
        if let Ok(mut played) = self.played.lock() {
            played.push(audio.clone());
        }
        self.playing = true;
        Ok(())
    }

    async fn stop(&mut self) -> AudioResult<()> {
        self.playing = false;
        Ok(())
    }

    fn is_playing(&self) -> bool {
        self.playing
    }

    fn device_info(&self) -> String {
        "Haut-parleur simulé".to_string()
    }
}
