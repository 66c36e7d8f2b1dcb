//! Module d'enregistrement audio utilisant cpal
//!
//! Ce module implémente le trait AudioRecorder en utilisant la librairie cpal
//! (Cross-Platform Audio Library) pour capturer l'audio depuis le microphone.
//!
//! cpal est la librairie standard en Rust pour l'audio cross-platform.
//! Elle supporte Windows (WASAPI), macOS (CoreAudio), et Linux (ALSA/PulseAudio).

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, Stream};
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;

use crate::{codec, AudioConfig, AudioError, AudioRecorder, AudioResult, EncodedAudio, Sample};

/// Enregistreur microphone basé sur cpal
///
/// Cette structure gère :
/// - La découverte du périphérique de capture (microphone)
/// - L'accumulation des échantillons pendant l'enregistrement
/// - La finalisation du buffer en conteneur WAV complet
///
/// # Architecture thread
///
/// Le `Stream` cpal n'est pas `Send` : il est donc détenu par un thread
/// dédié, créé à `start_recording()` et terminé à `stop_recording()`.
/// Le callback audio (thread temps réel cpal) pousse les échantillons
/// convertis dans un buffer partagé ; le thread dédié ne fait que tenir
/// le stream en vie jusqu'au signal d'arrêt.
pub struct CpalRecorder {
    /// Configuration audio cible de l'application
    config: AudioConfig,

    /// Worker actif (None entre deux enregistrements)
    worker: Option<CaptureWorker>,

    /// Nom du dernier périphérique utilisé, pour debug
    device_name: String,
}

/// État d'un enregistrement en cours : le thread qui détient le stream
/// et le buffer partagé avec le callback.
struct CaptureWorker {
    handle: std::thread::JoinHandle<()>,
    stop_tx: std::sync::mpsc::Sender<()>,
    samples: Arc<Mutex<Vec<Sample>>>,
    sample_rate: u32,
    channels: u16,
}

/// Résultat de l'initialisation du worker, renvoyé au thread appelant
type CaptureSetup = AudioResult<(String, u32, u16)>;

impl CpalRecorder {
    /// Crée un nouvel enregistreur
    ///
    /// Le périphérique n'est acquis qu'à `start_recording()` : c'est là
    /// que l'OS demande la permission micro, pas à la construction.
    pub fn new(config: AudioConfig) -> Self {
        Self {
            config,
            worker: None,
            device_name: "Périphérique inconnu".to_string(),
        }
    }

    /// Thread dédié : acquiert le périphérique, construit le stream,
    /// puis bloque jusqu'au signal d'arrêt.
    fn run_capture(
        samples: Arc<Mutex<Vec<Sample>>>,
        ready_tx: oneshot::Sender<CaptureSetup>,
        stop_rx: std::sync::mpsc::Receiver<()>,
    ) {
        let setup = Self::build_capture_stream(samples);

        match setup {
            Ok((stream, name, rate, channels)) => {
                if let Err(e) = stream.play() {
                    let _ = ready_tx.send(Err(e.into()));
                    return;
                }

                let _ = ready_tx.send(Ok((name, rate, channels)));

                // Bloque jusqu'au stop (ou jusqu'au drop du sender)
                let _ = stop_rx.recv();
                drop(stream); // Libère le microphone
            }
            Err(e) => {
                let _ = ready_tx.send(Err(e));
            }
        }
    }

    /// Découvre le périphérique d'entrée et construit le stream de capture
    ///
    /// On accepte la configuration native du périphérique et on mémorise
    /// ses vrais paramètres pour le header WAV, plutôt que de forcer la
    /// config cible et risquer un refus du driver.
    fn build_capture_stream(
        samples: Arc<Mutex<Vec<Sample>>>,
    ) -> AudioResult<(Stream, String, u32, u16)> {
        // Obtient l'host audio par défaut du système
        let host = cpal::default_host();

        // Trouve le périphérique d'entrée par défaut
        let device = host.default_input_device().ok_or(AudioError::NoDeviceFound)?;

        // Récupère la description du périphérique pour debug
        let device_name = device
            .description()
            .ok()
            .map(|desc| desc.name().to_string())
            .unwrap_or_else(|| "Périphérique inconnu".to_string());

        let default_config = device.default_input_config()?;
        let sample_rate = default_config.sample_rate();
        let channels = default_config.channels();
        let sample_format = default_config.sample_format();

        tracing::debug!(
            periphérique = %device_name,
            sample_rate,
            channels,
            format = ?sample_format,
            "construction du stream de capture"
        );

        // Construit le stream selon le format d'échantillons du périphérique
        let stream = match sample_format {
            SampleFormat::F32 => {
                let samples = Arc::clone(&samples);
                device.build_input_stream(
                    &default_config.config(),
                    move |data: &[f32], _: &cpal::InputCallbackInfo| {
                        if let Ok(mut buffer) = samples.lock() {
                            buffer.extend(data.iter().map(|&s| {
                                (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
                            }));
                        }
                    },
                    move |err| {
                        tracing::warn!("erreur stream de capture: {}", err);
                    },
                    None,
                )?
            }
            SampleFormat::I16 => {
                let samples = Arc::clone(&samples);
                device.build_input_stream(
                    &default_config.config(),
                    move |data: &[i16], _: &cpal::InputCallbackInfo| {
                        if let Ok(mut buffer) = samples.lock() {
                            buffer.extend_from_slice(data);
                        }
                    },
                    move |err| {
                        tracing::warn!("erreur stream de capture: {}", err);
                    },
                    None,
                )?
            }
            SampleFormat::U16 => {
                let samples = Arc::clone(&samples);
                device.build_input_stream(
                    &default_config.config(),
                    move |data: &[u16], _: &cpal::InputCallbackInfo| {
                        if let Ok(mut buffer) = samples.lock() {
                            buffer.extend(
                                data.iter().map(|&s| (s as i32 - 32768) as i16),
                            );
                        }
                    },
                    move |err| {
                        tracing::warn!("erreur stream de capture: {}", err);
                    },
                    None,
                )?
            }
            other => {
                return Err(AudioError::ConfigError(format!(
                    "Format d'échantillon non supporté : {:?}",
                    other
                )));
            }
        };

        Ok((stream, device_name, sample_rate, channels))
    }
}

#[async_trait]
impl AudioRecorder for CpalRecorder {
    async fn start_recording(&mut self) -> AudioResult<()> {
        if self.worker.is_some() {
            return Err(AudioError::AlreadyRecording);
        }

        self.config
            .validate()
            .map_err(AudioError::ConfigError)?;

        let samples = Arc::new(Mutex::new(Vec::new()));
        let (ready_tx, ready_rx) = oneshot::channel();
        let (stop_tx, stop_rx) = std::sync::mpsc::channel();

        let worker_samples = Arc::clone(&samples);
        let handle = std::thread::spawn(move || {
            Self::run_capture(worker_samples, ready_tx, stop_rx);
        });

        // Attend que le worker ait acquis (ou échoué à acquérir) le micro
        match ready_rx.await {
            Ok(Ok((name, sample_rate, channels))) => {
                tracing::info!(periphérique = %name, "enregistrement démarré");
                self.device_name = name;
                self.worker = Some(CaptureWorker {
                    handle,
                    stop_tx,
                    samples,
                    sample_rate,
                    channels,
                });
                Ok(())
            }
            Ok(Err(e)) => {
                let _ = handle.join(); // Le thread s'est déjà terminé
                Err(e)
            }
            Err(_) => {
                let _ = handle.join();
                Err(AudioError::InitializationError(
                    "worker de capture terminé sans réponse".to_string(),
                ))
            }
        }
    }

    async fn stop_recording(&mut self) -> AudioResult<EncodedAudio> {
        let worker = self.worker.take().ok_or(AudioError::NotRecording)?;

        // Signale l'arrêt puis attend la fin du worker hors de l'executor
        let _ = worker.stop_tx.send(());
        let handle = worker.handle;
        tokio::task::spawn_blocking(move || {
            let _ = handle.join();
        })
        .await
        .map_err(|e| AudioError::InitializationError(format!("join du worker: {}", e)))?;

        let recorded = {
            let mut buffer = worker
                .samples
                .lock()
                .map_err(|_| AudioError::InitializationError("buffer de capture empoisonné".to_string()))?;
            std::mem::take(&mut *buffer)
        };

        tracing::info!(
            echantillons = recorded.len(),
            "enregistrement finalisé en WAV"
        );

        codec::wav_from_samples(&recorded, worker.sample_rate, worker.channels)
    }

    fn is_recording(&self) -> bool {
        self.worker.is_some()
    }

    fn device_info(&self) -> String {
        self.device_name.clone()
    }
}

/// Enregistreur factice pour les tests
///
/// Joue le même rôle que le transport simulé côté réseau : permet de
/// tester le contrôleur et les scénarios complets sans microphone.
/// Le contenu "capturé" est configurable à la construction.
pub struct MockRecorder {
    config: AudioConfig,
    recording: bool,
    canned_samples: Vec<Sample>,
    deny_permission: bool,
}

impl MockRecorder {
    /// Crée un enregistreur factice avec un court signal par défaut
    pub fn new() -> Self {
        // Rampe simple : reconnaissable dans les assertions
        let canned_samples = (0..160).map(|i| (i * 100) as i16).collect();
        Self {
            config: AudioConfig::default(),
            recording: false,
            canned_samples,
            deny_permission: false,
        }
    }

    /// Remplace le signal que produira `stop_recording()`
    pub fn with_samples(mut self, samples: Vec<Sample>) -> Self {
        self.canned_samples = samples;
        self
    }

    /// Simule un refus de permission au prochain `start_recording()`
    pub fn deny_permission(mut self) -> Self {
        self.deny_permission = true;
        self
    }
}

impl Default for MockRecorder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AudioRecorder for MockRecorder {
    async fn start_recording(&mut self) -> AudioResult<()> {
        if self.deny_permission {
            return Err(AudioError::PermissionDenied(
                "accès refusé (simulation)".to_string(),
            ));
        }
        if self.recording {
            return Err(AudioError::AlreadyRecording);
        }
        self.recording = true;
        Ok(())
    }

    async fn stop_recording(&mut self) -> AudioResult<EncodedAudio> {
        if !self.recording {
            return Err(AudioError::NotRecording);
        }
        self.recording = false;
        codec::wav_from_samples(
            &self.canned_samples,
            self.config.sample_rate,
            self.config.channels,
        )
    }

    fn is_recording(&self) -> bool {
        self.recording
    }

    fn device_info(&self) -> String {
        "Microphone simulé".to_string()
    }
}
