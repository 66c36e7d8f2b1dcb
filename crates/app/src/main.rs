// Client en ligne de commande pour l'assistant vocal Vocassist
//
// Cette application fournit un client basique pour dialoguer avec le
// backend vocal : connexion, tours de parole au micro, lecture des
// réponses. Le mode simulate rejoue un tour complet sans backend.

use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tokio::signal;

use app::VoiceAssistantController;
use audio::{codec, MockPlayer, MockRecorder};
use network::{
    ServerEvent, SessionClient, SessionConfig, SessionEvent, SimulatedConnector, VoiceState,
};

#[derive(Parser)]
#[command(author, version, about = "Client Vocassist pour l'assistant vocal")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Se connecte au backend vocal
    Connect {
        /// URL WebSocket du backend
        #[arg(short, long, default_value = "ws://localhost:8080/voice")]
        url: String,

        /// Identifiant de conversation à reprendre (vide = nouvelle)
        #[arg(short, long, default_value = "")]
        thread_id: String,

        /// Enregistre un tour de N secondes dès que la session est prête
        #[arg(short, long)]
        record_seconds: Option<u64>,

        #[arg(short, long)]
        verbose: bool,
    },
    /// Rejoue un tour complet sur le transport simulé (sans backend)
    Simulate {
        #[arg(short, long)]
        verbose: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Connect {
            url,
            thread_id,
            record_seconds,
            verbose,
        } => {
            init_tracing(verbose);
            run_client(url, thread_id, record_seconds).await?
        }
        Commands::Simulate { verbose } => {
            init_tracing(verbose);
            run_simulation().await?
        }
    }

    Ok(())
}

/// Initialise tracing avec un filtre par défaut raisonnable
fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .init();
}

/// Connexion réelle au backend vocal
async fn run_client(url: String, thread_id: String, record_seconds: Option<u64>) -> Result<()> {
    let mut config = SessionConfig::default();
    config.url = url;
    config.thread_id = thread_id;

    println!("🚀 Client Vocassist");
    println!("📡 Connexion au backend {}...", config.url);

    let mut controller = VoiceAssistantController::new(config)?;
    controller.connect().await?;

    println!("✅ Transport ouvert, en attente de la session...");
    println!("   Arrêt : Ctrl+C");

    let mut turn_done = record_seconds.is_none();

    loop {
        tokio::select! {
            _ = signal::ctrl_c() => {
                println!("\n🛑 Arrêt demandé");
                break;
            }

            event = controller.next_event() => {
                let Some(event) = event else {
                    println!("ℹ️  Flux de session terminé");
                    break;
                };

                print_event(&event);

                // Un tour automatique dès que la session est prête
                if let SessionEvent::StateChanged(VoiceState::Ready) = event {
                    if let (false, Some(seconds)) = (turn_done, record_seconds) {
                        turn_done = true;
                        run_one_turn(&mut controller, seconds).await;
                    }
                }
            }
        }
    }

    println!("🔌 Déconnexion...");
    controller.shutdown().await;
    println!("👋 Client fermé");

    Ok(())
}

/// Enregistre un tour de parole et l'envoie au backend
async fn run_one_turn(controller: &mut VoiceAssistantController, seconds: u64) {
    println!("🎤 Enregistrement pendant {}s...", seconds);

    if let Err(e) = controller.start_recording().await {
        println!("❌ Impossible de démarrer l'enregistrement : {}", e);
        return;
    }

    tokio::time::sleep(Duration::from_secs(seconds)).await;

    match controller.stop_recording().await {
        Ok(()) => println!("📤 Tour envoyé au backend"),
        Err(e) => println!("❌ Échec de l'envoi : {}", e),
    }
}

/// Affiche un événement de session de façon lisible
fn print_event(event: &SessionEvent) {
    match event {
        SessionEvent::StateChanged(state) => {
            println!("🔄 État : {}", state.description());
        }
        SessionEvent::Server(ServerEvent::Initialized { thread_id, kb_id }) => {
            println!("✅ Session établie (thread {}, kb {})", thread_id, kb_id);
        }
        SessionEvent::Server(ServerEvent::SttComplete { text }) => {
            println!("📝 Vous avez dit : {}", text);
        }
        SessionEvent::Server(ServerEvent::RagComplete { text }) => {
            println!("💬 Assistant : {}", text);
        }
        SessionEvent::Server(ServerEvent::TtsComplete { format, .. }) => {
            println!("🔊 Réponse audio reçue ({})", format);
        }
        SessionEvent::Server(ServerEvent::Done { duration }) => {
            println!("⏱️  Tour terminé en {}ms", duration);
        }
        SessionEvent::Server(ServerEvent::Error { message }) => {
            println!("❌ Erreur backend : {}", message);
        }
        SessionEvent::Server(_) => {} // Étapes intermédiaires : silencieuses
        SessionEvent::Transport { message, fatal } => {
            if *fatal {
                println!("❌ Transport : {}", message);
            } else {
                println!("ℹ️  Transport : {}", message);
            }
        }
    }
}

/// Rejoue un tour complet sur le transport simulé
///
/// Utile pour vérifier l'installation sans backend ni matériel audio :
/// le "serveur" est scripté, le micro et les haut-parleurs sont factices.
async fn run_simulation() -> Result<()> {
    println!("🧪 Simulation d'un tour complet (sans backend)");

    let connector = SimulatedConnector::new();
    let transport = SessionClient::with_connector(SessionConfig::default(), connector.clone())?;
    let mut controller = VoiceAssistantController::with_components(
        transport,
        Box::new(MockRecorder::new()),
        Box::new(MockPlayer::new()),
    );

    controller.connect().await?;

    // Le script du "backend" : session établie, puis un tour complet
    connector.push_event(&ServerEvent::Initialized {
        thread_id: "thread-simulation".to_string(),
        kb_id: "kb-simulation".to_string(),
    });

    let response = codec::wav_from_samples(&[0, 800, -800, 1600, -1600], 16000, 1)?;
    connector.push_event(&ServerEvent::SttStart);
    connector.push_event(&ServerEvent::SttComplete {
        text: "quelle est la capitale de la France ?".to_string(),
    });
    connector.push_event(&ServerEvent::RagStart);
    connector.push_event(&ServerEvent::RagComplete {
        text: "La capitale de la France est Paris.".to_string(),
    });
    connector.push_event(&ServerEvent::TtsStart);
    connector.push_event(&ServerEvent::TtsComplete {
        audio: codec::encode_for_transport(&response),
        format: "wav".to_string(),
    });
    connector.push_event(&ServerEvent::Done { duration: 1234 });

    // Déroule le script jusqu'à la fin du tour
    while let Some(event) = controller.next_event().await {
        print_event(&event);
        if matches!(event, SessionEvent::Server(ServerEvent::Done { .. })) {
            break;
        }
    }

    println!("📊 État final : {}", controller.state().description());
    controller.shutdown().await;
    println!("✅ Simulation terminée");

    Ok(())
}
