//! Gestion d'erreurs pour le transport de session
//!
//! Ce module définit tous les types d'erreurs possibles dans la couche
//! de session WebSocket. Il suit les mêmes patterns que le module audio
//! pour la cohérence du code.

use thiserror::Error;

/// Énumération de toutes les erreurs possibles dans la couche de session
///
/// `thiserror::Error` génère automatiquement l'implémentation du trait Error
/// avec des messages d'erreur descriptifs.
#[derive(Error, Debug)]
pub enum NetworkError {
    /// Impossible d'ouvrir la connexion vers le backend
    #[error("Connexion impossible vers {url}: {reason}")]
    ConnectFailed { url: String, reason: String },

    /// La connexion s'est fermée (proprement ou non) alors qu'on comptait dessus
    #[error("Connexion fermée")]
    ConnectionClosed,

    /// Budget de reconnexion épuisé sans succès - fatal pour la session
    #[error("Reconnexion abandonnée après {attempts} tentatives")]
    ReconnectExhausted { attempts: u32 },

    /// Opération tentée alors que la session n'est pas dans le bon état
    #[error("Opération {operation} invalide dans l'état {current_state}")]
    InvalidState {
        operation: String,
        current_state: String,
    },

    /// Message entrant illisible - non fatal, le message est ignoré
    #[error("Message illisible: {0}")]
    ParseError(#[from] serde_json::Error),

    /// Erreur de la couche WebSocket (tungstenite)
    #[error("Erreur WebSocket: {0}")]
    WsError(#[from] tokio_tungstenite::tungstenite::Error),

    /// Erreur générale d'entrée/sortie réseau
    #[error("Erreur IO réseau: {0}")]
    IoError(#[from] std::io::Error),

    /// Erreur de configuration de session
    #[error("Configuration de session invalide: {0}")]
    ConfigError(String),
}

/// Type Result personnalisé pour notre crate network
///
/// Au lieu d'écrire Result<T, NetworkError> partout, on peut écrire NetworkResult<T>
pub type NetworkResult<T> = Result<T, NetworkError>;

/// Fonctions utilitaires pour créer des erreurs communes
impl NetworkError {
    /// Crée une erreur d'ouverture de connexion avec contexte
    pub fn connect_failed(url: impl Into<String>, reason: impl ToString) -> Self {
        Self::ConnectFailed {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    /// Crée une erreur d'état invalide avec contexte
    pub fn invalid_state(operation: impl Into<String>, current_state: impl ToString) -> Self {
        Self::InvalidState {
            operation: operation.into(),
            current_state: current_state.to_string(),
        }
    }

    /// Vérifie si l'erreur est fatale pour la session
    ///
    /// Une erreur fatale force l'état Error ; seule une nouvelle
    /// connexion explicite permet d'en sortir.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            NetworkError::ReconnectExhausted { .. } | NetworkError::ConnectFailed { .. }
        )
    }

    /// Vérifie si l'erreur justifie une tentative de reconnexion
    pub fn requires_reconnection(&self) -> bool {
        match self {
            NetworkError::ConnectionClosed => true,
            NetworkError::WsError(_) => true,
            NetworkError::IoError(_) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = NetworkError::ConnectFailed {
            url: "ws://localhost:8080/voice".to_string(),
            reason: "connexion refusée".to_string(),
        };
        assert!(error.to_string().contains("ws://localhost:8080/voice"));
        assert!(error.to_string().contains("connexion refusée"));

        let error = NetworkError::ReconnectExhausted { attempts: 3 };
        assert!(error.to_string().contains('3'));
    }

    #[test]
    fn test_error_fatal() {
        let exhausted = NetworkError::ReconnectExhausted { attempts: 3 };
        assert!(exhausted.is_fatal());

        let closed = NetworkError::ConnectionClosed;
        assert!(!closed.is_fatal());
        assert!(closed.requires_reconnection());
    }

    #[test]
    fn test_parse_error_not_fatal() {
        let parse_err: NetworkError = serde_json::from_str::<serde_json::Value>("pas du json")
            .unwrap_err()
            .into();

        assert!(!parse_err.is_fatal());
        assert!(!parse_err.requires_reconnection());
    }

    #[test]
    fn test_helper_functions() {
        let error = NetworkError::connect_failed("ws://test", "timeout");
        match error {
            NetworkError::ConnectFailed { url, reason } => {
                assert_eq!(url, "ws://test");
                assert_eq!(reason, "timeout");
            }
            _ => panic!("Wrong error type"),
        }

        let error = NetworkError::invalid_state("send_audio", "Idle");
        assert!(error.to_string().contains("send_audio"));
        assert!(error.to_string().contains("Idle"));
    }
}
