//! Crate app pour Vocassist - Orchestration de l'assistant vocal
//!
//! Compose les crates `audio` et `network` derrière le contrôleur de
//! session, et fournit le binaire en ligne de commande.

pub mod controller;

pub use controller::{ControllerError, ControllerResult, VoiceAssistantController};
