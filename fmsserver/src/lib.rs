//! # fmsserver - Front HTTP
//!
//! Enveloppe ergonomique au-dessus d'Axum pour le front HTTP du serveur
//! média : accumulation de routes, en-têtes par défaut, arrêt gracieux.

mod server;

pub use server::{Server, ServerBuilder};
