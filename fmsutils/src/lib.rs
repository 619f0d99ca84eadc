//! # fmsutils - Utilitaires réseau partagés
//!
//! Petites briques réseau utilisées par le serveur SSDP et le front HTTP :
//! énumération des interfaces, devinette d'IP locale, sélection de l'adresse
//! source faisant face à un pair donné.

mod ip_utils;

pub use ip_utils::{guess_local_ip, multicast_interfaces, source_ip_for, NetInterface};
