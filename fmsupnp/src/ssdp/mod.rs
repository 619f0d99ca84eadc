//! # Module SSDP - Simple Service Discovery Protocol
//!
//! Annonce et découverte multicast du serveur média.
//!
//! ## Fonctionnalités
//!
//! - ✅ Une instance par interface × famille d'adresse (IPv4, IPv6 LL, IPv6 SL)
//! - ✅ NOTIFY ssdp:alive périodiques, lissés aléatoirement
//! - ✅ Réponses unicast aux M-SEARCH, retardées dans la borne MX
//! - ✅ NOTIFY ssdp:byebye à l'arrêt, best-effort
//!
//! ## Constantes SSDP
//!
//! - **Groupe IPv4** : 239.255.255.250:1900
//! - **Groupes IPv6** : [ff02::c]:1900 (link-local), [ff05::c]:1900 (site-local)
//! - **Max-Age** : 1800 secondes

mod device;
mod server;

pub use device::SsdpAdvertised;
pub use server::{SsdpConfig, SsdpEngine};

use std::net::{Ipv4Addr, Ipv6Addr};

/// Groupe multicast SSDP IPv4
pub const SSDP_GROUP_V4: Ipv4Addr = Ipv4Addr::new(239, 255, 255, 250);

/// Groupe multicast SSDP IPv6 link-local
pub const SSDP_GROUP_V6_LINK_LOCAL: Ipv6Addr = Ipv6Addr::new(0xff02, 0, 0, 0, 0, 0, 0, 0xc);

/// Groupe multicast SSDP IPv6 site-local
pub const SSDP_GROUP_V6_SITE_LOCAL: Ipv6Addr = Ipv6Addr::new(0xff05, 0, 0, 0, 0, 0, 0, 0xc);

/// Port SSDP
pub const SSDP_PORT: u16 = 1900;

/// Durée de validité des annonces (secondes)
pub const MAX_AGE: u32 = 1800;

/// Borne haute du délai de réponse M-SEARCH, même si MX annonce plus
pub const MAX_MX_SECS: u64 = 5;
