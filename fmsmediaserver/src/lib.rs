//! # fmsmediaserver - MediaServer UPnP AV / DLNA
//!
//! Le serveur média proprement dit : projection d'un sous-arbre du système de
//! fichiers en hiérarchie d'objets ContentDirectory, streaming des ressources
//! (fichiers bruts ou transcodeurs à la demande), et plan de contrôle SOAP.
//!
//! ## Architecture
//!
//! ```text
//! SSDP (fmsupnp::ssdp)          annonce LOCATION -> /rootDesc.xml
//!        |
//! Front HTTP (fmsserver)        /rootDesc.xml /scpd/* /ctl /res /evt/* ...
//!        |
//! Services SOAP (services)      ContentDirectory / ConnectionManager / MSR
//!        |
//! Répertoire d'objets (objects) chemins <-> ObjectIDs, DIDL-Lite
//!        |
//! Streaming (streaming)         fichiers bruts, transcodeurs, flux dynamiques
//! ```

pub mod config;
pub mod connectionmanager;
pub mod contentdirectory;
pub mod device;
pub mod dynamic;
pub mod eventing;
pub mod mime;
pub mod objects;
pub mod registrar;
pub mod search;
pub mod server_ext;
pub mod services;
pub mod streaming;
pub mod transcode;

pub use config::{IpNet, MediaServerConfig};
pub use device::{Icon, MediaServer};
pub use server_ext::MediaServerExt;

/// Produit annoncé dans les en-têtes SERVER et le modèle du device.
pub const USER_AGENT_PRODUCT: &str = "fms";

/// Version de comportement réseau.
///
/// Communiquée aux autres devices ; ne change que si notre comportement sur
/// le réseau change de façon potentiellement incompatible.
pub const SERVER_VERSION: &str = "1";

/// Valeur de l'en-tête `Server` / SSDP `SERVER`.
pub fn server_field() -> String {
    format!(
        "Linux/3.4 DLNADOC/1.50 UPnP/1.0 {}/{}",
        USER_AGENT_PRODUCT, SERVER_VERSION
    )
}

/// Nom de modèle du root device.
pub fn root_device_model_name() -> String {
    format!("{} {}", USER_AGENT_PRODUCT, SERVER_VERSION)
}
