//! Table des services UPnP AV exposés et dispatch des actions SOAP
//!
//! L'ensemble des services est clos et connu à la compilation : une table
//! statique et un dispatch par variant suffisent, pas de registre ouvert.

use crate::contentdirectory;
use crate::device::MediaServer;
use crate::registrar;
use crate::{connectionmanager, eventing};
use fmsupnp::soap::{SoapAction, SoapActionHeader};
use fmsupnp::UpnpError;
use std::sync::Arc;

/// URL de contrôle commune : le service visé est déduit de l'en-tête
/// SOAPACTION, pas du chemin.
pub const CONTROL_URL: &str = "/ctl";

/// Préfixe des SCPD servis
pub const SCPD_BASE: &str = "/scpd";

/// Les trois services du MediaServer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceKind {
    ContentDirectory,
    ConnectionManager,
    MediaReceiverRegistrar,
}

/// Entrée de la table des services
#[derive(Debug, Clone)]
pub struct ServiceInfo {
    pub kind: ServiceKind,
    pub service_type: &'static str,
    pub service_id: &'static str,
    pub scpd_file: &'static str,
    pub event_sub_url: &'static str,
}

/// Table fixe des services exposés.
pub fn all() -> &'static [ServiceInfo] {
    &[
        ServiceInfo {
            kind: ServiceKind::ContentDirectory,
            service_type: "urn:schemas-upnp-org:service:ContentDirectory:1",
            service_id: "urn:upnp-org:serviceId:ContentDirectory",
            scpd_file: "ContentDirectory.xml",
            event_sub_url: eventing::CONTENT_DIRECTORY_EVENT_SUB_URL,
        },
        ServiceInfo {
            kind: ServiceKind::ConnectionManager,
            service_type: "urn:schemas-upnp-org:service:ConnectionManager:1",
            service_id: "urn:upnp-org:serviceId:ConnectionManager",
            scpd_file: "ConnectionManager.xml",
            event_sub_url: "",
        },
        ServiceInfo {
            kind: ServiceKind::MediaReceiverRegistrar,
            service_type: "urn:microsoft.com:service:X_MS_MediaReceiverRegistrar:1",
            service_id: "urn:microsoft.com:serviceId:X_MS_MediaReceiverRegistrar",
            scpd_file: "X_MS_MediaReceiverRegistrar.xml",
            event_sub_url: "",
        },
    ]
}

/// SCPD d'un service, par nom de fichier.
pub fn scpd_by_file(file: &str) -> Option<&'static str> {
    all()
        .iter()
        .find(|s| s.scpd_file == file)
        .map(|s| match s.kind {
            ServiceKind::ContentDirectory => contentdirectory::SCPD,
            ServiceKind::ConnectionManager => connectionmanager::SCPD,
            ServiceKind::MediaReceiverRegistrar => registrar::SCPD,
        })
}

/// Contexte d'exécution d'une action SOAP
pub struct ActionContext<'a> {
    pub state: &'a Arc<MediaServer>,
    /// Valeur de l'en-tête Host de la requête, pour construire les URLs `res`
    pub host: &'a str,
    pub user_agent: &'a str,
}

/// Dispatch d'une action vers son service, par type extrait de l'URN.
pub async fn dispatch(
    ctx: &ActionContext<'_>,
    header: &SoapActionHeader,
    action: &SoapAction,
) -> Result<Vec<(String, String)>, UpnpError> {
    match header.service_type() {
        "ContentDirectory" => contentdirectory::handle(ctx, &header.action, action).await,
        "ConnectionManager" => connectionmanager::handle(&header.action, action),
        "X_MS_MediaReceiverRegistrar" => registrar::handle(&header.action, action),
        other => Err(UpnpError::invalid_action(format!(
            "Invalid service: {}",
            other
        ))),
    }
}
