//! fmserve : le binaire du serveur média
//!
//! Assemble configuration, front HTTP, routes UPnP et moteur SSDP, puis
//! tourne jusqu'à Ctrl-C. Le parsing d'arguments et le chargement de
//! fichiers de configuration appartiennent aux couches externes ; ici la
//! configuration est construite explicitement, quelques variables
//! d'environnement en guise de réglages :
//!
//! - `FMS_ROOT`       : répertoire partagé (défaut : répertoire courant)
//! - `FMS_HTTP_PORT`  : port HTTP (défaut : 1338)
//! - `FMS_FRIENDLY_NAME` : nom affiché aux renderers

use anyhow::{Context, Result};
use fmsmediaserver::{server_field, MediaServer, MediaServerConfig, MediaServerExt};
use fmsupnp::ssdp::{SsdpAdvertised, SsdpConfig, SsdpEngine};
use fmsserver::ServerBuilder;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::prelude::*;
use tracing_subscriber::Registry;

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = Registry::default().with(
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_level(true)
            .with_ansi(true),
    );
    tracing::subscriber::set_global_default(subscriber)
        .context("failed to install tracing subscriber")?;

    let config = MediaServerConfig {
        root_object_path: std::env::var("FMS_ROOT")
            .unwrap_or_else(|_| ".".to_string())
            .into(),
        friendly_name: std::env::var("FMS_FRIENDLY_NAME").unwrap_or_default(),
        ..Default::default()
    };
    let http_port: u16 = std::env::var("FMS_HTTP_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(1338);

    let media = Arc::new(MediaServer::new(config)?);
    info!("serving {:?} as {}", media.config.root_object_path, media.friendly_name);

    // Front HTTP : lié avant le lancement de SSDP, pour que LOCATION pointe
    // sur un port effectivement ouvert.
    let bind: SocketAddr = ([0, 0, 0, 0], http_port).into();
    let mut server = ServerBuilder::new("fmserve", bind).build();
    server.register_media_server(media.clone()).await?;
    server.start().await.context("cannot bind HTTP listener")?;
    let http_port = server.http_port();
    let shutdown = server.shutdown_token();

    // Moteur SSDP : une instance par interface × famille multicast
    let advertised = SsdpAdvertised {
        udn: media.udn.clone(),
        devices: vec![fmsmediaserver::device::ROOT_DEVICE_TYPE.to_string()],
        services: fmsmediaserver::services::all()
            .iter()
            .map(|s| s.service_type.to_string())
            .collect(),
    };
    let location_media = media.clone();
    let ssdp_config = SsdpConfig {
        advertised,
        server: server_field(),
        location: Arc::new(move |ip| location_media.location(ip, http_port)),
        notify_interval: media.config.notify_interval,
    };
    let ssdp = SsdpEngine::start(
        ssdp_config,
        fmsutils::multicast_interfaces(),
        shutdown.clone(),
    );
    info!("SSDP announcements running, UDN {}", media.udn);

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl_c")?;
    info!("shutting down");
    shutdown.cancel();
    server.wait().await;
    // Les boucles SSDP émettent leur byebye avant de rendre la main
    tokio::task::spawn_blocking(move || ssdp.wait())
        .await
        .context("SSDP shutdown join failed")?;

    Ok(())
}
