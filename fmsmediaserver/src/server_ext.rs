//! Enregistrement des routes du MediaServer sur le front HTTP
//!
//! Un trait d'extension sur [`fmsserver::Server`] branche l'ensemble de la
//! surface UPnP : description, SCPD, contrôle SOAP, streaming, événements,
//! icônes et page de présentation.

use crate::device::{MediaServer, DEVICE_ICON_PATH, ROOT_DESC_PATH};
use crate::eventing::{self, CONTENT_DIRECTORY_EVENT_SUB_URL};
use crate::objects::{ICON_PATH, RES_PATH, SUBTITLE_PATH};
use crate::services::{self, ActionContext, CONTROL_URL, SCPD_BASE};
use crate::streaming;
use anyhow::Result;
use async_trait::async_trait;
use axum::body::{Body, Bytes};
use axum::extract::{ConnectInfo, Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use fmsupnp::soap;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, info};

const XML_CONTENT_TYPE: &str = r#"text/xml; charset="utf-8""#;

/// Page de présentation minimale servie sur `/`.
///
/// Le gabarit HTML complet est un collaborateur externe ; on ne fige ici que
/// le contrat de la route.
const PRESENTATION_TEMPLATE: &str = r#"<!DOCTYPE html>
<html><head><title>{name}</title></head>
<body><h1>{name}</h1><p>Sharing <code>{path}</code> (read-only).</p></body></html>
"#;

/// Extension du front HTTP pour le MediaServer.
#[async_trait]
pub trait MediaServerExt {
    /// Branche toutes les routes UPnP du serveur média.
    async fn register_media_server(&mut self, state: Arc<MediaServer>) -> Result<()>;
}

#[async_trait]
impl MediaServerExt for fmsserver::Server {
    async fn register_media_server(&mut self, state: Arc<MediaServer>) -> Result<()> {
        self.set_default_header(
            header::HeaderName::from_static("ext"),
            header::HeaderValue::from_static(""),
        );
        self.set_default_header(
            header::SERVER,
            header::HeaderValue::from_str(&state.server_field)?,
        );
        self.set_log_headers(state.config.log_headers);

        self.add_handler_with_state("/", presentation_handler, state.clone())
            .await;
        self.add_handler_with_state(ROOT_DESC_PATH, root_desc_handler, state.clone())
            .await;
        self.add_router(
            SCPD_BASE,
            Router::new()
                .route("/{file}", get(scpd_handler))
                .with_state(state.clone()),
        )
        .await;
        self.add_post_handler_with_state(CONTROL_URL, control_handler, state.clone())
            .await;
        self.add_handler_with_state(RES_PATH, streaming::res_handler, state.clone())
            .await;
        self.add_handler_with_state(ICON_PATH, streaming::icon_handler, state.clone())
            .await;
        self.add_handler_with_state(SUBTITLE_PATH, streaming::subtitle_handler, state.clone())
            .await;
        self.add_router(
            DEVICE_ICON_PATH,
            Router::new()
                .route("/{id}", get(device_icon_handler))
                .with_state(state.clone()),
        )
        .await;
        self.add_any_handler_with_state(
            CONTENT_DIRECTORY_EVENT_SUB_URL,
            eventing::event_sub_handler,
            state.clone(),
        )
        .await;

        info!("media server routes registered");
        Ok(())
    }
}

async fn presentation_handler(State(state): State<Arc<MediaServer>>) -> Response {
    let html = PRESENTATION_TEMPLATE
        .replace("{name}", &state.friendly_name)
        .replace(
            "{path}",
            &state.config.root_object_path.to_string_lossy(),
        );
    Response::builder()
        .header(header::CONTENT_TYPE, "text/html")
        .body(Body::from(html))
        .expect("response build cannot fail")
}

async fn root_desc_handler(State(state): State<Arc<MediaServer>>) -> Response {
    Response::builder()
        .header(header::CONTENT_TYPE, XML_CONTENT_TYPE)
        .header(header::CONTENT_LENGTH, state.root_desc_xml.len().to_string())
        .body(Body::from(state.root_desc_xml.clone()))
        .expect("response build cannot fail")
}

async fn scpd_handler(
    State(_state): State<Arc<MediaServer>>,
    Path(file): Path<String>,
) -> Response {
    match services::scpd_by_file(&file) {
        Some(xml) => Response::builder()
            .header(header::CONTENT_TYPE, XML_CONTENT_TYPE)
            .body(Body::from(xml))
            .expect("response build cannot fail"),
        None => Response::builder()
            .status(StatusCode::NOT_FOUND)
            .body(Body::from("no such service description"))
            .expect("response build cannot fail"),
    }
}

async fn device_icon_handler(
    State(state): State<Arc<MediaServer>>,
    Path(id): Path<String>,
) -> Response {
    // Index hors bornes ramené à la première icône
    let index = id
        .parse::<usize>()
        .ok()
        .filter(|i| *i < state.icons.len())
        .unwrap_or(0);
    let icon = &state.icons[index];
    Response::builder()
        .header(header::CONTENT_TYPE, icon.mimetype.clone())
        .body(Body::from(icon.bytes.clone()))
        .expect("response build cannot fail")
}

/// POST /ctl : le plan de contrôle SOAP.
async fn control_handler(
    State(state): State<Arc<MediaServer>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    // Liste blanche avant tout parsing
    let peer_ip = peer.ip().to_string();
    if !state.config.allows_peer(&peer_ip) {
        info!(
            "not allowed client {}, {:?}",
            peer_ip, state.config.allowed_ip_nets
        );
        return Response::builder()
            .status(StatusCode::FORBIDDEN)
            .body(Body::from("forbidden"))
            .expect("response build cannot fail");
    }

    let bad_request = |msg: String| {
        Response::builder()
            .status(StatusCode::BAD_REQUEST)
            .body(Body::from(msg))
            .expect("response build cannot fail")
    };

    let soapaction = match headers
        .get("soapaction")
        .and_then(|v| v.to_str().ok())
        .map(soap::parse_soapaction_header)
    {
        Some(Ok(h)) => h,
        Some(Err(e)) => return bad_request(e.to_string()),
        None => return bad_request("missing SOAPACTION header".to_string()),
    };
    let action = match soap::parse_soap_action(&body) {
        Ok(a) => a,
        Err(e) => return bad_request(e.to_string()),
    };
    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost");
    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    debug!("{} {}#{}", peer_ip, soapaction.service_urn, soapaction.action);

    let ctx = ActionContext {
        state: &state,
        host,
        user_agent,
    };
    let (body_xml, status) = match services::dispatch(&ctx, &soapaction, &action).await {
        Ok(args) => (
            soap::build_soap_response(&soapaction.service_urn, &soapaction.action, &args),
            StatusCode::OK,
        ),
        Err(upnp_err) => {
            debug!("action {} failed: {}", soapaction.action, upnp_err);
            (
                soap::build_soap_fault(&upnp_err),
                StatusCode::INTERNAL_SERVER_ERROR,
            )
        }
    };

    Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, XML_CONTENT_TYPE)
        .body(Body::from(body_xml))
        .expect("response build cannot fail")
}
