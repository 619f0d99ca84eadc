//! Stub d'eventing GENA pour ContentDirectory
//!
//! Poignée de main SUBSCRIBE et NOTIFY initial uniquement : pas de renvoi
//! périodique, pas d'invalidation, pas de renouvellement réel. La surface
//! est là, la conformité complète viendra si un client en a besoin.

use crate::device::MediaServer;
use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::Response;
use fmsupnp::gena;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

/// URL d'abonnement aux événements ContentDirectory
pub const CONTENT_DIRECTORY_EVENT_SUB_URL: &str = "/evt/ContentDirectory";

/// Timeout d'abonnement par défaut (secondes)
const DEFAULT_TIMEOUT_SECS: u32 = 1800;

/// Délai avant le NOTIFY initial : la réponse SUBSCRIBE doit partir d'abord.
const INITIAL_NOTIFY_DELAY: Duration = Duration::from_millis(100);

fn empty(status: StatusCode) -> Response {
    Response::builder()
        .status(status)
        .body(Body::empty())
        .expect("static response build cannot fail")
}

/// SUBSCRIBE|UNSUBSCRIBE /evt/ContentDirectory
pub async fn event_sub_handler(
    State(state): State<Arc<MediaServer>>,
    method: Method,
    headers: HeaderMap,
) -> Response {
    if state.config.stall_event_subscribe {
        // Certains renderers partent en vrille sur un eventing en erreur ;
        // laisser la requête pendre jusqu'à leur déconnexion les maintient
        // opérationnels. Le future est lâché à la déconnexion du pair.
        let _guard = StallGuard(Instant::now());
        std::future::pending::<()>().await;
        unreachable!("pending future never resolves");
    }

    match method.as_str() {
        "SUBSCRIBE" => {
            if headers.contains_key("sid") {
                // Renouvellement : non géré
                return empty(StatusCode::PRECONDITION_FAILED);
            }
            let callbacks = headers
                .get("callback")
                .and_then(|v| v.to_str().ok())
                .map(gena::parse_callback_urls)
                .unwrap_or_default();
            let timeout = headers
                .get("timeout")
                .and_then(|v| v.to_str().ok())
                .and_then(gena::parse_timeout)
                .unwrap_or(DEFAULT_TIMEOUT_SECS);
            let sid = format!("uuid:{}", Uuid::new_v4());
            debug!("subscribe {} -> {:?}, timeout {}s", sid, callbacks, timeout);

            let notify_sid = sid.clone();
            tokio::spawn(async move {
                tokio::time::sleep(INITIAL_NOTIFY_DELAY).await;
                send_initial_event(&callbacks, &notify_sid).await;
            });

            Response::builder()
                .status(StatusCode::OK)
                .header("SID", sid)
                .header("TIMEOUT", format!("Second-{}", timeout))
                .body(Body::empty())
                .expect("response build cannot fail")
        }
        "UNSUBSCRIBE" => empty(StatusCode::OK),
        other => {
            debug!("unhandled event method: {}", other);
            empty(StatusCode::METHOD_NOT_ALLOWED)
        }
    }
}

struct StallGuard(Instant);

impl Drop for StallGuard {
    fn drop(&mut self) {
        info!(
            "stalled subscribe connection went away after {:?}",
            self.0.elapsed()
        );
    }
}

/// Envoie le property set initial `{SystemUpdateID: 0}` à chaque callback.
async fn send_initial_event(callbacks: &[Url], sid: &str) {
    let body = gena::build_property_set(&[("SystemUpdateID", "0")]);
    for url in callbacks {
        let url = url.to_string();
        let sid = sid.to_string();
        let body = body.clone();
        let result = tokio::task::spawn_blocking(move || {
            ureq::request("NOTIFY", &url)
                .timeout(std::time::Duration::from_secs(30))
                .set("CONTENT-TYPE", r#"text/xml; charset="utf-8""#)
                .set("NT", "upnp:event")
                .set("NTS", "upnp:propchange")
                .set("SID", &sid)
                .set("SEQ", "0")
                .send_string(&body)
        })
        .await;
        match result {
            Ok(Ok(response)) => debug!("initial notify: {}", response.status()),
            Ok(Err(e)) => warn!("could not notify subscriber: {}", e),
            Err(e) => warn!("notify task failed: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header::HeaderValue;

    #[test]
    fn test_timeout_header_parsing_defaults() {
        let mut headers = HeaderMap::new();
        headers.insert("timeout", HeaderValue::from_static("Second-300"));
        let timeout = headers
            .get("timeout")
            .and_then(|v| v.to_str().ok())
            .and_then(gena::parse_timeout)
            .unwrap_or(DEFAULT_TIMEOUT_SECS);
        assert_eq!(timeout, 300);

        let timeout = HeaderMap::new()
            .get("timeout")
            .and_then(|v| v.to_str().ok())
            .and_then(gena::parse_timeout)
            .unwrap_or(DEFAULT_TIMEOUT_SECS);
        assert_eq!(timeout, DEFAULT_TIMEOUT_SECS);
    }

    #[test]
    fn test_sid_shape() {
        let sid = format!("uuid:{}", Uuid::new_v4());
        assert!(sid.starts_with("uuid:"));
        assert_eq!(sid.len(), "uuid:".len() + 36);
    }
}
