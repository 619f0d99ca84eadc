//! # Module Server - API de haut niveau pour Axum
//!
//! Abstraction simple pour monter le front HTTP UPnP : les handlers sont
//! ajoutés un à un, puis `start()` lie le port et sert jusqu'à l'arrêt.
//!
//! ## Fonctionnalités
//!
//! - 🎯 **Handlers personnalisés** : GET, POST ou tout verbe, avec état partagé
//! - 🧾 **En-têtes par défaut** : appliqués à toutes les réponses (Server, Ext)
//! - 🔍 **Journal des requêtes** : optionnel, en-têtes inclus
//! - ⚡ **Arrêt gracieux** : CancellationToken partagé avec le reste du serveur

use axum::extract::Request;
use axum::handler::Handler;
use axum::http::{HeaderName, HeaderValue};
use axum::middleware::Next;
use axum::response::Response;
use axum::routing::{any, get, post};
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::{sync::RwLock, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Serveur HTTP principal
pub struct Server {
    name: String,
    bind_addr: SocketAddr,
    local_addr: Option<SocketAddr>,
    router: Arc<RwLock<Router>>,
    default_headers: Vec<(HeaderName, HeaderValue)>,
    log_headers: bool,
    join_handle: Option<JoinHandle<()>>,
    shutdown_token: CancellationToken,
}

impl Server {
    /// Crée une nouvelle instance de serveur.
    ///
    /// # Arguments
    ///
    /// * `name` - Nom du serveur (pour les logs)
    /// * `bind_addr` - Adresse d'écoute ; port 0 pour un port éphémère
    pub fn new(name: impl Into<String>, bind_addr: SocketAddr) -> Self {
        Self {
            name: name.into(),
            bind_addr,
            local_addr: None,
            router: Arc::new(RwLock::new(Router::new())),
            default_headers: Vec::new(),
            log_headers: false,
            join_handle: None,
            shutdown_token: CancellationToken::new(),
        }
    }

    /// Retourne une copie du token d'arrêt gracieux.
    ///
    /// Ce token peut être donné aux composants qui ont besoin de savoir
    /// quand le serveur s'arrête (boucles SSDP, tâches longues, etc.)
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    /// Ajoute un en-tête appliqué à toutes les réponses.
    pub fn set_default_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.default_headers.push((name, value));
    }

    /// Active le journal des requêtes et réponses, en-têtes inclus.
    pub fn set_log_headers(&mut self, log: bool) {
        self.log_headers = log;
    }

    /// Ajoute un handler GET avec état.
    pub async fn add_handler_with_state<H, T, S>(&mut self, path: &str, handler: H, state: S)
    where
        H: Handler<T, S> + Clone + 'static,
        T: 'static,
        S: Clone + Send + Sync + 'static,
    {
        let route = Router::new()
            .route("/", get(handler.clone()))
            .with_state(state.clone());
        self.mount(path, route).await;
    }

    /// Ajoute un handler POST avec état.
    pub async fn add_post_handler_with_state<H, T, S>(&mut self, path: &str, handler: H, state: S)
    where
        H: Handler<T, S> + Clone + 'static,
        T: 'static,
        S: Clone + Send + Sync + 'static,
    {
        let route = Router::new()
            .route("/", post(handler.clone()))
            .with_state(state.clone());
        self.mount(path, route).await;
    }

    /// Ajoute un handler acceptant tous les verbes HTTP (SUBSCRIBE inclus).
    pub async fn add_any_handler_with_state<H, T, S>(&mut self, path: &str, handler: H, state: S)
    where
        H: Handler<T, S> + Clone + 'static,
        T: 'static,
        S: Clone + Send + Sync + 'static,
    {
        let route = Router::new()
            .route("/", any(handler.clone()))
            .with_state(state.clone());
        self.mount(path, route).await;
    }

    /// Ajoute un sous-router au serveur.
    pub async fn add_router(&mut self, path: &str, sub_router: Router) {
        self.mount(path, sub_router).await;
    }

    async fn mount(&mut self, path: &str, route: Router) {
        let mut r = self.router.write().await;
        *r = if path == "/" {
            std::mem::take(&mut *r).merge(route)
        } else {
            std::mem::take(&mut *r).nest(path, route)
        };
    }

    /// Démarre le serveur HTTP.
    ///
    /// Le listener est lié avant le retour : après `start()`, `local_addr()`
    /// est connu et les requêtes sont acceptées.
    pub async fn start(&mut self) -> std::io::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.bind_addr).await?;
        let local_addr = listener.local_addr()?;
        self.local_addr = Some(local_addr);
        info!("{} listening on http://{}", self.name, local_addr);

        let mut router = self.router.read().await.clone();

        let default_headers = Arc::new(self.default_headers.clone());
        let log_headers = self.log_headers;
        router = router.layer(axum::middleware::from_fn(
            move |req: Request, next: Next| {
                let default_headers = Arc::clone(&default_headers);
                async move {
                    if log_headers {
                        debug!("{} {} {:?}", req.method(), req.uri(), req.headers());
                    }
                    let mut res: Response = next.run(req).await;
                    for (name, value) in default_headers.iter() {
                        res.headers_mut().insert(name.clone(), value.clone());
                    }
                    if log_headers {
                        debug!("-> {} {:?}", res.status(), res.headers());
                    }
                    res
                }
            },
        ));

        let shutdown_token = self.shutdown_token.clone();
        self.join_handle = Some(tokio::spawn(async move {
            let result = axum::serve(listener, router.into_make_service_with_connect_info::<SocketAddr>())
                .with_graceful_shutdown(async move {
                    shutdown_token.cancelled().await;
                })
                .await;
            if let Err(err) = result {
                error!("HTTP server terminated with an error: {}", err);
            }
        }));
        Ok(())
    }

    /// Attend la fin du serveur.
    pub async fn wait(&mut self) {
        if let Some(h) = self.join_handle.take() {
            let _ = h.await;
        }
    }

    /// Signale l'arrêt et attend la fin du serveur HTTP.
    pub async fn close(&mut self) {
        self.shutdown_token.cancel();
        self.wait().await;
    }

    /// Adresse effective après `start()`.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Port HTTP effectif après `start()`, sinon le port demandé.
    pub fn http_port(&self) -> u16 {
        self.local_addr
            .map(|a| a.port())
            .unwrap_or_else(|| self.bind_addr.port())
    }
}

/// Builder pattern
pub struct ServerBuilder {
    name: String,
    bind_addr: SocketAddr,
}

impl ServerBuilder {
    pub fn new(name: impl Into<String>, bind_addr: SocketAddr) -> Self {
        Self {
            name: name.into(),
            bind_addr,
        }
    }

    /// Construit le serveur prêt à recevoir ses routes.
    pub fn build(self) -> Server {
        Server::new(self.name, self.bind_addr)
    }
}
