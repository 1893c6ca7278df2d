//! Development server implementation.
//!
//! Serves the development build from disk (assets stay separate files for
//! incremental rebuilds), rebuilds on source changes, and tells connected
//! browsers to reload.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use tower_http::services::ServeDir;

use embedforge_build::{BuildConfig, Builder};

use crate::watcher::{FileWatcher, WatchEvent};
use crate::websocket::{hmr_client_script, HmrHub, HmrMessage};

/// Configuration for the development server.
#[derive(Debug, Clone)]
pub struct DevServerConfig {
    /// Project root (the directory holding `embed.toml`)
    pub project_dir: PathBuf,

    /// Port to listen on
    pub port: u16,

    /// Host to bind to
    pub host: String,

    /// Open browser on start
    pub open: bool,
}

impl Default for DevServerConfig {
    fn default() -> Self {
        Self {
            project_dir: PathBuf::from("."),
            port: 8080,
            host: "127.0.0.1".to_string(),
            open: true,
        }
    }
}

/// Errors that can occur with the server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Failed to bind to {0}: {1}")]
    BindError(SocketAddr, String),

    #[error("File watch error: {0}")]
    WatchError(String),
}

/// Shared server state.
struct ServerState {
    config: DevServerConfig,
    build: BuildConfig,
    hmr: HmrHub,
}

/// Development server.
pub struct DevServer {
    config: DevServerConfig,
    build: BuildConfig,
}

impl DevServer {
    /// Create a new development server around a development build config.
    pub fn new(config: DevServerConfig, build: BuildConfig) -> Self {
        Self { config, build }
    }

    /// Start the development server.
    pub async fn start(self) -> Result<(), ServerError> {
        let addr: SocketAddr = format!("{}:{}", self.config.host, self.config.port)
            .parse()
            .expect("Invalid address");

        // Initial build so there is something to serve; a broken project
        // keeps the server up and reports again on the next change.
        match Builder::new(self.build.clone()).build() {
            Ok(result) => tracing::info!(
                "initial build: {} document(s), {} asset(s)",
                result.documents,
                result.assets
            ),
            Err(e) => tracing::warn!("initial build failed: {e}"),
        }

        let output_dir = self.build.output_dir.clone();
        let state = Arc::new(ServerState {
            config: self.config.clone(),
            build: self.build.clone(),
            hmr: HmrHub::new(),
        });

        // Watch entry sources, templates and the project file.
        let watch_paths = vec![
            self.build.src_dir.clone(),
            self.config.project_dir.join("embed.toml"),
        ];

        let (watcher, mut rx) =
            FileWatcher::new(&watch_paths).map_err(|e| ServerError::WatchError(e.to_string()))?;

        let state_clone = Arc::clone(&state);
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                handle_watch_event(&state_clone, event).await;
            }
            // Keep watcher alive
            drop(watcher);
        });

        let app = Router::new()
            .route("/__hmr", get(ws_handler))
            .route("/__hmr.js", get(hmr_script_handler))
            .fallback_service(ServeDir::new(&output_dir))
            .with_state(state);

        tracing::info!("Starting dev server at http://{}", addr);

        if self.config.open {
            let url = format!("http://{}", addr);
            let _ = open::that(&url);
        }

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::BindError(addr, e.to_string()))?;

        axum::serve(listener, app)
            .await
            .map_err(|e| ServerError::BindError(addr, e.to_string()))?;

        Ok(())
    }
}

/// Rebuild on a watch event and notify clients.
async fn handle_watch_event(state: &Arc<ServerState>, event: WatchEvent) {
    match &event {
        WatchEvent::ScriptChanged(path) => tracing::info!("script changed: {}", path.display()),
        WatchEvent::StylesheetChanged(path) => {
            tracing::info!("stylesheet changed: {}", path.display())
        }
        WatchEvent::TemplateChanged(path) => tracing::info!("template changed: {}", path.display()),
        WatchEvent::ConfigChanged(path) => tracing::info!("config changed: {}", path.display()),
        WatchEvent::Changed(path) => tracing::debug!("changed: {}", path.display()),
    }

    let build = state.build.clone();
    match tokio::task::spawn_blocking(move || Builder::new(build).build()).await {
        Ok(Ok(result)) => {
            tracing::info!("rebuilt in {}ms", result.duration_ms);
            state.hmr.send(HmrMessage::Reload);
        }
        Ok(Err(e)) => {
            tracing::warn!("rebuild failed: {e}");
            state.hmr.send(HmrMessage::BuildFailed {
                message: e.to_string(),
            });
        }
        Err(e) => tracing::error!("rebuild task panicked: {e}"),
    }
}

/// Handler for the reload WebSocket endpoint.
async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<ServerState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws(socket, state))
}

/// Handle a WebSocket connection.
async fn handle_ws(mut socket: WebSocket, state: Arc<ServerState>) {
    let mut rx = state.hmr.subscribe();

    let msg = serde_json::to_string(&HmrMessage::Connected).unwrap();
    if socket.send(Message::Text(msg.into())).await.is_err() {
        return;
    }

    // Forward reload messages to the client
    while let Ok(hmr_msg) = rx.recv().await {
        let json = serde_json::to_string(&hmr_msg).unwrap();
        if socket.send(Message::Text(json.into())).await.is_err() {
            break;
        }
    }
}

/// Handler for the reload client script.
async fn hmr_script_handler(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    let ws_url = format!(
        "ws://{}:{}/__hmr",
        state.config.host, state.config.port
    );
    let script = hmr_client_script(&ws_url);
    ([("content-type", "application/javascript")], script)
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedforge_build::{Mode, Params, ProjectConfig};
    use std::collections::BTreeMap;
    use std::path::Path;

    #[test]
    fn default_config_binds_loopback() {
        let config = DevServerConfig::default();
        assert_eq!(config.port, 8080);
        assert_eq!(config.host, "127.0.0.1");
        assert!(config.open);
    }

    #[test]
    fn carries_a_development_build_config() {
        let build = BuildConfig::new(
            Path::new("."),
            ProjectConfig::default(),
            Mode::Development,
            Params::resolve(&BTreeMap::new(), |_| None),
        );

        let server = DevServer::new(DevServerConfig::default(), build);

        assert!(server.build.mode.is_development());
        assert_eq!(server.config.port, 8080);
    }
}
