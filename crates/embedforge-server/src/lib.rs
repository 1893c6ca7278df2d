//! Development server with hot reload for embedforge projects.
//!
//! Serves the development build output, watches the project sources, and
//! pushes reload messages to connected browsers over a WebSocket.

pub mod server;
pub mod watcher;
pub mod websocket;

pub use server::{DevServer, DevServerConfig, ServerError};
pub use watcher::{FileWatcher, WatchEvent};
pub use websocket::{HmrHub, HmrMessage};
