//! WebSocket-based hot reload.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Messages sent to clients after a rebuild.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HmrMessage {
    /// Full page reload after a successful rebuild
    Reload,

    /// The rebuild failed; the browser keeps the last good artifacts
    BuildFailed {
        /// Error rendered for the browser console
        message: String,
    },

    /// Connection established
    Connected,
}

/// Hub for broadcasting reload messages to all connected clients.
#[derive(Debug, Clone)]
pub struct HmrHub {
    sender: broadcast::Sender<HmrMessage>,
}

impl HmrHub {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(100);
        Self { sender }
    }

    /// Send a message to all connected clients.
    pub fn send(&self, msg: HmrMessage) {
        // Ignore send errors (no receivers)
        let _ = self.sender.send(msg);
    }

    /// Subscribe to reload messages.
    pub fn subscribe(&self) -> broadcast::Receiver<HmrMessage> {
        self.sender.subscribe()
    }

    /// Get the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for HmrHub {
    fn default() -> Self {
        Self::new()
    }
}

/// Generate the client-side reload script served at `/__hmr.js`.
///
/// Development builds inject a tag pointing here; production artifacts
/// never reference it.
pub fn hmr_client_script(ws_url: &str) -> String {
    format!(
        r#"
(function() {{
  'use strict';

  const ws = new WebSocket('{}');
  let reconnectAttempts = 0;
  const maxReconnectAttempts = 10;

  ws.onopen = function() {{
    console.log('[HMR] Connected');
    reconnectAttempts = 0;
  }};

  ws.onmessage = function(event) {{
    const msg = JSON.parse(event.data);
    console.log('[HMR]', msg.type);

    switch (msg.type) {{
      case 'reload':
        location.reload();
        break;

      case 'build_failed':
        console.error('[HMR] Build failed:\n' + msg.message);
        break;

      case 'connected':
        console.log('[HMR] Server acknowledged connection');
        break;
    }}
  }};

  ws.onclose = function() {{
    console.log('[HMR] Disconnected');
    if (reconnectAttempts < maxReconnectAttempts) {{
      reconnectAttempts++;
      setTimeout(function() {{
        console.log('[HMR] Reconnecting...');
        location.reload();
      }}, 1000 * reconnectAttempts);
    }}
  }};

  ws.onerror = function(e) {{
    console.error('[HMR] WebSocket error:', e);
  }};
}})();
"#,
        ws_url
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hub_broadcasts_messages() {
        let hub = HmrHub::new();
        let mut rx = hub.subscribe();

        hub.send(HmrMessage::Reload);

        match rx.try_recv() {
            Ok(HmrMessage::Reload) => {}
            _ => panic!("Expected Reload message"),
        }
    }

    #[test]
    fn serializes_build_failures() {
        let msg = HmrMessage::BuildFailed {
            message: "missing value for parameter `HashId`".to_string(),
        };

        let json = serde_json::to_string(&msg).unwrap();

        assert!(json.contains("build_failed"));
        assert!(json.contains("HashId"));
    }

    #[test]
    fn client_script_targets_the_socket_url() {
        let script = hmr_client_script("ws://127.0.0.1:8333/__hmr");

        assert!(script.contains("ws://127.0.0.1:8333/__hmr"));
        assert!(script.contains("location.reload"));
    }
}
