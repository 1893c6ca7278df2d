//! File watching for rebuild-on-change.

use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::Duration;

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc as async_mpsc;

/// Events emitted by the file watcher.
#[derive(Debug, Clone)]
pub enum WatchEvent {
    /// An entry script changed
    ScriptChanged(PathBuf),

    /// A stylesheet changed
    StylesheetChanged(PathBuf),

    /// A document template changed
    TemplateChanged(PathBuf),

    /// The project file changed
    ConfigChanged(PathBuf),

    /// Anything else under a watched path
    Changed(PathBuf),
}

/// File watcher for detecting project changes.
pub struct FileWatcher {
    _watcher: RecommendedWatcher,
}

impl FileWatcher {
    /// Create a new file watcher for the given paths.
    ///
    /// Returns the watcher and a channel to receive events.
    pub fn new(
        paths: &[PathBuf],
    ) -> Result<(Self, async_mpsc::Receiver<WatchEvent>), std::io::Error> {
        let (sync_tx, sync_rx) = mpsc::channel();
        let (async_tx, async_rx) = async_mpsc::channel(100);

        let mut watcher = notify::recommended_watcher(move |res: Result<notify::Event, _>| {
            if let Ok(event) = res {
                let _ = sync_tx.send(event);
            }
        })
        .map_err(std::io::Error::other)?;

        for path in paths {
            if path.exists() {
                watcher
                    .watch(path, RecursiveMode::Recursive)
                    .map_err(std::io::Error::other)?;
            }
        }

        // Forward events with a debounce; editors fire bursts of writes.
        let async_tx_clone = async_tx.clone();
        std::thread::spawn(move || {
            let mut last_event_time = std::time::Instant::now();
            let debounce_duration = Duration::from_millis(100);

            while let Ok(event) = sync_rx.recv() {
                let now = std::time::Instant::now();
                if now.duration_since(last_event_time) < debounce_duration {
                    continue;
                }
                last_event_time = now;

                for path in event.paths {
                    if let Some(e) = classify_event(&path, &event.kind) {
                        let _ = async_tx_clone.blocking_send(e);
                    }
                }
            }
        });

        Ok((Self { _watcher: watcher }, async_rx))
    }
}

/// Classify a notify event into a WatchEvent.
fn classify_event(path: &Path, kind: &notify::EventKind) -> Option<WatchEvent> {
    use notify::EventKind;

    if !matches!(
        kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    ) {
        return None;
    }

    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    let event = match ext {
        "js" => WatchEvent::ScriptChanged(path.to_path_buf()),
        "css" => WatchEvent::StylesheetChanged(path.to_path_buf()),
        "html" => WatchEvent::TemplateChanged(path.to_path_buf()),
        "toml" => WatchEvent::ConfigChanged(path.to_path_buf()),
        _ => WatchEvent::Changed(path.to_path_buf()),
    };
    Some(event)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[tokio::test]
    async fn watches_file_changes() {
        let temp = tempdir().unwrap();
        let test_file = temp.path().join("main.js");

        // Create the watcher first (so it catches file creation)
        let (watcher, mut rx) = FileWatcher::new(&[temp.path().to_path_buf()]).unwrap();

        // Give inotify time to set up
        tokio::time::sleep(Duration::from_millis(100)).await;

        fs::write(&test_file, "init();").unwrap();

        let event = tokio::time::timeout(Duration::from_secs(3), rx.recv()).await;

        drop(watcher);

        assert!(event.is_ok(), "timeout waiting for file watch event");
        assert!(event.unwrap().is_some(), "channel should not be closed");
    }

    #[test]
    fn classifies_by_extension() {
        use notify::{event::ModifyKind, EventKind};
        let kind = EventKind::Modify(ModifyKind::Any);

        assert!(matches!(
            classify_event(Path::new("src/main.js"), &kind),
            Some(WatchEvent::ScriptChanged(_))
        ));
        assert!(matches!(
            classify_event(Path::new("src/demo.css"), &kind),
            Some(WatchEvent::StylesheetChanged(_))
        ));
        assert!(matches!(
            classify_event(Path::new("src/index.html"), &kind),
            Some(WatchEvent::TemplateChanged(_))
        ));
        assert!(matches!(
            classify_event(Path::new("embed.toml"), &kind),
            Some(WatchEvent::ConfigChanged(_))
        ));
    }
}
