//! File watcher for the config file
//!
//! Watches the directory holding the config file and signals a reload when
//! the file is created, modified or replaced. Editors often save by
//! renaming a temp file over the original, so the parent directory is
//! watched rather than the file itself.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::sleep;

/// Debounce window for file system events
const DEBOUNCE_MS: u64 = 500;

/// Start watching `config_path`.
///
/// Spawns a background task that sends on `reload_tx` once per burst of
/// changes (500ms debounce). Returns immediately; abort the handle to stop.
pub fn start_config_watcher(config_path: PathBuf, reload_tx: mpsc::Sender<()>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let (dir, file_name) = match split_config_path(&config_path) {
            Some(parts) => parts,
            None => {
                log::warn!(
                    "Watcher: cannot watch {}, config reload disabled",
                    config_path.display()
                );
                return;
            }
        };

        // Channel for forwarding notify events to the async debouncer
        let (fs_tx, mut fs_rx) = mpsc::channel::<()>(64);

        let mut watcher = match RecommendedWatcher::new(
            move |result: Result<Event, notify::Error>| {
                if let Ok(event) = result {
                    if is_config_event(&event, &file_name) {
                        let _ = fs_tx.try_send(());
                    }
                }
            },
            notify::Config::default(),
        ) {
            Ok(w) => w,
            Err(e) => {
                log::error!("Watcher: failed to create filesystem watcher: {}", e);
                return;
            }
        };

        if let Err(e) = watcher.watch(&dir, RecursiveMode::NonRecursive) {
            log::error!("Watcher: failed to watch {}: {}", dir.display(), e);
            return;
        }

        log::info!("Watcher: watching {} for changes", config_path.display());

        loop {
            if fs_rx.recv().await.is_none() {
                break;
            }

            // Debounce: drain any events that arrive within the window
            sleep(Duration::from_millis(DEBOUNCE_MS)).await;
            while fs_rx.try_recv().is_ok() {}

            log::debug!("Watcher: config changed");
            if reload_tx.send(()).await.is_err() {
                break;
            }
        }

        log::info!("Watcher: stopped");
    })
}

fn split_config_path(path: &Path) -> Option<(PathBuf, OsString)> {
    let file_name = path.file_name()?.to_os_string();
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    Some((dir, file_name))
}

/// Create/modify/remove events touching the config file
fn is_config_event(event: &Event, file_name: &OsString) -> bool {
    matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    ) && event
        .paths
        .iter()
        .any(|p| p.file_name() == Some(file_name.as_os_str()))
}
