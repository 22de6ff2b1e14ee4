//! The notify-backed watcher pump: raw backend events in, [`FsEvent`]s out,
//! through a bounded queue with coalescing of consecutive modifications on
//! the same path.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::time::Duration;

use notify::event::{CreateKind, ModifyKind, RemoveKind, RenameMode};
use notify::{EventKind, RecursiveMode, Watcher};
use tracing::{debug, info, warn};

use super::{EventHandler, FsEvent, FsEventKind};
use crate::error::Error;

/// Bounded queue between the backend callback and the handler thread.
/// When full, events are dropped with a warning; the next scan or
/// integrity run reconverges.
const EVENT_QUEUE_CAPACITY: usize = 1024;

const FLUSH_INTERVAL: Duration = Duration::from_millis(200);

/// Watch the given paths and feed the handler until `stop` is set. Runs on
/// the calling thread.
pub fn run(paths: &[String], handler: &mut EventHandler, stop: Arc<AtomicBool>) -> Result<(), Error> {
    let (tx, rx) = mpsc::sync_channel::<FsEvent>(EVENT_QUEUE_CAPACITY);

    let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
        match res {
            Ok(event) => {
                for fs_event in translate(event) {
                    if tx.try_send(fs_event).is_err() {
                        warn!("Event queue full; dropping filesystem event");
                    }
                }
            }
            Err(err) => warn!("Watch backend error: {}", err),
        }
    })?;

    for path in paths {
        watcher.watch(Path::new(path), RecursiveMode::Recursive)?;
        info!("Watching {}", path);
    }

    // Consecutive modifications of the same path collapse into one handler
    // call; anything else flushes the pending modify first so ordering is
    // preserved.
    let mut pending_modify: Option<FsEvent> = None;
    while !stop.load(Ordering::Relaxed) {
        match rx.recv_timeout(FLUSH_INTERVAL) {
            Ok(event) => {
                if event.kind == FsEventKind::Modified {
                    match &pending_modify {
                        Some(pending) if pending.path == event.path => {
                            pending_modify = Some(event);
                            continue;
                        }
                        _ => {}
                    }
                    if let Some(pending) = pending_modify.take() {
                        handler.handle(pending);
                    }
                    pending_modify = Some(event);
                } else {
                    if let Some(pending) = pending_modify.take() {
                        handler.handle(pending);
                    }
                    handler.handle(event);
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                if let Some(pending) = pending_modify.take() {
                    handler.handle(pending);
                }
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    if let Some(pending) = pending_modify.take() {
        handler.handle(pending);
    }
    info!("Watcher stopped");
    Ok(())
}

/// Map one backend event to zero or more catalog events.
pub(crate) fn translate(event: notify::Event) -> Vec<FsEvent> {
    match event.kind {
        EventKind::Create(kind) => {
            let folder = kind == CreateKind::Folder;
            event
                .paths
                .into_iter()
                .map(|path| {
                    let is_dir = folder || path.is_dir();
                    FsEvent {
                        kind: FsEventKind::Created,
                        path,
                        is_dir,
                    }
                })
                .collect()
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            let mut paths = event.paths.into_iter();
            match (paths.next(), paths.next()) {
                (Some(from), Some(to)) => {
                    let is_dir = to.is_dir();
                    vec![FsEvent {
                        kind: FsEventKind::Moved { dest: to },
                        path: from,
                        is_dir,
                    }]
                }
                _ => Vec::new(),
            }
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => event
            .paths
            .into_iter()
            .map(|path| FsEvent {
                kind: FsEventKind::Deleted,
                path,
                is_dir: false,
            })
            .collect(),
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => event
            .paths
            .into_iter()
            .map(|path| {
                let is_dir = path.is_dir();
                FsEvent {
                    kind: FsEventKind::Created,
                    path,
                    is_dir,
                }
            })
            .collect(),
        EventKind::Modify(_) => event
            .paths
            .into_iter()
            .map(|path| {
                let is_dir = path.is_dir();
                FsEvent {
                    kind: FsEventKind::Modified,
                    path,
                    is_dir,
                }
            })
            .collect(),
        EventKind::Remove(kind) => {
            let folder = kind == RemoveKind::Folder;
            event
                .paths
                .into_iter()
                .map(|path| FsEvent {
                    kind: FsEventKind::Deleted,
                    path,
                    is_dir: folder,
                })
                .collect()
        }
        other => {
            debug!("Unhandled event kind: {:?}", other);
            Vec::new()
        }
    }
}
