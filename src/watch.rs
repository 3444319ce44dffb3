//! Rebuilds the site whenever its sources change.

use crate::build::build_site;
use crate::config::Config;
use notify_debouncer_full::notify::{self, RecursiveMode, Watcher};
use notify_debouncer_full::{new_debouncer, DebounceEventResult, DebouncedEvent};
use std::fmt;
use std::path::Path;
use std::sync::mpsc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

/// How long the file-system debouncer collects events before reporting.
const EVENT_COLLECTION_WINDOW: Duration = Duration::from_millis(200);

/// Admits at most one rebuild per interval. Triggers arriving inside the
/// interval after an admitted one are dropped.
#[derive(Clone, Debug)]
pub struct RebuildGate {
    interval: Duration,
    last: Option<Instant>,
}

impl RebuildGate {
    pub fn new(interval: Duration) -> RebuildGate {
        RebuildGate {
            interval,
            last: None,
        }
    }

    /// Returns whether a trigger at `now` should rebuild, and if so records
    /// it.
    pub fn should_rebuild(&mut self, now: Instant) -> bool {
        match self.last {
            Some(last) if now.saturating_duration_since(last) < self.interval => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }
}

/// Returns whether a change to `path` should trigger a rebuild. Editor
/// lock and backup files (`.#*`, `*~`) and anything in the output
/// directory are ignored.
pub fn is_relevant(path: &Path, output_dir: &Path) -> bool {
    if path.starts_with(output_dir) {
        return false;
    }
    !path
        .file_name()
        .and_then(|name| name.to_str())
        .map_or(false, |name| name.starts_with(".#") || name.ends_with('~'))
}

fn is_relevant_event(event: &DebouncedEvent, output_dir: &Path) -> bool {
    let kind = &event.event.kind;
    (kind.is_create() || kind.is_modify() || kind.is_remove())
        && event.event.paths.iter().any(|p| is_relevant(p, output_dir))
}

/// Builds the site, then rebuilds it after every relevant change to the
/// content, templates or static directories, at most once per
/// `config.watch_debounce`. Build errors are logged and watching
/// continues. Returns only if watching fails.
pub fn watch(config: &Config) -> Result<()> {
    rebuild(config);

    let (tx, rx) = mpsc::channel::<DebounceEventResult>();
    let mut debouncer = new_debouncer(EVENT_COLLECTION_WINDOW, None, tx)?;
    for dir in [&config.content_dir, &config.templates_dir, &config.static_dir] {
        if dir.is_dir() {
            debouncer.watcher().watch(dir, RecursiveMode::Recursive)?;
            debouncer.cache().add_root(dir, RecursiveMode::Recursive);
            info!(dir = %dir.display(), "watching");
        }
    }

    let mut gate = RebuildGate::new(config.watch_debounce);
    for result in rx {
        match result {
            Ok(events) => {
                let changed: Vec<&Path> = events
                    .iter()
                    .filter(|e| is_relevant_event(e, &config.output_dir))
                    .flat_map(|e| e.event.paths.iter().map(|p| p.as_path()))
                    .collect();
                if changed.is_empty() {
                    continue;
                }
                if !gate.should_rebuild(Instant::now()) {
                    debug!("change within debounce interval; skipping rebuild");
                    continue;
                }
                info!(paths = ?changed, "change detected");
                rebuild(config);
            }
            Err(errors) => {
                for err in errors {
                    error!("watcher error: {}", err);
                }
            }
        }
    }
    Ok(())
}

fn rebuild(config: &Config) {
    if let Err(err) = build_site(config) {
        error!("build failed: {}", err);
    }
}

/// The result of watching.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents a failure to set up file watching.
#[derive(Debug)]
pub enum Error {
    Notify(notify::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Notify(err) => write!(f, "watching sources: {}", err),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Notify(err) => Some(err),
        }
    }
}

impl From<notify::Error> for Error {
    fn from(err: notify::Error) -> Error {
        Error::Notify(err)
    }
}
