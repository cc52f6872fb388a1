//! File system watcher for preview rebuilds.
//!
//! Monitors page, layout and stylesheet sources and runs the pipeline of the
//! broadest scope touched by each batch of changes.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      Event Loop                              │
//! │                                                              │
//! │  ┌──────────┐    ┌──────────┐    ┌────────────────────────┐  │
//! │  │ notify   │───▶│ Debouncer│───▶│   broadest_scope()     │  │
//! │  │ events   │    │ (300ms)  │    └───────────┬────────────┘  │
//! │  └──────────┘    └──────────┘                │               │
//! │                                              ▼               │
//! │                               ┌────────────────────────────┐ │
//! │                               │ RebuildQueue (per scope)   │ │
//! │                               │ one run at a time, one     │ │
//! │                               │ follow-up run queued       │ │
//! │                               └─────────────┬──────────────┘ │
//! │                                             ▼                │
//! │                        workspace lock → pipeline → reload    │
//! └──────────────────────────────────────────────────────────────┘
//! ```

use crate::{
    build::{BuildContext, run_pipeline},
    log,
    pipeline::Pipeline,
    reload::ReloadHub,
    utils::category::{WatchScope, broadest_scope},
};
use anyhow::{Context, Result};
use notify::{Event, EventKind, RecursiveMode, Watcher};
use parking_lot::Mutex;
use rustc_hash::FxHashSet;
use std::{
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
        mpsc::{RecvTimeoutError, channel},
    },
    thread,
    time::{Duration, Instant},
};

// =============================================================================
// Constants
// =============================================================================

const DEBOUNCE_MS: u64 = 300;

// =============================================================================
// Path Utilities
// =============================================================================

/// Check if path is a temp/backup file (editor artifacts).
fn is_temp_file(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    matches!(ext, "bck" | "bak" | "backup" | "swp" | "swo" | "tmp")
        || name.ends_with('~')
        || name.starts_with('.')
}

/// Log a build failure with error details.
fn log_build_error(scope: WatchScope, err: &anyhow::Error) {
    log!("watch"; "{} rebuild failed", scope.name());
    log!("watch"; "{err:#}");
}

// =============================================================================
// Debounce State
// =============================================================================

/// Batches rapid file events.
struct Debouncer {
    pending: FxHashSet<PathBuf>,
    last_event: Option<Instant>,
}

impl Debouncer {
    fn new() -> Self {
        Self {
            pending: FxHashSet::default(),
            last_event: None,
        }
    }

    fn add(&mut self, event: Event) {
        for path in event.paths {
            if !is_temp_file(&path) {
                self.pending.insert(path);
            }
        }
        self.last_event = Some(Instant::now());
    }

    fn ready(&self) -> bool {
        !self.pending.is_empty()
            && self
                .last_event
                .is_some_and(|t| t.elapsed() >= Duration::from_millis(DEBOUNCE_MS))
    }

    fn take(&mut self) -> Vec<PathBuf> {
        self.last_event = None;
        self.pending.drain().collect()
    }

    fn timeout(&self) -> Duration {
        if self.pending.is_empty() {
            Duration::from_secs(60)
        } else {
            Duration::from_millis(DEBOUNCE_MS)
        }
    }
}

// =============================================================================
// Rebuild Queue
// =============================================================================

/// Run state of one scope.
///
/// At most one run is active. Triggers that arrive during a run collapse
/// into a single follow-up run.
#[derive(Default)]
struct RebuildQueue {
    running: AtomicBool,
    pending: AtomicBool,
}

impl RebuildQueue {
    /// Run until no trigger is left. The caller must own `running`.
    fn drain(&self, run: impl Fn()) {
        loop {
            while self.pending.swap(false, Ordering::SeqCst) {
                run();
            }
            self.running.store(false, Ordering::SeqCst);

            // A trigger may have landed between the last run and the release
            if !self.pending.load(Ordering::SeqCst) || self.running.swap(true, Ordering::SeqCst) {
                break;
            }
        }
    }

    #[cfg(test)]
    fn is_idle(&self) -> bool {
        !self.running.load(Ordering::SeqCst) && !self.pending.load(Ordering::SeqCst)
    }
}

/// Dispatches scope rebuilds to background threads, one queue per scope.
struct Scheduler<F> {
    queues: [Arc<RebuildQueue>; 3],
    run: Arc<F>,
}

impl<F> Scheduler<F>
where
    F: Fn(WatchScope) + Send + Sync + 'static,
{
    fn new(run: F) -> Self {
        Self {
            queues: Default::default(),
            run: Arc::new(run),
        }
    }

    fn queue(&self, scope: WatchScope) -> &Arc<RebuildQueue> {
        &self.queues[scope as usize]
    }

    /// Request a rebuild of `scope`, starting a worker if none is active.
    fn trigger(&self, scope: WatchScope) {
        let queue = self.queue(scope);
        queue.pending.store(true, Ordering::SeqCst);
        if queue.running.swap(true, Ordering::SeqCst) {
            return;
        }

        let queue = Arc::clone(queue);
        let run = Arc::clone(&self.run);
        thread::spawn(move || queue.drain(|| run(scope)));
    }

    #[cfg(test)]
    fn is_idle(&self) -> bool {
        self.queues.iter().all(|q| q.is_idle())
    }
}

/// Rebuild one scope under the workspace lock and notify pages on success.
fn rebuild(ctx: &BuildContext, workspace: &Mutex<()>, hub: Option<&ReloadHub>, scope: WatchScope) {
    let _guard = workspace.lock();
    log!("watch"; "{} changed, rebuilding...", scope.name());

    match run_pipeline(ctx, Pipeline::for_scope(scope)) {
        Ok(()) => {
            if let Some(hub) = hub {
                let clients = hub.reload();
                if clients > 0 {
                    log!("reload"; "reloaded {clients} page(s)");
                }
            }
        }
        Err(e) => log_build_error(scope, &e),
    }
    eprintln!(); // Blank line to separate rebuild sessions
}

// =============================================================================
// Watcher Setup
// =============================================================================

fn setup_watchers(watcher: &mut impl Watcher, ctx: &BuildContext) -> Result<()> {
    let build = &ctx.config.build;
    let root = ctx.config.get_root();

    for scope in WatchScope::ALL {
        let mut watched = Vec::new();
        for path in scope.paths(build) {
            if !path.is_dir() {
                continue;
            }
            watcher
                .watch(&path, RecursiveMode::Recursive)
                .with_context(|| format!("Failed to watch {}: {}", scope.name(), path.display()))?;
            let rel = path.strip_prefix(root).unwrap_or(&path);
            watched.push(format!("{}/", rel.display()));
        }
        if !watched.is_empty() {
            log!("watch"; "{}: {}", scope.name(), watched.join(", "));
        }
    }

    eprintln!(); // Blank line to separate init logs from change events
    Ok(())
}

const fn is_relevant(event: &Event) -> bool {
    matches!(
        event.kind,
        EventKind::Modify(_) | EventKind::Create(_) | EventKind::Remove(_)
    )
}

// =============================================================================
// Public API
// =============================================================================

/// Start blocking file watcher with debouncing and scoped rebuilds.
pub fn watch_for_changes_blocking(
    ctx: Arc<BuildContext>,
    hub: Option<Arc<ReloadHub>>,
) -> Result<()> {
    let (tx, rx) = channel();
    let mut watcher = notify::recommended_watcher(tx).context("Failed to create file watcher")?;
    setup_watchers(&mut watcher, &ctx)?;

    let build = &ctx.config.build;
    let workspace = Mutex::new(());
    let scheduler = {
        let ctx = Arc::clone(&ctx);
        Scheduler::new(move |scope| rebuild(&ctx, &workspace, hub.as_deref(), scope))
    };

    let mut debouncer = Debouncer::new();

    loop {
        match rx.recv_timeout(debouncer.timeout()) {
            Ok(Ok(event)) if is_relevant(&event) => debouncer.add(event),
            Ok(Err(e)) => log!("watch"; "error: {e}"),
            Err(RecvTimeoutError::Timeout) if debouncer.ready() => {
                if let Some(scope) = broadest_scope(&debouncer.take(), build) {
                    scheduler.trigger(scope);
                }
            }
            Err(RecvTimeoutError::Disconnected) => break,
            // Irrelevant events, timeout without pending changes
            _ => {}
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn wait_idle<F: Fn(WatchScope) + Send + Sync + 'static>(scheduler: &Scheduler<F>) {
        for _ in 0..500 {
            if scheduler.is_idle() {
                return;
            }
            thread::sleep(Duration::from_millis(10));
        }
        panic!("scheduler never went idle");
    }

    #[test]
    fn test_is_temp_file() {
        assert!(is_temp_file(Path::new("src/pages/a.html~")));
        assert!(is_temp_file(Path::new("src/pages/.a.html.swp")));
        assert!(is_temp_file(Path::new("src/pages/a.tmp")));
        assert!(!is_temp_file(Path::new("src/pages/a.html")));
    }

    #[test]
    fn test_debouncer_batches_paths() {
        let mut debouncer = Debouncer::new();
        assert_eq!(debouncer.timeout(), Duration::from_secs(60));

        let event = Event::new(EventKind::Any)
            .add_path(PathBuf::from("a.html"))
            .add_path(PathBuf::from("a.html"))
            .add_path(PathBuf::from("a.html~"));
        debouncer.add(event);
        assert!(!debouncer.ready());
        assert_eq!(debouncer.timeout(), Duration::from_millis(DEBOUNCE_MS));

        thread::sleep(Duration::from_millis(DEBOUNCE_MS + 20));
        assert!(debouncer.ready());
        assert_eq!(debouncer.take(), vec![PathBuf::from("a.html")]);
        assert!(!debouncer.ready());
    }

    #[test]
    fn test_burst_of_triggers_never_overlaps() {
        let runs = Arc::new(AtomicUsize::new(0));
        let active = Arc::new(AtomicUsize::new(0));
        let max_active = Arc::new(AtomicUsize::new(0));

        let scheduler = {
            let (runs, active, max_active) = (runs.clone(), active.clone(), max_active.clone());
            Scheduler::new(move |_| {
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                max_active.fetch_max(now, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(50));
                active.fetch_sub(1, Ordering::SeqCst);
                runs.fetch_add(1, Ordering::SeqCst);
            })
        };

        for _ in 0..10 {
            scheduler.trigger(WatchScope::Pages);
        }
        wait_idle(&scheduler);

        let runs = runs.load(Ordering::SeqCst);
        assert!((1..=2).contains(&runs), "unexpected run count {runs}");
        assert_eq!(max_active.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_trigger_after_run_starts_again() {
        let runs = Arc::new(AtomicUsize::new(0));
        let scheduler = {
            let runs = runs.clone();
            Scheduler::new(move |_| {
                runs.fetch_add(1, Ordering::SeqCst);
            })
        };

        scheduler.trigger(WatchScope::Styles);
        wait_idle(&scheduler);
        scheduler.trigger(WatchScope::Styles);
        wait_idle(&scheduler);

        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_scopes_have_separate_queues() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let scheduler = {
            let seen = seen.clone();
            Scheduler::new(move |scope| seen.lock().push(scope))
        };

        scheduler.trigger(WatchScope::Pages);
        scheduler.trigger(WatchScope::Layouts);
        wait_idle(&scheduler);

        let mut seen = seen.lock().clone();
        seen.sort();
        assert_eq!(seen, vec![WatchScope::Pages, WatchScope::Layouts]);
    }

    #[test]
    fn test_drain_picks_up_late_trigger() {
        let queue = RebuildQueue::default();
        queue.running.store(true, Ordering::SeqCst);
        queue.pending.store(true, Ordering::SeqCst);

        let count = AtomicUsize::new(0);
        queue.drain(|| {
            // Re-trigger once from inside the first run
            if count.fetch_add(1, Ordering::SeqCst) == 0 {
                queue.pending.store(true, Ordering::SeqCst);
            }
        });

        assert_eq!(count.load(Ordering::SeqCst), 2);
        assert!(queue.is_idle());
    }
}
