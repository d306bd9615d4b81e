//! Lazy-SMP worker pool.
//!
//! Workers are persistent OS threads parked on a condition variable between
//! searches. Each owns its own `SearchThread` (histories, stacks, Finny
//! cache); the transposition table, tablebases, stop flag, and settings are
//! shared through a per-search [`SharedContext`]. The main worker (index 0)
//! coordinates: it stops the others when its own deepening ends, waits for
//! them, and announces the best move after vote-based thread selection.

use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::{Condvar, Mutex};

use crate::board::types::{Move, Score, SCORE_NONE};
use crate::search::{self, SearchThread, Settings, SharedContext};
use crate::tb::Tablebases;
use crate::tt::TranspositionTable;

/// One published principal variation of a worker, for info output and
/// best-thread voting.
#[derive(Clone)]
pub struct RootLine {
    pub mv: Move,
    pub score: Score,
    pub pv: Vec<Move>,
}

impl Default for RootLine {
    fn default() -> Self {
        RootLine {
            mv: Move::NONE,
            score: SCORE_NONE,
            pv: Vec::new(),
        }
    }
}

#[derive(Default)]
struct Signal {
    searching: bool,
    exit: bool,
}

/// The shared face of one worker: wake-up signal, counters, and the root
/// lines it has completed.
pub struct WorkerLink {
    signal: Mutex<Signal>,
    cv: Condvar,
    pub nodes: AtomicU64,
    pub tb_hits: AtomicU64,
    pub complete_depth: AtomicI32,
    pub lines: Mutex<Vec<RootLine>>,
    pub reset_histories: AtomicBool,
}

impl WorkerLink {
    fn new() -> WorkerLink {
        WorkerLink {
            signal: Mutex::new(Signal::default()),
            cv: Condvar::new(),
            nodes: AtomicU64::new(0),
            tb_hits: AtomicU64::new(0),
            complete_depth: AtomicI32::new(0),
            lines: Mutex::new(Vec::new()),
            reset_histories: AtomicBool::new(false),
        }
    }

    fn wake(&self) {
        let mut signal = self.signal.lock();
        signal.searching = true;
        drop(signal);
        self.cv.notify_all();
    }

    /// Block until this worker has finished its current search.
    pub fn wait_idle(&self) {
        let mut signal = self.signal.lock();
        while signal.searching {
            self.cv.wait(&mut signal);
        }
    }
}

pub struct ThreadPool {
    links: Arc<Vec<Arc<WorkerLink>>>,
    handles: Vec<JoinHandle<()>>,
    job: Arc<Mutex<Option<SharedContext>>>,
    stop: Arc<AtomicBool>,
}

impl ThreadPool {
    #[must_use]
    pub fn new(thread_count: usize) -> ThreadPool {
        let mut pool = ThreadPool {
            links: Arc::new(Vec::new()),
            handles: Vec::new(),
            job: Arc::new(Mutex::new(None)),
            stop: Arc::new(AtomicBool::new(false)),
        };
        pool.set_thread_count(thread_count);
        pool
    }

    /// Tear down the current workers and spawn `thread_count` fresh ones.
    pub fn set_thread_count(&mut self, thread_count: usize) {
        self.wait_for_search_finished();

        for link in self.links.iter() {
            link.signal.lock().exit = true;
            link.cv.notify_all();
        }
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }

        let links: Vec<Arc<WorkerLink>> =
            (0..thread_count.max(1)).map(|_| Arc::new(WorkerLink::new())).collect();
        self.links = Arc::new(links);

        for (index, link) in self.links.iter().enumerate() {
            let link = Arc::clone(link);
            let job = Arc::clone(&self.job);
            let handle = std::thread::Builder::new()
                .name(format!("search-{index}"))
                .stack_size(8 * 1024 * 1024)
                .spawn(move || worker_loop(index, link, job))
                .expect("failed to spawn search worker");
            self.handles.push(handle);
        }
    }

    #[must_use]
    pub fn thread_count(&self) -> usize {
        self.links.len()
    }

    /// Kick off a search on every worker. Returns immediately; the main
    /// worker prints `bestmove` when done.
    pub fn start_search(&self, settings: Settings, tt: Arc<TranspositionTable>, tb: Arc<Tablebases>) {
        self.wait_for_search_finished();

        self.stop.store(false, Ordering::Relaxed);
        for link in self.links.iter() {
            link.nodes.store(0, Ordering::Relaxed);
            link.tb_hits.store(0, Ordering::Relaxed);
            link.complete_depth.store(0, Ordering::Relaxed);
            link.lines.lock().clear();
        }

        let ctx = SharedContext {
            tt,
            tb,
            settings: Arc::new(settings),
            workers: Arc::clone(&self.links),
            stop: Arc::clone(&self.stop),
        };
        *self.job.lock() = Some(ctx);

        for link in self.links.iter() {
            link.wake();
        }
    }

    pub fn stop_search(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }

    /// Block until every worker is idle.
    pub fn wait_for_search_finished(&self) {
        for link in self.links.iter() {
            link.wait_idle();
        }
    }

    /// Have every worker clear its histories before the next search.
    pub fn reset_histories(&self) {
        for link in self.links.iter() {
            link.reset_histories.store(true, Ordering::Relaxed);
        }
    }

    #[must_use]
    pub fn total_nodes(&self) -> u64 {
        self.links.iter().map(|l| l.nodes.load(Ordering::Relaxed)).sum()
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.stop_search();
        for link in self.links.iter() {
            link.signal.lock().exit = true;
            link.cv.notify_all();
        }
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
    }
}

/// Run a search on the calling thread and return the best line found.
/// Test and tooling entry point; the engine proper goes through
/// [`ThreadPool`].
#[must_use]
pub fn search_sync(
    settings: Settings,
    tt: Arc<TranspositionTable>,
    tb: Arc<Tablebases>,
) -> RootLine {
    let link = Arc::new(WorkerLink::new());
    let ctx = SharedContext {
        tt,
        tb,
        settings: Arc::new(settings),
        workers: Arc::new(vec![Arc::clone(&link)]),
        stop: Arc::new(AtomicBool::new(false)),
    };

    let mut thread = SearchThread::new(0, Arc::clone(&link), ctx);
    search::run(&mut thread);

    let lines = link.lines.lock();
    lines.first().cloned().unwrap_or_default()
}

fn worker_loop(index: usize, link: Arc<WorkerLink>, job: Arc<Mutex<Option<SharedContext>>>) {
    let mut thread: Option<SearchThread> = None;

    loop {
        {
            let mut signal = link.signal.lock();
            while !signal.searching && !signal.exit {
                link.cv.wait(&mut signal);
            }
            if signal.exit {
                return;
            }
        }

        let ctx = job
            .lock()
            .clone()
            .expect("search started without a context");

        let worker = thread
            .get_or_insert_with(|| SearchThread::new(index, Arc::clone(&link), ctx.clone()));
        worker.ctx = ctx;

        if link.reset_histories.swap(false, Ordering::Relaxed) {
            worker.reset_histories();
        }

        search::run(worker);

        let mut signal = link.signal.lock();
        signal.searching = false;
        drop(signal);
        link.cv.notify_all();
    }
}
