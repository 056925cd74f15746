//! Fleet command fan-out
//!
//! One worker per server runs the command through a [`RemoteExecutor`] and
//! reports into a shared channel. [`FleetRun`] drains that channel and
//! yields outcomes in completion order. Every server produces exactly one
//! outcome: transport errors, panics and workers that vanish are all turned
//! into failures for that server only.

use crate::error::TransportError;
use crate::provider::RemoteExecutor;
use crate::types::{CommandOutcome, Server, WorkerState};
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// How often the aggregator wakes up while workers are still running
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// How many workers may run at once
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerLimit {
    /// One OS thread per server
    Unbounded,
    /// A thread pool of this size
    Bounded(usize),
}

impl WorkerLimit {
    /// `0` means unbounded
    pub fn from_jobs(jobs: usize) -> Self {
        if jobs == 0 {
            Self::Unbounded
        } else {
            Self::Bounded(jobs)
        }
    }
}

/// Options for [`run_on_fleet`]
#[derive(Debug, Clone)]
pub struct FanoutOptions {
    pub workers: WorkerLimit,
    pub poll_interval: Duration,
}

impl Default for FanoutOptions {
    fn default() -> Self {
        Self {
            workers: WorkerLimit::Unbounded,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// Snapshot of worker states
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerCounts {
    pub pending: usize,
    pub running: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl WorkerCounts {
    pub fn done(&self) -> usize {
        self.succeeded + self.failed
    }
}

enum Event {
    Started(usize),
    Finished(usize, CommandOutcome),
}

/// A running fan-out. Iterating yields one [`CommandOutcome`] per server.
pub struct FleetRun {
    rx: Receiver<Event>,
    labels: Vec<(String, String)>,
    states: Vec<WorkerState>,
    handles: Vec<Option<JoinHandle<()>>>,
    ready: VecDeque<CommandOutcome>,
    outstanding: usize,
    poll_interval: Duration,
    // keeps pool threads alive until the run is dropped
    _pool: Option<rayon::ThreadPool>,
}

/// Run `command` on every server concurrently.
///
/// Workers start immediately; the returned [`FleetRun`] streams their
/// outcomes as they complete. If a bounded pool cannot be built the run
/// falls back to one thread per server.
pub fn run_on_fleet(
    executor: Arc<dyn RemoteExecutor>,
    servers: &[Server],
    command: &str,
    options: &FanoutOptions,
) -> FleetRun {
    let (tx, rx) = mpsc::channel();
    let command: Arc<str> = Arc::from(command);

    let pool = match options.workers {
        WorkerLimit::Unbounded => None,
        WorkerLimit::Bounded(jobs) => {
            match rayon::ThreadPoolBuilder::new()
                .num_threads(jobs)
                .thread_name(|i| format!("fanout-{i}"))
                .build()
            {
                Ok(pool) => Some(pool),
                Err(e) => {
                    log::warn!("Could not build a {jobs}-thread pool ({e}); using one thread per server");
                    None
                }
            }
        }
    };

    let mut run = FleetRun {
        rx,
        labels: servers
            .iter()
            .map(|s| (s.name.clone(), s.display_address()))
            .collect(),
        states: vec![WorkerState::Pending; servers.len()],
        handles: Vec::with_capacity(servers.len()),
        ready: VecDeque::new(),
        outstanding: servers.len(),
        poll_interval: options.poll_interval,
        _pool: None,
    };

    for (index, server) in servers.iter().enumerate() {
        let job = {
            let server = server.clone();
            let executor = Arc::clone(&executor);
            let command = Arc::clone(&command);
            let tx = tx.clone();
            move || work(index, &server, &command, executor.as_ref(), &tx)
        };

        match &pool {
            Some(pool) => {
                pool.spawn(job);
                run.handles.push(None);
            }
            None => {
                let spawned = thread::Builder::new()
                    .name(format!("fanout-{}", server.name))
                    .spawn(job);
                match spawned {
                    Ok(handle) => run.handles.push(Some(handle)),
                    Err(e) => {
                        run.handles.push(None);
                        run.finish(index, run.failure(index, TransportError::Spawn(e.to_string())));
                    }
                }
            }
        }
    }

    log::debug!("Started {} workers for {:?}", servers.len(), &*command);
    run._pool = pool;
    run
}

fn work(
    index: usize,
    server: &Server,
    command: &str,
    executor: &dyn RemoteExecutor,
    tx: &Sender<Event>,
) {
    // a closed channel means the caller stopped listening
    let _ = tx.send(Event::Started(index));

    let result = panic::catch_unwind(AssertUnwindSafe(|| -> Result<Vec<String>, TransportError> {
        let host = server.external_ip.as_deref().ok_or(TransportError::NoAddress)?;
        executor.execute(host, command)
    }))
    .unwrap_or_else(|payload| Err(TransportError::Panicked(panic_message(payload.as_ref()))));

    if let Err(e) = &result {
        log::debug!("{}: {}", server.name, e);
    }

    let _ = tx.send(Event::Finished(
        index,
        CommandOutcome {
            server: server.name.clone(),
            display_address: server.display_address(),
            result,
        },
    ));
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

impl FleetRun {
    /// Current state of every worker
    pub fn counts(&self) -> WorkerCounts {
        let mut counts = WorkerCounts::default();
        for state in &self.states {
            match state {
                WorkerState::Pending => counts.pending += 1,
                WorkerState::Running => counts.running += 1,
                WorkerState::Succeeded => counts.succeeded += 1,
                WorkerState::Failed => counts.failed += 1,
            }
        }
        counts
    }

    /// Number of servers in this run
    pub fn total(&self) -> usize {
        self.states.len()
    }

    fn failure(&self, index: usize, error: TransportError) -> CommandOutcome {
        let (server, display_address) = self.labels[index].clone();
        CommandOutcome {
            server,
            display_address,
            result: Err(error),
        }
    }

    fn finish(&mut self, index: usize, outcome: CommandOutcome) {
        if self.states[index].is_terminal() {
            return;
        }
        self.states[index] = if outcome.is_success() {
            WorkerState::Succeeded
        } else {
            WorkerState::Failed
        };
        self.outstanding -= 1;
        self.ready.push_back(outcome);
    }

    fn handle(&mut self, event: Event) {
        match event {
            Event::Started(index) => {
                if self.states[index] == WorkerState::Pending {
                    self.states[index] = WorkerState::Running;
                }
            }
            Event::Finished(index, outcome) => self.finish(index, outcome),
        }
    }

    fn drain(&mut self) {
        while let Ok(event) = self.rx.try_recv() {
            self.handle(event);
        }
    }

    /// Fail workers whose thread ended without reporting.
    ///
    /// Finished threads are collected before draining, so anything they
    /// sent is already in the channel when it is drained.
    fn reap(&mut self) {
        let exited: Vec<usize> = self
            .handles
            .iter()
            .enumerate()
            .filter(|(i, h)| {
                !self.states[*i].is_terminal() && h.as_ref().is_some_and(JoinHandle::is_finished)
            })
            .map(|(i, _)| i)
            .collect();

        self.drain();

        for index in exited {
            if !self.states[index].is_terminal() {
                log::warn!("{} exited without a result", self.labels[index].0);
                self.finish(index, self.failure(index, TransportError::Lost));
            }
        }
    }

    /// Every sender is gone and the channel is empty.
    fn abandon_outstanding(&mut self) {
        for index in 0..self.states.len() {
            if !self.states[index].is_terminal() {
                self.finish(index, self.failure(index, TransportError::Lost));
            }
        }
    }
}

impl Iterator for FleetRun {
    type Item = CommandOutcome;

    fn next(&mut self) -> Option<CommandOutcome> {
        loop {
            if let Some(outcome) = self.ready.pop_front() {
                return Some(outcome);
            }
            if self.outstanding == 0 {
                return None;
            }
            match self.rx.recv_timeout(self.poll_interval) {
                Ok(event) => {
                    self.handle(event);
                    self.drain();
                }
                Err(RecvTimeoutError::Timeout) => self.reap(),
                Err(RecvTimeoutError::Disconnected) => self.abandon_outstanding(),
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.ready.len() + self.outstanding;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for FleetRun {}
