//! Debounced update scheduler with a watchdog.
//!
//! `Idle -> Scheduled -> Running -> Idle`, where a request during `Running` only raises the
//! `again` flag and the watchdog may force `Running -> Idle` if a run never finishes.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep, sleep_until};
use tracing::{debug, warn};

use crate::fanout::StageProbe;

/// Identifies one run. Consumers check [`UpdateScheduler::is_current`] before publishing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunTicket {
    id: u64,
}

pub type UpdateJob = Arc<dyn Fn(RunTicket) -> BoxFuture<'static, ()> + Send + Sync>;

/// Called, with no scheduler lock held, whenever a run ends or is abandoned and nothing else is
/// queued behind it.
pub type IdleHook = Arc<dyn Fn() + Send + Sync>;

#[derive(Debug, Clone, Copy)]
struct Run {
    id: u64,
    started: Instant,
}

#[derive(Default)]
struct State {
    deadline: Option<Instant>,
    timer: Option<JoinHandle<()>>,
    running: Option<Run>,
    /// Pending re-run, carrying whether it was asked for with `now`.
    again: Option<bool>,
    last_duration: Duration,
    next_run: u64,
    watchdog: Option<JoinHandle<()>>,
}

struct Shared {
    state: Mutex<State>,
    min_delay: Duration,
    max_delay: Duration,
    probe: StageProbe,
    job: UpdateJob,
    on_idle: IdleHook,
}

#[derive(Clone)]
pub struct UpdateScheduler {
    shared: Arc<Shared>,
}

impl UpdateScheduler {
    pub fn new(min_delay: Duration, max_delay: Duration, probe: StageProbe, job: UpdateJob, on_idle: IdleHook) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State::default()),
                min_delay,
                max_delay,
                probe,
                job,
                on_idle,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.shared.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn delay_for(&self, last: Duration) -> Duration {
        let min = self.shared.min_delay;
        min.max(last.min(self.shared.max_delay)) + min
    }

    /// Debounce delay the next non-immediate request will wait.
    pub fn next_delay(&self) -> Duration {
        let last = self.lock().last_duration;
        self.delay_for(last)
    }

    pub fn last_duration(&self) -> Duration {
        self.lock().last_duration
    }

    /// A run is scheduled or in progress.
    pub fn is_busy(&self) -> bool {
        let state = self.lock();
        state.deadline.is_some() || state.running.is_some()
    }

    pub fn is_running(&self) -> bool {
        self.lock().running.is_some()
    }

    /// Whether `ticket` is still the run the scheduler considers active.
    pub fn is_current(&self, ticket: RunTicket) -> bool {
        self.lock().running.is_some_and(|run| run.id == ticket.id)
    }

    pub fn stage(&self) -> String {
        self.shared.probe.current()
    }

    /// Ask for an update pass. `now` skips the debounce.
    pub fn request(&self, now: bool) {
        let mut state = self.lock();
        if state.running.is_some() {
            state.again = Some(state.again.unwrap_or(false) || now);
            return;
        }
        if now {
            state.deadline = None;
            if let Some(timer) = state.timer.take() {
                timer.abort();
            }
            self.start_locked(&mut state);
            return;
        }
        let deadline = Instant::now() + self.delay_for(state.last_duration);
        let armed = state.deadline.replace(deadline).is_some();
        if !armed {
            let this = self.clone();
            state.timer = Some(tokio::spawn(async move { this.wait_for_deadline().await }));
        }
    }

    async fn wait_for_deadline(&self) {
        loop {
            let Some(deadline) = self.lock().deadline else {
                return;
            };
            sleep_until(deadline).await;
            let mut state = self.lock();
            match state.deadline {
                Some(current) if current <= Instant::now() => {
                    state.deadline = None;
                    state.timer = None;
                    if state.running.is_some() {
                        state.again = Some(state.again.unwrap_or(false));
                    } else {
                        self.start_locked(&mut state);
                    }
                    return;
                }
                Some(_) => continue,
                None => return,
            }
        }
    }

    fn start_locked(&self, state: &mut State) {
        state.next_run += 1;
        let run = Run {
            id: state.next_run,
            started: Instant::now(),
        };
        state.running = Some(run);
        let budget = self.shared.max_delay + state.last_duration;
        debug!(run = run.id, budget_ms = budget.as_millis() as u64, "update run started");

        let this = self.clone();
        state.watchdog = Some(tokio::spawn(async move {
            sleep(budget).await;
            this.on_watchdog(run.id);
        }));

        let this = self.clone();
        let ticket = RunTicket { id: run.id };
        let work = (self.shared.job)(ticket);
        tokio::spawn(async move {
            work.await;
            this.finish(ticket);
        });
    }

    fn on_watchdog(&self, id: u64) {
        let mut state = self.lock();
        let Some(run) = state.running.filter(|run| run.id == id) else {
            return;
        };
        let elapsed = run.started.elapsed();
        warn!(
            run = id,
            stage = %self.shared.probe.current(),
            elapsed_ms = elapsed.as_millis() as u64,
            "update run did not finish in time, abandoning it"
        );
        state.running = None;
        state.watchdog = None;
        state.last_duration = elapsed;
        let again = state.again.take();
        drop(state);
        self.after_run(again);
    }

    fn finish(&self, ticket: RunTicket) {
        let mut state = self.lock();
        let Some(run) = state.running.filter(|run| run.id == ticket.id) else {
            debug!(run = ticket.id, "ignoring completion of an abandoned run");
            return;
        };
        state.last_duration = run.started.elapsed();
        state.running = None;
        if let Some(watchdog) = state.watchdog.take() {
            watchdog.abort();
        }
        debug!(run = run.id, elapsed_ms = state.last_duration.as_millis() as u64, "update run finished");
        let again = state.again.take();
        drop(state);
        self.after_run(again);
    }

    /// Start the queued re-run, or report that the scheduler went idle.
    fn after_run(&self, again: Option<bool>) {
        match again {
            Some(now) => self.request(now),
            None => (self.shared.on_idle)(),
        }
    }
}

impl std::fmt::Debug for UpdateScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("UpdateScheduler")
            .field("scheduled", &state.deadline.is_some())
            .field("running", &state.running.map(|r| r.id))
            .field("again", &state.again)
            .field("last_duration", &state.last_duration)
            .finish()
    }
}
