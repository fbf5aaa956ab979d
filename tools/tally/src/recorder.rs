use crate::runtime::Clock;
use crate::types::{EventKind, SessionPhase};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::SystemTime;
use thiserror::Error;

/// Operational failure to even begin processing a mutation.
///
/// There is no domain-level rejection: increments are always valid and
/// undo on an empty history is an accepted no-op.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("dispatch failed: {0}")]
    DispatchFailed(String),
}

/// One coherent read of the session state.
///
/// `ratio` is `None` while there have been zero "no" events; the
/// per-minute rates are `None` until one full second has elapsed
/// (within the first minute they are proportional extrapolations, not
/// rolling averages).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Statistics {
    pub yes_count: u64,
    pub no_count: u64,
    pub ratio: Option<f64>,
    pub elapsed_secs: u64,
    pub yes_per_minute: Option<f64>,
    pub no_per_minute: Option<f64>,
}

#[derive(Debug, Clone, Copy)]
enum Mutation {
    Record(EventKind),
    Undo,
}

struct SessionState {
    phase: SessionPhase,
    yes_count: u64,
    no_count: u64,
    history: Vec<EventKind>,
    started_at: SystemTime,
}

/// Tally recorder: two counters, an undo history, and a start time
/// behind a single mutex.
///
/// Each mutation is dispatched on its own worker thread and commits
/// under the mutex; the counters and the history move in lockstep, one
/// atomic unit per operation. Commit order between concurrently
/// dispatched mutations is lock acquisition order, not dispatch order,
/// so an `undo` racing an in-flight increment may land first and no-op
/// against the shorter history. `end_session` joins every outstanding
/// worker before the session is reported closed.
pub struct Recorder {
    clock: Arc<dyn Clock>,
    state: Arc<Mutex<SessionState>>,
    pending: Mutex<Vec<JoinHandle<()>>>,
}

impl Recorder {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        let started_at = clock.now();
        Self {
            clock,
            state: Arc::new(Mutex::new(SessionState {
                phase: SessionPhase::Uninitialized,
                yes_count: 0,
                no_count: 0,
                history: Vec::new(),
                started_at,
            })),
            pending: Mutex::new(Vec::new()),
        }
    }

    /// Resets counters and history and stamps the session start time.
    /// Calling it again starts a fresh session; workers still pending
    /// from a previous session are joined first so a stale mutation can
    /// never commit into the new counters.
    pub fn start_session(&self) {
        self.join_pending();
        let mut state = self.state.lock().expect("recorder state poisoned");
        state.yes_count = 0;
        state.no_count = 0;
        state.history.clear();
        state.started_at = self.clock.now();
        state.phase = SessionPhase::Active;
    }

    pub fn record_yes(&self) -> Result<(), Rejection> {
        self.dispatch(Mutation::Record(EventKind::Yes))
    }

    pub fn record_no(&self) -> Result<(), Rejection> {
        self.dispatch(Mutation::Record(EventKind::No))
    }

    /// Removes the effect of the most recently committed increment.
    /// Accepted as a no-op when the history is empty.
    pub fn undo(&self) -> Result<(), Rejection> {
        self.dispatch(Mutation::Undo)
    }

    /// Computes statistics from a single lock acquisition, so counts,
    /// ratio, and rates always reflect one mutually consistent state.
    pub fn snapshot(&self) -> Statistics {
        let state = self.state.lock().expect("recorder state poisoned");
        let elapsed_secs = if state.phase == SessionPhase::Uninitialized {
            0
        } else {
            self.clock
                .now()
                .duration_since(state.started_at)
                .map(|elapsed| elapsed.as_secs())
                .unwrap_or(0)
        };
        derive_statistics(state.yes_count, state.no_count, elapsed_secs)
    }

    /// Joins every previously accepted mutation worker, then closes the
    /// session. Mutations issued after close are accepted no-ops.
    pub fn end_session(&self) {
        self.join_pending();
        let mut state = self.state.lock().expect("recorder state poisoned");
        state.phase = SessionPhase::Closed;
    }

    fn dispatch(&self, mutation: Mutation) -> Result<(), Rejection> {
        {
            let state = self.state.lock().expect("recorder state poisoned");
            if state.phase != SessionPhase::Active {
                return Ok(());
            }
        }

        let state = Arc::clone(&self.state);
        let name = match mutation {
            Mutation::Record(kind) => format!("record-{}", kind.as_str()),
            Mutation::Undo => "undo".to_string(),
        };
        let handle = thread::Builder::new()
            .name(name)
            .spawn(move || apply(&state, mutation))
            .map_err(|error| Rejection::DispatchFailed(error.to_string()))?;
        self.pending
            .lock()
            .expect("pending list poisoned")
            .push(handle);
        Ok(())
    }

    fn join_pending(&self) {
        let handles = {
            let mut pending = self.pending.lock().expect("pending list poisoned");
            std::mem::take(&mut *pending)
        };
        for handle in handles {
            let _ = handle.join();
        }
    }

    #[cfg(test)]
    fn history_len(&self) -> usize {
        self.state
            .lock()
            .expect("recorder state poisoned")
            .history
            .len()
    }
}

fn apply(state: &Mutex<SessionState>, mutation: Mutation) {
    let mut state = state.lock().expect("recorder state poisoned");
    // Re-checked under the lock: a worker spawned just before
    // end_session or a session reset must not touch the new state.
    if state.phase != SessionPhase::Active {
        return;
    }
    match mutation {
        Mutation::Record(kind) => {
            state.history.push(kind);
            match kind {
                EventKind::Yes => state.yes_count += 1,
                EventKind::No => state.no_count += 1,
            }
        }
        Mutation::Undo => {
            if let Some(last) = state.history.pop() {
                match last {
                    EventKind::Yes => state.yes_count -= 1,
                    EventKind::No => state.no_count -= 1,
                }
            }
        }
    }
}

fn derive_statistics(yes_count: u64, no_count: u64, elapsed_secs: u64) -> Statistics {
    let ratio = (no_count > 0).then(|| yes_count as f64 / no_count as f64);
    let yes_per_minute = (elapsed_secs > 0).then(|| yes_count as f64 * 60.0 / elapsed_secs as f64);
    let no_per_minute = (elapsed_secs > 0).then(|| no_count as f64 * 60.0 / elapsed_secs as f64);
    Statistics {
        yes_count,
        no_count,
        ratio,
        elapsed_secs,
        yes_per_minute,
        no_per_minute,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::FakeClock;
    use std::time::Duration;

    fn recorder() -> (Recorder, FakeClock) {
        let clock = FakeClock::default();
        let recorder = Recorder::new(Arc::new(clock.clone()));
        (recorder, clock)
    }

    fn settle(recorder: &Recorder) {
        recorder.join_pending();
    }

    #[test]
    fn counters_and_history_stay_in_lockstep_sequentially() {
        let (recorder, _clock) = recorder();
        recorder.start_session();

        recorder.record_yes().expect("yes");
        settle(&recorder);
        let stats = recorder.snapshot();
        assert_eq!((stats.yes_count, stats.no_count), (1, 0));
        assert_eq!(recorder.history_len(), 1);

        recorder.record_no().expect("no");
        settle(&recorder);
        let stats = recorder.snapshot();
        assert_eq!((stats.yes_count, stats.no_count), (1, 1));
        assert_eq!(recorder.history_len(), 2);

        recorder.undo().expect("undo");
        settle(&recorder);
        let stats = recorder.snapshot();
        assert_eq!((stats.yes_count, stats.no_count), (1, 0));
        assert_eq!(recorder.history_len(), 1);
    }

    #[test]
    fn undo_is_a_left_inverse_of_the_most_recent_increment() {
        let (recorder, _clock) = recorder();
        recorder.start_session();
        recorder.record_no().expect("no");
        settle(&recorder);
        let before = recorder.snapshot();

        recorder.record_yes().expect("yes");
        settle(&recorder);
        recorder.undo().expect("undo");
        recorder.end_session();
        let after = recorder.snapshot();
        assert_eq!(
            (after.yes_count, after.no_count),
            (before.yes_count, before.no_count)
        );
    }

    #[test]
    fn undo_on_a_fresh_session_is_a_no_op() {
        let (recorder, _clock) = recorder();
        recorder.start_session();
        recorder.undo().expect("undo accepted");
        recorder.end_session();
        let stats = recorder.snapshot();
        assert_eq!((stats.yes_count, stats.no_count), (0, 0));
    }

    #[test]
    fn repeated_undo_walks_back_one_step_at_a_time() {
        let (recorder, _clock) = recorder();
        recorder.start_session();
        recorder.record_yes().expect("yes");
        settle(&recorder);
        recorder.record_no().expect("no");
        settle(&recorder);

        recorder.undo().expect("undo no");
        settle(&recorder);
        let stats = recorder.snapshot();
        assert_eq!((stats.yes_count, stats.no_count), (1, 0));

        recorder.undo().expect("undo yes");
        settle(&recorder);
        let stats = recorder.snapshot();
        assert_eq!((stats.yes_count, stats.no_count), (0, 0));

        recorder.undo().expect("undo empty");
        settle(&recorder);
        let stats = recorder.snapshot();
        assert_eq!((stats.yes_count, stats.no_count), (0, 0));
    }

    #[test]
    fn ratio_is_undefined_while_no_count_is_zero() {
        let (recorder, _clock) = recorder();
        recorder.start_session();
        recorder.record_yes().expect("yes");
        recorder.record_yes().expect("yes");
        settle(&recorder);
        let stats = recorder.snapshot();
        assert_eq!(stats.yes_count, 2);
        assert_eq!(stats.ratio, None);
    }

    #[test]
    fn ratio_is_exact_for_two_yes_and_one_no() {
        let (recorder, _clock) = recorder();
        recorder.start_session();
        recorder.record_yes().expect("yes");
        recorder.record_yes().expect("yes");
        recorder.record_no().expect("no");
        settle(&recorder);
        let stats = recorder.snapshot();
        assert_eq!(stats.ratio, Some(2.0));
    }

    #[test]
    fn rates_are_withheld_at_zero_elapsed_time() {
        let (recorder, _clock) = recorder();
        recorder.start_session();
        recorder.record_yes().expect("yes");
        settle(&recorder);
        let stats = recorder.snapshot();
        assert_eq!(stats.elapsed_secs, 0);
        assert_eq!(stats.yes_per_minute, None);
        assert_eq!(stats.no_per_minute, None);
    }

    #[test]
    fn rates_extrapolate_from_the_current_elapsed_time() {
        let (recorder, clock) = recorder();
        recorder.start_session();
        for _ in 0..5 {
            recorder.record_yes().expect("yes");
        }
        recorder.record_no().expect("no");
        settle(&recorder);

        clock.advance(Duration::from_secs(30));
        let stats = recorder.snapshot();
        assert_eq!(stats.elapsed_secs, 30);
        assert_eq!(stats.yes_per_minute, Some(10.0));
        assert_eq!(stats.no_per_minute, Some(2.0));
    }

    #[test]
    fn snapshot_is_idempotent_without_intervening_mutations() {
        let (recorder, _clock) = recorder();
        recorder.start_session();
        recorder.record_yes().expect("yes");
        recorder.record_no().expect("no");
        settle(&recorder);

        let first = recorder.snapshot();
        let second = recorder.snapshot();
        assert_eq!(first, second);
    }

    #[test]
    fn concurrent_dispatch_never_loses_updates() {
        let (recorder, _clock) = recorder();
        let recorder = Arc::new(recorder);
        recorder.start_session();

        let mut joins = Vec::new();
        for _ in 0..8 {
            let recorder = Arc::clone(&recorder);
            joins.push(thread::spawn(move || {
                for _ in 0..25 {
                    recorder.record_yes().expect("dispatch yes");
                }
                for _ in 0..10 {
                    recorder.record_no().expect("dispatch no");
                }
            }));
        }
        for join in joins {
            join.join().expect("caller thread");
        }

        recorder.end_session();
        let stats = recorder.snapshot();
        assert_eq!(stats.yes_count, 8 * 25);
        assert_eq!(stats.no_count, 8 * 10);
        assert_eq!(recorder.history_len(), 8 * 35);
    }

    #[test]
    fn mutations_before_start_and_after_end_are_accepted_no_ops() {
        let (recorder, _clock) = recorder();
        recorder.record_yes().expect("accepted before start");
        recorder.start_session();
        recorder.record_yes().expect("yes");
        settle(&recorder);
        recorder.end_session();

        recorder.record_no().expect("accepted after end");
        recorder.undo().expect("accepted after end");
        recorder.end_session();
        let stats = recorder.snapshot();
        assert_eq!((stats.yes_count, stats.no_count), (1, 0));
    }

    #[test]
    fn starting_again_resets_the_session() {
        let (recorder, clock) = recorder();
        recorder.start_session();
        recorder.record_yes().expect("yes");
        recorder.record_no().expect("no");
        settle(&recorder);
        clock.advance(Duration::from_secs(90));

        recorder.start_session();
        let stats = recorder.snapshot();
        assert_eq!((stats.yes_count, stats.no_count), (0, 0));
        assert_eq!(stats.elapsed_secs, 0);
        assert_eq!(recorder.history_len(), 0);
    }

    #[test]
    fn snapshot_before_any_session_is_all_zero() {
        let (recorder, clock) = recorder();
        clock.advance(Duration::from_secs(10));
        let stats = recorder.snapshot();
        assert_eq!((stats.yes_count, stats.no_count), (0, 0));
        assert_eq!(stats.elapsed_secs, 0);
        assert_eq!(stats.ratio, None);
        assert_eq!(stats.yes_per_minute, None);
    }
}
