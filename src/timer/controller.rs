use std::{
    sync::{Arc, Weak},
    time::Duration,
};

use anyhow::Result;
use log::{error, info, warn};
use tokio::{
    sync::{broadcast, Mutex},
    task::JoinHandle,
    time::{self, Instant, MissedTickBehavior},
};

use crate::{
    cue::{BackgroundCue, CueDispatcher, CuePlayer},
    session::{DailyProgress, FocusSession, SessionBackend, SessionOutcome, SessionRecorder},
    settings::{SettingsStore, TimerSettings},
};

use super::{
    countdown::Tick,
    cycle::{should_auto_start, CycleTracker},
    NoticeLevel, TimerError, TimerEvent, TimerMode, TimerSnapshot, TimerState, TimerStatus,
};

pub const EVENT_CAPACITY: usize = 1024;

struct ControllerInner<B: SessionBackend> {
    state: Mutex<TimerState>,
    recorder: SessionRecorder<B>,
    settings: Arc<SettingsStore>,
    cues: CueDispatcher,
    events: broadcast::Sender<TimerEvent>,
    ticker: Mutex<Option<JoinHandle<()>>>,
    tick_interval: Duration,
}

/// Focus/break timer. Cheap to clone; all clones drive the same state.
pub struct TimerController<B: SessionBackend> {
    inner: Arc<ControllerInner<B>>,
}

impl<B: SessionBackend> Clone for TimerController<B> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<B: SessionBackend> TimerController<B> {
    pub fn new(
        backend: B,
        user_id: impl Into<String>,
        settings: Arc<SettingsStore>,
        player: Arc<dyn CuePlayer>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let focus_secs = settings.timer_settings().duration_secs(TimerMode::Focus);

        Self {
            inner: Arc::new(ControllerInner {
                state: Mutex::new(TimerState::new(focus_secs)),
                recorder: SessionRecorder::new(backend, user_id, events.clone()),
                settings,
                cues: CueDispatcher::new(player),
                events,
                ticker: Mutex::new(None),
                tick_interval: Duration::from_secs(1),
            }),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TimerEvent> {
        self.inner.events.subscribe()
    }

    pub fn settings(&self) -> &SettingsStore {
        &self.inner.settings
    }

    pub fn recorder(&self) -> &SessionRecorder<B> {
        &self.inner.recorder
    }

    /// Seed the cycle counter from today's completed focus sessions.
    pub async fn restore_from_history(&self) -> u32 {
        match self.inner.recorder.completed_focus_today().await {
            Ok(completed) => {
                let mut state = self.inner.state.lock().await;
                state.cycles = CycleTracker::with_completed(completed);
                info!("Restored {completed} completed focus sessions for today");
                completed
            }
            Err(err) => {
                warn!("Could not restore today's cycle count: {err:#}");
                0
            }
        }
    }

    pub async fn snapshot(&self) -> TimerSnapshot {
        let state = self.inner.state.lock().await;
        self.inner.snapshot_of(&state)
    }

    /// `Idle/Paused -> Running`. A focus run opens a session record first;
    /// if that fails the countdown is left untouched. Commands issued while
    /// the create is in flight wait for it.
    pub async fn start(&self) -> Result<TimerSnapshot> {
        let mut state = self.inner.state.lock().await;
        if state.status() == TimerStatus::Running {
            return Ok(self.inner.snapshot_of(&state));
        }

        self.inner.begin(&mut state).await?;
        self.spawn_ticker().await;
        Ok(self.inner.snapshot_of(&state))
    }

    pub async fn pause(&self) -> Result<TimerSnapshot> {
        let mut state = self.inner.state.lock().await;
        if !state.countdown.pause(Instant::now()) {
            return Ok(self.inner.snapshot_of(&state));
        }

        self.cancel_ticker().await;
        let settings = self.inner.settings.timer_settings();
        self.inner.cues.background(BackgroundCue::Pause, &settings);
        self.inner.emit_state(&state);
        Ok(self.inner.snapshot_of(&state))
    }

    /// Back to `Idle(focus, full)`. An open session is closed as cancelled.
    pub async fn reset(&self) -> Result<TimerSnapshot> {
        let mut state = self.inner.state.lock().await;
        self.cancel_ticker().await;

        self.inner.close_open_session(&mut state, SessionOutcome::Cancelled);
        let settings = self.inner.settings.timer_settings();
        state.load_mode(TimerMode::Focus, settings.duration_secs(TimerMode::Focus));

        self.inner.cues.background(BackgroundCue::Stop, &settings);
        self.inner.emit_state(&state);
        Ok(self.inner.snapshot_of(&state))
    }

    /// Treat the current interval as finished now. Never auto-starts.
    pub async fn skip(&self) -> Result<TimerSnapshot> {
        let mut state = self.inner.state.lock().await;
        if !state.is_active() {
            return Err(TimerError::NotActive.into());
        }
        self.cancel_ticker().await;

        self.inner.finish_interval(&mut state, true);
        let settings = self.inner.settings.timer_settings();
        self.inner.cues.background(BackgroundCue::Stop, &settings);
        self.inner.emit_state(&state);
        Ok(self.inner.snapshot_of(&state))
    }

    /// Manual tab change. While running or paused this discards the
    /// current interval, so it has to be confirmed.
    pub async fn switch_mode(&self, mode: TimerMode, confirmed: bool) -> Result<TimerSnapshot> {
        let mut state = self.inner.state.lock().await;
        if state.is_active() && !confirmed {
            return Err(TimerError::ConfirmationRequired {
                from: state.mode,
                to: mode,
            }
            .into());
        }
        self.cancel_ticker().await;

        self.inner.close_open_session(&mut state, SessionOutcome::Cancelled);
        let settings = self.inner.settings.timer_settings();
        state.load_mode(mode, settings.duration_secs(mode));

        self.inner.cues.background(BackgroundCue::Stop, &settings);
        self.inner.emit_state(&state);
        Ok(self.inner.snapshot_of(&state))
    }

    /// Persist new settings. An idle countdown picks up the new duration
    /// immediately; a running or paused one keeps its current length.
    pub async fn apply_settings(&self, settings: TimerSettings) -> Result<TimerSnapshot> {
        self.inner.settings.update_timer_settings(settings)?;

        let mut state = self.inner.state.lock().await;
        let settings = self.inner.settings.timer_settings();
        let cue = match state.status() {
            TimerStatus::Idle => {
                let mode = state.mode;
                state.load_mode(mode, settings.duration_secs(mode));
                BackgroundCue::Stop
            }
            TimerStatus::Running => BackgroundCue::Play,
            TimerStatus::Paused => BackgroundCue::Pause,
        };

        self.inner.cues.background(cue, &settings);
        self.inner.emit_state(&state);
        Ok(self.inner.snapshot_of(&state))
    }

    pub fn set_daily_goal(&self, goal: u32) -> Result<()> {
        self.inner.settings.update_daily_goal(goal)
    }

    pub async fn today_progress(&self) -> Result<DailyProgress> {
        self.inner
            .recorder
            .today_progress(self.inner.settings.daily_goal())
            .await
    }

    pub async fn history(&self, limit: usize) -> Result<Vec<FocusSession>> {
        self.inner.recorder.history(limit).await
    }

    /// Wait for background session writes to land.
    pub async fn flush(&self) {
        self.inner.recorder.flush().await;
    }

    /// Tear down: stop ticking and sounds, close any open session as
    /// cancelled and wait for the write.
    pub async fn shutdown(&self) {
        {
            let mut state = self.inner.state.lock().await;
            self.cancel_ticker().await;
            state.countdown.pause(Instant::now());
            self.inner.close_open_session(&mut state, SessionOutcome::Cancelled);
            let settings = self.inner.settings.timer_settings();
            self.inner.cues.background(BackgroundCue::Stop, &settings);
        }
        self.flush().await;
    }

    async fn spawn_ticker(&self) {
        let mut ticker_guard = self.inner.ticker.lock().await;
        if let Some(handle) = ticker_guard.take() {
            handle.abort();
        }

        let inner = Arc::downgrade(&self.inner);
        *ticker_guard = Some(tokio::spawn(run_ticker(inner)));
    }

    async fn cancel_ticker(&self) {
        if let Some(handle) = self.inner.ticker.lock().await.take() {
            handle.abort();
        }
    }
}

/// Holds only a weak reference so dropping the last controller ends it.
async fn run_ticker<B: SessionBackend>(controller: Weak<ControllerInner<B>>) {
    let Some(period) = controller.upgrade().map(|inner| inner.tick_interval) else {
        return;
    };
    let mut interval = time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately.
    interval.tick().await;

    loop {
        interval.tick().await;

        let Some(inner) = controller.upgrade() else {
            break;
        };
        let mut state = inner.state.lock().await;
        match state.countdown.tick(Instant::now()) {
            Tick::Idle => break,
            Tick::Running { remaining_secs } => {
                let _ = inner.events.send(TimerEvent::Tick {
                    mode: state.mode,
                    remaining_secs,
                });
            }
            Tick::Completed => {
                if inner.finish_interval(&mut state, false) {
                    match inner.begin(&mut state).await {
                        Ok(()) => {
                            interval.reset();
                            continue;
                        }
                        Err(err) => warn!("Auto-start of {} failed: {err:#}", state.mode),
                    }
                }

                let settings = inner.settings.timer_settings();
                inner.cues.background(BackgroundCue::Stop, &settings);
                inner.emit_state(&state);
                break;
            }
        }
    }
}

impl<B: SessionBackend> Drop for ControllerInner<B> {
    fn drop(&mut self) {
        if let Some(handle) = self.ticker.get_mut().take() {
            handle.abort();
        }
    }
}

impl<B: SessionBackend> ControllerInner<B> {
    /// The caller keeps the state lock across the session create, so other
    /// commands queue behind a slow backend instead of racing the start.
    async fn begin(&self, state: &mut TimerState) -> Result<()> {
        if state.countdown.remaining_ms(Instant::now()) == 0 {
            return Err(TimerError::Exhausted.into());
        }

        if state.mode == TimerMode::Focus && state.open_session.is_none() {
            let planned = state.countdown.duration_secs();
            match self.recorder.start_session(state.mode, planned).await {
                Ok(open) => state.open_session = Some(open),
                Err(err) => {
                    error!("Focus session could not be recorded: {err:#}");
                    self.notify(
                        NoticeLevel::Error,
                        format!("Could not start focus session: {err}"),
                    );
                    return Err(err);
                }
            }
        }

        state.countdown.start(Instant::now())?;
        let settings = self.settings.timer_settings();
        self.cues.background(BackgroundCue::Play, &settings);
        self.emit_state(state);
        Ok(())
    }

    /// Shared by natural completion and skip. Leaves the machine in
    /// `Idle(next, full)` and returns whether `next` should start by itself.
    fn finish_interval(&self, state: &mut TimerState, skipped: bool) -> bool {
        self.close_open_session(state, SessionOutcome::Completed);

        let settings = self.settings.timer_settings();
        let finished = state.mode;
        let next = state.cycles.complete(finished, &settings);
        state.load_mode(next, settings.duration_secs(next));

        self.cues.transition(&settings);

        let auto_start = !skipped && should_auto_start(next, &settings);
        info!("{finished} finished, next {next} (auto start: {auto_start})");
        let _ = self.events.send(TimerEvent::IntervalFinished {
            finished,
            next,
            skipped,
            auto_start,
        });
        auto_start
    }

    fn close_open_session(&self, state: &mut TimerState, outcome: SessionOutcome) {
        if let Some(open) = state.open_session.take() {
            let remaining = state.countdown.remaining_secs(Instant::now());
            self.recorder.end_session(open, outcome, remaining);
        }
    }

    fn snapshot_of(&self, state: &TimerState) -> TimerSnapshot {
        let interval = self.settings.timer_settings().long_break_interval;
        TimerSnapshot {
            status: state.status(),
            mode: state.mode,
            remaining_secs: state.countdown.remaining_secs(Instant::now()),
            duration_secs: state.countdown.duration_secs(),
            completed_cycles: state.cycles.completed(),
            cycle_position: state.cycles.position(interval),
            long_break_interval: interval,
            session_id: state.open_session.as_ref().map(|open| open.id.clone()),
        }
    }

    fn emit_state(&self, state: &TimerState) {
        let _ = self.events.send(TimerEvent::StateChanged(self.snapshot_of(state)));
    }

    fn notify(&self, level: NoticeLevel, message: String) {
        let _ = self.events.send(TimerEvent::Notification { level, message });
    }
}
