use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::ThreadId;

use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use appdb_protocol::constants::IDLE_PROGRESS_TEXT;
use appdb_protocol::{TransferProgress, UploadState};

use crate::{TransferEvent, TransferHandle, TransferOutcome};

/// Callback invoked with the latest progress and its display line.
pub type ProgressCallback = Arc<dyn Fn(TransferProgress, &str) + Send + Sync>;

/// Callback invoked when the session is paused.
pub type PauseCallback = Arc<dyn Fn() + Send + Sync>;

/// Callback invoked once when the transfer completes.
pub type CompletionCallback = Box<dyn FnOnce(&TransferOutcome) + Send>;

/// One upload of a single file (thread-safe).
///
/// All transitions are decided under one lock, so exactly one terminal
/// transition wins when control calls race handle events. Observers are
/// invoked after the lock is released and may call back into the session.
///
/// Transitions that notify observers also take a delivery turn, held until
/// the observer returns. A pause or progress observer therefore never runs
/// after `stop` or completion has taken effect, and a concurrent `stop`
/// waits for a running observer to return.
pub struct UploadSession {
    inner: Mutex<SessionInner>,
    delivery: Delivery,
}

/// Serializes observer delivery across threads. Re-entrant for the thread
/// holding the turn, so observers can pause, stop or query the session.
#[derive(Default)]
struct Delivery {
    owner: Mutex<Option<ThreadId>>,
    turn: Mutex<()>,
}

struct DeliveryTurn<'a> {
    owner: &'a Mutex<Option<ThreadId>>,
    turn: Option<MutexGuard<'a, ()>>,
}

impl Delivery {
    fn enter(&self) -> DeliveryTurn<'_> {
        let me = std::thread::current().id();
        if *lock(&self.owner) == Some(me) {
            return DeliveryTurn { owner: &self.owner, turn: None };
        }
        let turn = lock(&self.turn);
        *lock(&self.owner) = Some(me);
        DeliveryTurn { owner: &self.owner, turn: Some(turn) }
    }
}

impl Drop for DeliveryTurn<'_> {
    fn drop(&mut self) {
        if self.turn.is_some() {
            *lock(self.owner) = None;
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

struct SessionInner {
    state: UploadState,
    handle: Option<Arc<dyn TransferHandle>>,
    progress: Option<TransferProgress>,
    text: String,
    outcome: Option<TransferOutcome>,
    on_progress: Option<ProgressCallback>,
    on_pause: Option<PauseCallback>,
    on_completion: Option<CompletionCallback>,
}

impl UploadSession {
    /// Wraps an upload that has already been started by `handle`.
    pub fn new(handle: Arc<dyn TransferHandle>) -> Arc<Self> {
        Self::with_state(
            UploadState::Uploading,
            Some(handle),
            IDLE_PROGRESS_TEXT.to_string(),
        )
    }

    /// A placeholder session with no upload behind it. Every control call
    /// is a no-op and the progress line reads `Waiting...`.
    pub fn idle() -> Arc<Self> {
        Self::with_state(UploadState::Idle, None, IDLE_PROGRESS_TEXT.to_string())
    }

    fn with_state(
        state: UploadState,
        handle: Option<Arc<dyn TransferHandle>>,
        text: String,
    ) -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(SessionInner {
                state,
                handle,
                progress: None,
                text,
                outcome: None,
                on_progress: None,
                on_pause: None,
                on_completion: None,
            }),
            delivery: Delivery::default(),
        })
    }

    fn lock(&self) -> MutexGuard<'_, SessionInner> {
        lock(&self.inner)
    }

    /// Suspends the upload. No-op unless currently uploading.
    pub fn pause(&self) {
        let _turn = self.delivery.enter();
        let observer = {
            let mut s = self.lock();
            let Some(handle) = s.handle.as_ref() else {
                return;
            };
            if s.state != UploadState::Uploading {
                return;
            }
            handle.suspend();
            s.state = UploadState::Paused;
            s.on_pause.clone()
        };

        info!("upload paused");
        if let Some(observer) = observer {
            observer();
        }
    }

    /// Resumes the upload. Idempotent; no-op once the session is over.
    pub fn resume(&self) {
        let mut s = self.lock();
        let Some(handle) = s.handle.as_ref() else {
            return;
        };
        handle.resume();
        if s.state == UploadState::Paused {
            info!("upload resumed");
        }
        s.state = UploadState::Uploading;
    }

    /// Cancels the upload and releases the handle. Does not wait for the
    /// handle to acknowledge, but does wait for an observer running on
    /// another thread to return. No observer fires afterwards.
    pub fn stop(&self) {
        let _turn = self.delivery.enter();
        let mut s = self.lock();
        let Some(handle) = s.handle.take() else {
            return;
        };
        handle.cancel();
        s.state = UploadState::Cancelled;
        s.on_completion = None;
        drop(s);

        info!("upload cancelled");
    }

    /// Applies a notification from the transfer handle.
    ///
    /// Events arriving once the session is over are ignored.
    pub fn handle_event(&self, event: TransferEvent) {
        match event {
            TransferEvent::Progress { completed, total } => self.record_progress(completed, total),
            TransferEvent::Finished(outcome) => self.complete(outcome),
        }
    }

    fn record_progress(&self, completed: u64, total: u64) {
        let _turn = self.delivery.enter();
        let (observer, progress, text) = {
            let mut s = self.lock();
            if s.handle.is_none() {
                return;
            }
            let progress = TransferProgress::new(completed, total);
            let text = progress.describe();
            s.progress = Some(progress);
            s.text.clone_from(&text);
            (s.on_progress.clone(), progress, text)
        };

        if let Some(observer) = observer {
            observer(progress, &text);
        }
    }

    fn complete(&self, outcome: TransferOutcome) {
        let _turn = self.delivery.enter();
        let observer = {
            let mut s = self.lock();
            if s.handle.take().is_none() {
                return;
            }
            s.state = UploadState::Completed;
            s.outcome = Some(outcome.clone());
            s.on_completion.take()
        };

        info!(success = outcome.is_success(), "upload completed");
        if let Some(observer) = observer {
            observer(&outcome);
        }
    }

    /// Forwards events from `events` into the session until the transfer
    /// finishes, the session is stopped, or the sender goes away.
    pub fn attach(self: &Arc<Self>, mut events: UnboundedReceiver<TransferEvent>) -> JoinHandle<()> {
        let session = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                let finished = matches!(event, TransferEvent::Finished(_));
                session.handle_event(event);
                if finished || session.state().is_terminal() {
                    break;
                }
            }
            debug!(state = ?session.state(), "upload event pump finished");
        })
    }

    /// Registers the progress observer, replacing any previous one.
    ///
    /// If progress was already reported, the observer is called once right
    /// away with the latest value.
    pub fn on_progress(&self, observer: impl Fn(TransferProgress, &str) + Send + Sync + 'static) {
        let observer: ProgressCallback = Arc::new(observer);
        let _turn = self.delivery.enter();
        let cached = {
            let mut s = self.lock();
            s.on_progress = Some(Arc::clone(&observer));
            s.progress.map(|p| (p, s.text.clone()))
        };

        if let Some((progress, text)) = cached {
            observer(progress, &text);
        }
    }

    /// Registers the pause observer, replacing any previous one.
    pub fn on_pause(&self, observer: impl Fn() + Send + Sync + 'static) {
        self.lock().on_pause = Some(Arc::new(observer));
    }

    /// Registers the completion observer.
    ///
    /// Called at most once. If the session already completed, it runs
    /// immediately with the stored outcome; on a cancelled session it is
    /// dropped.
    pub fn on_completion(&self, observer: impl FnOnce(&TransferOutcome) + Send + 'static) {
        let _turn = self.delivery.enter();
        let outcome = {
            let mut s = self.lock();
            match s.state {
                UploadState::Completed => s.outcome.clone(),
                UploadState::Cancelled => None,
                _ => {
                    s.on_completion = Some(Box::new(observer));
                    return;
                }
            }
        };

        if let Some(outcome) = outcome {
            observer(&outcome);
        }
    }

    pub fn state(&self) -> UploadState {
        self.lock().state
    }

    /// Last reported fraction in `0.0..=1.0` (0.0 before any progress).
    pub fn last_fraction(&self) -> f64 {
        self.lock().progress.map_or(0.0, |p| p.fraction_complete)
    }

    /// Last progress line, e.g. `"Uploading 1.0 MB of 4.0 MB (25%)"`.
    pub fn last_progress_text(&self) -> String {
        self.lock().text.clone()
    }

    pub fn progress(&self) -> Option<TransferProgress> {
        self.lock().progress
    }

    /// Outcome reported by the handle, once completed.
    pub fn outcome(&self) -> Option<TransferOutcome> {
        self.lock().outcome.clone()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[derive(Default)]
    struct RecordingHandle {
        calls: Mutex<Vec<&'static str>>,
    }

    impl RecordingHandle {
        fn calls(&self) -> Vec<&'static str> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl TransferHandle for RecordingHandle {
        fn suspend(&self) {
            self.calls.lock().unwrap().push("suspend");
        }
        fn resume(&self) {
            self.calls.lock().unwrap().push("resume");
        }
        fn cancel(&self) {
            self.calls.lock().unwrap().push("cancel");
        }
    }

    fn session() -> (Arc<RecordingHandle>, Arc<UploadSession>) {
        let handle = Arc::new(RecordingHandle::default());
        let session = UploadSession::new(handle.clone());
        (handle, session)
    }

    fn ok_outcome() -> TransferOutcome {
        TransferOutcome::Response {
            status: 200,
            body: serde_json::json!({ "success": true }),
        }
    }

    fn counter() -> (Arc<AtomicUsize>, Arc<AtomicUsize>) {
        let c = Arc::new(AtomicUsize::new(0));
        (Arc::clone(&c), c)
    }

    #[test]
    fn progress_pause_resume_complete() {
        let (handle, session) = session();
        let (fired, fired_in) = counter();
        session.on_completion(move |outcome| {
            assert!(outcome.is_success());
            fired_in.fetch_add(1, Ordering::SeqCst);
        });

        session.handle_event(TransferEvent::Progress { completed: 50, total: 100 });
        assert_eq!(session.last_fraction(), 0.5);
        session.handle_event(TransferEvent::Progress { completed: 100, total: 100 });
        session.pause();
        assert_eq!(session.state(), UploadState::Paused);
        session.resume();
        assert_eq!(session.state(), UploadState::Uploading);
        session.handle_event(TransferEvent::Finished(ok_outcome()));

        assert_eq!(session.state(), UploadState::Completed);
        assert_eq!(session.last_fraction(), 1.0);
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        session.stop();
        session.pause();
        session.handle_event(TransferEvent::Finished(ok_outcome()));
        assert_eq!(session.state(), UploadState::Completed);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(handle.calls(), ["suspend", "resume"]);
    }

    #[test]
    fn progress_text_is_cached() {
        let (_handle, session) = session();
        assert_eq!(session.last_progress_text(), "Waiting...");
        session.handle_event(TransferEvent::Progress { completed: 512, total: 2048 });
        assert_eq!(session.last_progress_text(), "Uploading 512 B of 2.0 KB (25%)");
        assert_eq!(session.progress(), Some(TransferProgress::new(512, 2048)));
    }

    #[test]
    fn pause_is_idempotent_and_notifies_once() {
        let (handle, session) = session();
        let (paused, paused_in) = counter();
        session.on_pause(move || {
            paused_in.fetch_add(1, Ordering::SeqCst);
        });

        session.pause();
        session.pause();

        assert_eq!(paused.load(Ordering::SeqCst), 1);
        assert_eq!(handle.calls(), ["suspend"]);
    }

    #[test]
    fn resume_while_uploading_is_harmless() {
        let (handle, session) = session();
        session.resume();
        assert_eq!(session.state(), UploadState::Uploading);
        assert_eq!(handle.calls(), ["resume"]);
    }

    #[test]
    fn stop_cancels_and_suppresses_completion() {
        let (handle, session) = session();
        let (fired, fired_in) = counter();
        session.on_completion(move |_| {
            fired_in.fetch_add(1, Ordering::SeqCst);
        });

        session.stop();
        session.stop();
        session.handle_event(TransferEvent::Finished(ok_outcome()));
        session.handle_event(TransferEvent::Progress { completed: 1, total: 2 });
        session.resume();

        assert_eq!(session.state(), UploadState::Cancelled);
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert_eq!(session.last_fraction(), 0.0);
        assert_eq!(handle.calls(), ["cancel"]);

        let (late, late_in) = counter();
        session.on_completion(move |_| {
            late_in.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(late.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn completion_while_paused_completes() {
        let (_handle, session) = session();
        session.pause();
        session.handle_event(TransferEvent::Finished(ok_outcome()));
        assert_eq!(session.state(), UploadState::Completed);
        assert_eq!(session.outcome(), Some(ok_outcome()));
    }

    #[test]
    fn late_progress_observer_sees_latest_value_only() {
        let (_handle, session) = session();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let early = Arc::clone(&seen);
        session.on_progress(move |p, _| early.lock().unwrap().push(p.bytes_sent));
        assert!(seen.lock().unwrap().is_empty());

        session.handle_event(TransferEvent::Progress { completed: 10, total: 100 });
        session.handle_event(TransferEvent::Progress { completed: 20, total: 100 });

        let late = Arc::clone(&seen);
        session.on_progress(move |p, text| {
            assert_eq!(text, "Uploading 20 B of 100 B (20%)");
            late.lock().unwrap().push(p.bytes_sent * 1000);
        });

        assert_eq!(*seen.lock().unwrap(), [10, 20, 20_000]);
    }

    #[test]
    fn late_completion_observer_gets_stored_outcome() {
        let (_handle, session) = session();
        session.handle_event(TransferEvent::Finished(TransferOutcome::Failed("reset".into())));

        let seen = Arc::new(Mutex::new(None));
        let seen_in = Arc::clone(&seen);
        session.on_completion(move |outcome| *seen_in.lock().unwrap() = Some(outcome.clone()));

        assert_eq!(
            *seen.lock().unwrap(),
            Some(TransferOutcome::Failed("reset".into()))
        );
    }

    #[test]
    fn observers_may_read_the_session() {
        let (_handle, session) = session();
        let weak = Arc::downgrade(&session);
        let seen = Arc::new(Mutex::new(None));
        let seen_in = Arc::clone(&seen);
        session.on_progress(move |_, _| {
            if let Some(session) = weak.upgrade() {
                *seen_in.lock().unwrap() = Some(session.last_fraction());
            }
        });

        session.handle_event(TransferEvent::Progress { completed: 3, total: 4 });
        assert_eq!(*seen.lock().unwrap(), Some(0.75));
    }

    #[test]
    fn idle_session_ignores_everything() {
        let session = UploadSession::idle();
        let (fired, fired_in) = counter();
        session.on_pause(move || {
            fired_in.fetch_add(1, Ordering::SeqCst);
        });

        session.pause();
        session.resume();
        session.stop();
        session.handle_event(TransferEvent::Progress { completed: 1, total: 1 });
        session.handle_event(TransferEvent::Finished(ok_outcome()));

        assert_eq!(session.state(), UploadState::Idle);
        assert_eq!(session.last_progress_text(), "Waiting...");
        assert_eq!(session.last_fraction(), 0.0);
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn racing_stop_and_completion_has_one_winner() {
        for _ in 0..50 {
            let (_handle, session) = session();
            let (fired, fired_in) = counter();
            session.on_completion(move |_| {
                fired_in.fetch_add(1, Ordering::SeqCst);
            });

            let stopper = {
                let session = Arc::clone(&session);
                std::thread::spawn(move || session.stop())
            };
            let finisher = {
                let session = Arc::clone(&session);
                std::thread::spawn(move || session.handle_event(TransferEvent::Finished(ok_outcome())))
            };
            stopper.join().unwrap();
            finisher.join().unwrap();

            match session.state() {
                UploadState::Completed => assert_eq!(fired.load(Ordering::SeqCst), 1),
                UploadState::Cancelled => assert_eq!(fired.load(Ordering::SeqCst), 0),
                other => panic!("unexpected state {other:?}"),
            }
        }
    }

    /// Blocks inside an observer until released, signalling once entered.
    fn gate() -> (
        std::sync::mpsc::Receiver<()>,
        std::sync::mpsc::Sender<()>,
        impl Fn() + Send + Sync + 'static,
    ) {
        let (entered_tx, entered_rx) = std::sync::mpsc::channel();
        let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();
        let release_rx = Mutex::new(release_rx);
        let wait = move || {
            let _ = entered_tx.send(());
            let _ = release_rx.lock().unwrap().recv();
        };
        (entered_rx, release_tx, wait)
    }

    #[test]
    fn stop_waits_for_a_running_pause_observer() {
        let (handle, session) = session();
        let (entered, release, wait) = gate();
        session.on_pause(wait);

        let pauser = {
            let session = Arc::clone(&session);
            std::thread::spawn(move || session.pause())
        };
        entered.recv().unwrap();
        let stopper = {
            let session = Arc::clone(&session);
            std::thread::spawn(move || session.stop())
        };

        std::thread::sleep(std::time::Duration::from_millis(50));
        assert!(!stopper.is_finished());
        assert_eq!(session.state(), UploadState::Paused);

        release.send(()).unwrap();
        pauser.join().unwrap();
        stopper.join().unwrap();
        assert_eq!(session.state(), UploadState::Cancelled);
        assert_eq!(handle.calls(), ["suspend", "cancel"]);
    }

    #[test]
    fn completion_observer_runs_after_a_running_progress_observer() {
        let (_handle, session) = session();
        let log = Arc::new(Mutex::new(Vec::new()));
        let (entered, release, wait) = gate();

        let progress_log = Arc::clone(&log);
        session.on_progress(move |p, _| {
            wait();
            progress_log.lock().unwrap().push(format!("progress {}", p.bytes_sent));
        });
        let completion_log = Arc::clone(&log);
        session.on_completion(move |_| completion_log.lock().unwrap().push("done".to_string()));

        let reporter = {
            let session = Arc::clone(&session);
            std::thread::spawn(move || {
                session.handle_event(TransferEvent::Progress { completed: 1, total: 2 })
            })
        };
        entered.recv().unwrap();
        let finisher = {
            let session = Arc::clone(&session);
            std::thread::spawn(move || session.handle_event(TransferEvent::Finished(ok_outcome())))
        };

        std::thread::sleep(std::time::Duration::from_millis(50));
        assert!(log.lock().unwrap().is_empty());

        release.send(()).unwrap();
        reporter.join().unwrap();
        finisher.join().unwrap();
        session.handle_event(TransferEvent::Progress { completed: 2, total: 2 });

        assert_eq!(*log.lock().unwrap(), ["progress 1", "done"]);
        assert_eq!(session.state(), UploadState::Completed);
    }

    #[test]
    fn observers_may_stop_the_session() {
        let (handle, session) = session();
        let weak = Arc::downgrade(&session);
        session.on_progress(move |p, _| {
            if let Some(session) = weak.upgrade().filter(|_| p.fraction_complete >= 0.5) {
                session.stop();
            }
        });

        session.handle_event(TransferEvent::Progress { completed: 1, total: 4 });
        session.handle_event(TransferEvent::Progress { completed: 2, total: 4 });
        session.handle_event(TransferEvent::Progress { completed: 3, total: 4 });

        assert_eq!(session.state(), UploadState::Cancelled);
        assert_eq!(session.last_fraction(), 0.5);
        assert_eq!(handle.calls(), ["cancel"]);
    }

    #[tokio::test]
    async fn attached_channel_drives_the_session() {
        let (_handle, session) = session();
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let pump = session.attach(rx);

        tx.send(TransferEvent::Progress { completed: 5, total: 10 }).unwrap();
        tx.send(TransferEvent::Finished(ok_outcome())).unwrap();
        pump.await.unwrap();

        assert_eq!(session.state(), UploadState::Completed);
        assert_eq!(session.last_fraction(), 0.5);
    }

    #[tokio::test]
    async fn pump_exits_when_sender_drops() {
        let (_handle, session) = session();
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel::<TransferEvent>();
        let pump = session.attach(rx);
        drop(tx);
        pump.await.unwrap();
        assert_eq!(session.state(), UploadState::Uploading);
    }
}
