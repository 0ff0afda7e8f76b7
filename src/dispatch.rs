//! Delivering events to registered listeners.
//!
//! Events fan out on two lanes, `BACKGROUND_JOB` completions and everything else,
//! each drained by its own thread. A slow background-job handler therefore never holds
//! up channel events and vice versa, while order within a lane is arrival order. The
//! reader task only ever `try_send`s, so listeners cannot stall frame decoding or
//! reply delivery.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::thread::JoinHandle;

use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use crate::connection::DisconnectReason;
use crate::error::EslResult;
use crate::event::EslEvent;

/// Outcome of a listener callback; errors are logged and otherwise ignored.
pub type ListenerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// Receives events from a session.
///
/// Callbacks run on the dispatcher's lane threads, never on the runtime. Returning an
/// error, or panicking, affects only that one delivery.
///
/// Events are not guaranteed to arrive. Each lane holds `event_queue_size` events;
/// while a listener is too slow to keep that lane below capacity, further events on it
/// are dropped and counted in [`EslSession::dropped_event_count`].
///
/// [`EslSession::dropped_event_count`]: crate::connection::EslSession::dropped_event_count
pub trait EventListener: Send + Sync {
    /// Any event other than `BACKGROUND_JOB`.
    fn on_event(&self, _event: &EslEvent) -> ListenerResult {
        Ok(())
    }

    /// Completion of a `bgapi` job.
    fn on_background_job(&self, _event: &EslEvent) -> ListenerResult {
        Ok(())
    }

    /// The session ended. Called once, after every event queued before the end.
    fn on_disconnect(&self, _reason: &DisconnectReason) {}
}

/// Shared, growable set of listeners.
///
/// Cloning shares the set. Each delivery works on a snapshot, so adding a listener
/// while events flow is safe; it sees events dispatched after it was added.
#[derive(Clone, Default)]
pub struct Listeners {
    inner: Arc<RwLock<Vec<Arc<dyn EventListener>>>>,
}

impl Listeners {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, listener: Arc<dyn EventListener>) {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(listener);
    }

    /// Independent registry starting with the current listeners.
    pub fn fork(&self) -> Self {
        Self {
            inner: Arc::new(RwLock::new(self.snapshot())),
        }
    }

    pub fn len(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn snapshot(&self) -> Vec<Arc<dyn EventListener>> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl std::fmt::Debug for Listeners {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listeners")
            .field("count", &self.len())
            .finish()
    }
}

enum LaneItem {
    Event(Arc<EslEvent>),
    Closed(DisconnectReason),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Lane {
    General,
    BackgroundJob,
}

impl Lane {
    fn thread_name(self) -> &'static str {
        match self {
            Lane::General => "esl-events",
            Lane::BackgroundJob => "esl-bgjobs",
        }
    }
}

/// Per-connection event fan-out.
pub struct EventDispatcher {
    general: mpsc::Sender<LaneItem>,
    background: mpsc::Sender<LaneItem>,
    dropped: Arc<AtomicU64>,
    threads: Vec<JoinHandle<()>>,
}

impl EventDispatcher {
    /// Start both lane threads. `queue_size` bounds each lane.
    pub fn start(listeners: Listeners, queue_size: usize) -> EslResult<Self> {
        let queue_size = queue_size.max(1);
        let (general, general_rx) = mpsc::channel(queue_size);
        let (background, background_rx) = mpsc::channel(queue_size);
        let threads = vec![
            spawn_lane(Lane::General, general_rx, listeners.clone())?,
            spawn_lane(Lane::BackgroundJob, background_rx, listeners)?,
        ];
        Ok(Self {
            general,
            background,
            dropped: Arc::new(AtomicU64::new(0)),
            threads,
        })
    }

    /// Queue an event on its lane without waiting. A full lane drops the event.
    pub fn dispatch(&self, event: EslEvent) {
        let lane = if event.is_background_job() {
            &self.background
        } else {
            &self.general
        };
        match lane.try_send(LaneItem::Event(Arc::new(event))) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(LaneItem::Event(event))) => {
                let total = self
                    .dropped
                    .fetch_add(1, Ordering::Relaxed)
                    + 1;
                warn!(
                    "listener queue full, dropping {} ({} dropped so far)",
                    event, total
                );
            }
            Err(_) => {
                debug!("listener lane stopped, event discarded");
            }
        }
    }

    /// Events discarded because a lane was full.
    pub fn dropped_event_count(&self) -> u64 {
        self.dropped
            .load(Ordering::Relaxed)
    }

    pub(crate) fn dropped_counter(&self) -> Arc<AtomicU64> {
        self.dropped
            .clone()
    }

    /// Queue the end-of-session marker behind pending events, then let both lanes
    /// finish. Waits for queue space but not for the threads to exit.
    pub async fn close(self, reason: DisconnectReason) {
        let EventDispatcher {
            general,
            background,
            threads,
            ..
        } = self;
        let _ = general
            .send(LaneItem::Closed(reason.clone()))
            .await;
        let _ = background
            .send(LaneItem::Closed(reason))
            .await;
        debug!("close queued for {} listener lane(s)", threads.len());
    }

    #[cfg(test)]
    fn join(self) {
        let EventDispatcher {
            general,
            background,
            threads,
            ..
        } = self;
        drop(general);
        drop(background);
        for thread in threads {
            let _ = thread.join();
        }
    }
}

fn spawn_lane(
    lane: Lane,
    mut rx: mpsc::Receiver<LaneItem>,
    listeners: Listeners,
) -> EslResult<JoinHandle<()>> {
    let handle = std::thread::Builder::new()
        .name(
            lane.thread_name()
                .to_string(),
        )
        .spawn(move || {
            while let Some(item) = rx.blocking_recv() {
                match item {
                    LaneItem::Event(event) => deliver(lane, &event, &listeners),
                    LaneItem::Closed(reason) => {
                        if lane == Lane::General {
                            for listener in listeners.snapshot() {
                                let outcome = catch_unwind(AssertUnwindSafe(|| {
                                    listener.on_disconnect(&reason)
                                }));
                                if outcome.is_err() {
                                    error!("listener panicked in on_disconnect");
                                }
                            }
                        }
                        break;
                    }
                }
            }
            debug!("{} lane stopped", lane.thread_name());
        })?;
    Ok(handle)
}

fn deliver(lane: Lane, event: &EslEvent, listeners: &Listeners) {
    for listener in listeners.snapshot() {
        let outcome = catch_unwind(AssertUnwindSafe(|| match lane {
            Lane::General => listener.on_event(event),
            Lane::BackgroundJob => listener.on_background_job(event),
        }));
        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!("listener failed on {}: {}", event, e),
            Err(_) => error!("listener panicked on {}", event),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EslEventType;
    use std::sync::mpsc as std_mpsc;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<String>>,
    }

    impl Recorder {
        fn seen(&self) -> Vec<String> {
            self.seen
                .lock()
                .unwrap()
                .clone()
        }
    }

    impl EventListener for Recorder {
        fn on_event(&self, event: &EslEvent) -> ListenerResult {
            self.seen
                .lock()
                .unwrap()
                .push(
                    event
                        .header("Seq")
                        .unwrap_or(event.event_name())
                        .to_string(),
                );
            Ok(())
        }

        fn on_background_job(&self, event: &EslEvent) -> ListenerResult {
            self.seen
                .lock()
                .unwrap()
                .push(format!("job:{}", event.header("Seq").unwrap_or("")));
            Ok(())
        }

        fn on_disconnect(&self, reason: &DisconnectReason) {
            self.seen
                .lock()
                .unwrap()
                .push(format!("disconnect:{}", reason));
        }
    }

    fn event(event_type: EslEventType, seq: usize) -> EslEvent {
        let mut event = EslEvent::with_type(event_type);
        event.set_header("Seq", seq.to_string());
        event
    }

    #[tokio::test]
    async fn events_arrive_in_order_then_disconnect() {
        let listeners = Listeners::new();
        let recorder = Arc::new(Recorder::default());
        listeners.add(recorder.clone());

        let dispatcher = EventDispatcher::start(listeners, 16).unwrap();
        for n in 0..5 {
            dispatcher.dispatch(event(EslEventType::ChannelCreate, n));
        }
        dispatcher.dispatch(event(EslEventType::BackgroundJob, 9));
        dispatcher
            .close(DisconnectReason::ServerNotice)
            .await;

        // lane threads exit after the close marker
        tokio::time::sleep(Duration::from_millis(100)).await;
        let seen = recorder.seen();
        let general: Vec<_> = seen
            .iter()
            .filter(|s| !s.starts_with("job:"))
            .cloned()
            .collect();
        assert_eq!(
            general,
            vec!["0", "1", "2", "3", "4", "disconnect:server sent disconnect notice"]
        );
        assert!(seen.contains(&"job:9".to_string()));
    }

    struct Failing;

    impl EventListener for Failing {
        fn on_event(&self, event: &EslEvent) -> ListenerResult {
            if event.header("Seq") == Some("1") {
                panic!("listener bug");
            }
            Err("always unhappy".into())
        }
    }

    #[test]
    fn failing_listener_does_not_affect_others() {
        let listeners = Listeners::new();
        let recorder = Arc::new(Recorder::default());
        listeners.add(Arc::new(Failing));
        listeners.add(recorder.clone());

        let dispatcher = EventDispatcher::start(listeners, 16).unwrap();
        for n in 0..3 {
            dispatcher.dispatch(event(EslEventType::Custom, n));
        }
        dispatcher.join();

        assert_eq!(recorder.seen(), vec!["0", "1", "2"]);
    }

    struct BlockingJobs {
        release: Mutex<std_mpsc::Receiver<()>>,
        general_seen: std_mpsc::Sender<String>,
    }

    impl EventListener for BlockingJobs {
        fn on_event(&self, event: &EslEvent) -> ListenerResult {
            let _ = self
                .general_seen
                .send(event.event_name().to_string());
            Ok(())
        }

        fn on_background_job(&self, _event: &EslEvent) -> ListenerResult {
            let _ = self
                .release
                .lock()
                .unwrap()
                .recv_timeout(Duration::from_secs(5));
            Ok(())
        }
    }

    #[test]
    fn blocked_background_lane_does_not_stall_general_lane() {
        let (release_tx, release_rx) = std_mpsc::channel();
        let (seen_tx, seen_rx) = std_mpsc::channel();
        let listeners = Listeners::new();
        listeners.add(Arc::new(BlockingJobs {
            release: Mutex::new(release_rx),
            general_seen: seen_tx,
        }));

        let dispatcher = EventDispatcher::start(listeners, 16).unwrap();
        dispatcher.dispatch(event(EslEventType::BackgroundJob, 0));
        dispatcher.dispatch(event(EslEventType::Heartbeat, 1));

        let name = seen_rx
            .recv_timeout(Duration::from_secs(2))
            .expect("general lane should deliver while job lane is blocked");
        assert_eq!(name, "HEARTBEAT");

        release_tx
            .send(())
            .unwrap();
        dispatcher.join();
    }

    #[test]
    fn full_lane_drops_and_counts() {
        let (release_tx, release_rx) = std_mpsc::channel();
        let (seen_tx, _seen_rx) = std_mpsc::channel();
        let listeners = Listeners::new();
        listeners.add(Arc::new(BlockingJobs {
            release: Mutex::new(release_rx),
            general_seen: seen_tx,
        }));

        let dispatcher = EventDispatcher::start(listeners, 1).unwrap();
        // first one is taken by the lane thread and blocks it, second fills the queue
        dispatcher.dispatch(event(EslEventType::BackgroundJob, 0));
        std::thread::sleep(Duration::from_millis(100));
        dispatcher.dispatch(event(EslEventType::BackgroundJob, 1));
        dispatcher.dispatch(event(EslEventType::BackgroundJob, 2));
        dispatcher.dispatch(event(EslEventType::BackgroundJob, 3));
        assert_eq!(dispatcher.dropped_event_count(), 2);

        release_tx
            .send(())
            .unwrap();
        release_tx
            .send(())
            .unwrap();
        dispatcher.join();
    }

    #[test]
    fn listeners_added_later_see_later_events() {
        let listeners = Listeners::new();
        let early = Arc::new(Recorder::default());
        listeners.add(early.clone());
        let dispatcher = EventDispatcher::start(listeners.clone(), 16).unwrap();
        dispatcher.dispatch(event(EslEventType::Custom, 0));
        std::thread::sleep(Duration::from_millis(100));

        let late = Arc::new(Recorder::default());
        listeners.add(late.clone());
        assert_eq!(listeners.len(), 2);
        dispatcher.dispatch(event(EslEventType::Custom, 1));
        dispatcher.join();

        assert_eq!(early.seen(), vec!["0", "1"]);
        assert_eq!(late.seen(), vec!["1"]);
    }

    #[test]
    fn fork_is_independent() {
        let shared = Listeners::new();
        shared.add(Arc::new(Recorder::default()));
        let forked = shared.fork();
        forked.add(Arc::new(Recorder::default()));
        assert_eq!(shared.len(), 1);
        assert_eq!(forked.len(), 2);
    }
}
