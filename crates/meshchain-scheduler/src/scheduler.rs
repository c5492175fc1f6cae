//! The cooperative, single-threaded event loop: one tick per
//! `tick_interval`, due events run sequentially within a tick so the pool
//! mutex never has to reason about overlap among the scheduler's own tasks.

use std::{
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc
    },
    time::{Duration, Instant}
};

use meshchain_types::{mesh_err, ErrorKind, MeshResult};
use parking_lot::Mutex;
use tokio::sync::{oneshot, watch};
use uuid::Uuid;

use crate::{
    dispatch::Dispatcher,
    event::{EventKind, EventStatus, InternalEvent}
};

const COMPONENT: &str = "meshchain-scheduler";

pub struct Scheduler {
    queue:       Mutex<Vec<InternalEvent>>,
    run_counter: AtomicUsize,
    active:      AtomicBool,
    dispatcher:  Arc<dyn Dispatcher>,
    tick_interval: Duration
}

impl Scheduler {
    pub fn new(dispatcher: Arc<dyn Dispatcher>, tick_interval: Duration) -> Arc<Self> {
        Arc::new(Self {
            queue: Mutex::new(Vec::new()),
            run_counter: AtomicUsize::new(0),
            active: AtomicBool::new(false),
            dispatcher,
            tick_interval
        })
    }

    /// Appends a periodic event. If the loop had stopped (post-quiesce), it
    /// is restarted.
    pub fn register(self: &Arc<Self>, kind: EventKind, interval: Duration, shutdown: watch::Receiver<bool>) -> Uuid {
        let event = InternalEvent::new(kind, interval);
        let event_id = event.event_id;
        self.queue.lock().push(event);

        if !self.active.swap(true, Ordering::SeqCst) {
            let this = Arc::clone(self);
            tokio::spawn(async move { this.run_loop(shutdown).await });
        }
        event_id
    }

    async fn run_loop(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.tick_interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => self.tick().await,
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        self.active.store(false, Ordering::SeqCst);
                        break;
                    }
                }
            }
        }
    }

    async fn tick(self: &Arc<Self>) {
        let now = Instant::now();
        let due: Vec<Uuid> =
            { self.queue.lock().iter().filter(|e| now >= e.next_execute_at).map(|e| e.event_id).collect() };

        for event_id in due {
            self.run_one(event_id).await;
        }
    }

    async fn run_one(self: &Arc<Self>, event_id: Uuid) {
        let kind = {
            let mut queue = self.queue.lock();
            let Some(event) = queue.iter_mut().find(|e| e.event_id == event_id) else { return };
            event.status = EventStatus::Running;
            event.kind
        };
        self.run_counter.fetch_add(1, Ordering::SeqCst);

        let result = self.dispatcher.dispatch(kind).await;

        self.run_counter.fetch_sub(1, Ordering::SeqCst);
        let mut queue = self.queue.lock();
        if let Some(event) = queue.iter_mut().find(|e| e.event_id == event_id) {
            event.status = match &result {
                Ok(()) => EventStatus::Done,
                Err(err) => EventStatus::Error(err.clone())
            };
            event.next_execute_at = Instant::now() + event.interval;
            for waiter in event.waiters.drain(..) {
                let _ = waiter.send(result.clone());
            }
        }
    }

    /// Awaits the next completion of `event_id` — a oneshot completion
    /// primitive in place of polling. `None` if the event was unregistered.
    pub fn get_result(&self, event_id: Uuid) -> Option<oneshot::Receiver<MeshResult<()>>> {
        let mut queue = self.queue.lock();
        let event = queue.iter_mut().find(|e| e.event_id == event_id)?;
        let (tx, rx) = oneshot::channel();
        event.waiters.push(tx);
        Some(rx)
    }

    /// Clears the queue, then waits for any in-flight dispatch to finish up
    /// to `max_wait`, polling every `poll_interval`.
    pub async fn quiesce(&self, max_wait: Duration, poll_interval: Duration) -> MeshResult<()> {
        self.queue.lock().clear();
        let deadline = Instant::now() + max_wait;

        while self.run_counter.load(Ordering::SeqCst) > 0 {
            if Instant::now() >= deadline {
                return Err(mesh_err!(
                    ErrorKind::QuiesceTimeout,
                    COMPONENT,
                    "quiesce",
                    "{} events still running after {max_wait:?}",
                    self.run_counter.load(Ordering::SeqCst)
                ));
            }
            tokio::time::sleep(poll_interval).await;
        }
        Ok(())
    }

    pub fn running_count(&self) -> usize {
        self.run_counter.load(Ordering::SeqCst)
    }
}
