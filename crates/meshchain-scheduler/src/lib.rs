//! The periodic event scheduler (component C6): a cooperative,
//! single-threaded loop driving the pool & block engine's scan-and-fix and
//! delivery tasks, with a quiescence barrier for shutdown.

pub mod dispatch;
pub mod event;
pub mod scheduler;

pub use dispatch::{Dispatcher, PoolDispatcher};
pub use event::{EventKind, EventStatus};
pub use scheduler::Scheduler;

#[cfg(test)]
mod tests {
    use std::{
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc
        },
        time::Duration
    };

    use async_trait::async_trait;
    use meshchain_types::{mesh_err, ErrorKind, MeshResult};
    use tokio::sync::watch;

    use super::*;

    struct CountingDispatcher(Arc<AtomicUsize>);

    #[async_trait]
    impl Dispatcher for CountingDispatcher {
        async fn dispatch(&self, _kind: EventKind) -> MeshResult<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct FailingDispatcher;

    #[async_trait]
    impl Dispatcher for FailingDispatcher {
        async fn dispatch(&self, _kind: EventKind) -> MeshResult<()> {
            Err(mesh_err!(ErrorKind::InternalError, "test", "dispatch", "boom"))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn registered_event_fires_on_its_interval() {
        let count = Arc::new(AtomicUsize::new(0));
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let scheduler = Scheduler::new(Arc::new(CountingDispatcher(count.clone())), Duration::from_millis(10));
        scheduler.register(EventKind::ScanPool, Duration::from_millis(10), shutdown_rx);

        tokio::time::advance(Duration::from_millis(35)).await;
        tokio::task::yield_now().await;

        assert!(count.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test(start_paused = true)]
    async fn get_result_resolves_with_the_dispatch_outcome() {
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let scheduler = Scheduler::new(Arc::new(FailingDispatcher), Duration::from_millis(10));
        let event_id = scheduler.register(EventKind::AppendBlocks, Duration::from_millis(10), shutdown_rx);

        let rx = scheduler.get_result(event_id).unwrap();
        tokio::time::advance(Duration::from_millis(15)).await;

        let result = rx.await.unwrap();
        assert_eq!(result.unwrap_err().kind, ErrorKind::InternalError);
    }

    #[tokio::test(start_paused = true)]
    async fn quiesce_clears_the_queue() {
        let count = Arc::new(AtomicUsize::new(0));
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let scheduler = Scheduler::new(Arc::new(CountingDispatcher(count.clone())), Duration::from_millis(10));
        scheduler.register(EventKind::ScanBlocks, Duration::from_millis(10), shutdown_rx);

        scheduler.quiesce(Duration::from_secs(1), Duration::from_millis(5)).await.unwrap();

        let before = count.load(Ordering::SeqCst);
        tokio::time::advance(Duration::from_millis(50)).await;
        assert_eq!(count.load(Ordering::SeqCst), before);
    }
}
