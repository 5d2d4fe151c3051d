use async_trait::async_trait;

/// Decision taken at a cooperative checkpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Checkpoint {
    Continue,
    Pause,
    Cancel,
}

/// Control surface the crawl loop polls between pages and items
///
/// The loop never aborts an in-flight request; it only asks here before starting
/// the next unit of work.
#[async_trait]
pub trait RunControl: Send + Sync {
    /// Reads the pending control signal without blocking
    fn checkpoint(&self) -> Checkpoint;

    /// Parks the worker after a pause was observed
    ///
    /// Returns `Continue` once resumed or `Cancel` if cancelled while parked.
    async fn park(&self) -> Checkpoint;
}

/// Control that never pauses or cancels
#[derive(Debug, Clone, Copy, Default)]
pub struct Uninterrupted;

#[async_trait]
impl RunControl for Uninterrupted {
    fn checkpoint(&self) -> Checkpoint {
        Checkpoint::Continue
    }

    async fn park(&self) -> Checkpoint {
        Checkpoint::Continue
    }
}
