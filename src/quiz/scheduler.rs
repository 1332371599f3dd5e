use tokio::task::JoinHandle;

/// Deferred transitions a room's timer can fire. Each room has at most one
/// pending event at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseEvent {
    /// Instructions are over; enter the sample quiz
    BeginSampleQuiz,
    /// Open the current question's answer window
    OpenQuestion,
    /// Answer window expired; broadcast results
    CloseQuestion,
    /// Start the pre-question countdown
    BeginCountdown,
    /// Countdown over; move to the next question or past the set
    AdvanceQuestion,
    /// Sample ranking screen is over; enter preparation
    BeginPreparation,
    /// Preparation is over; enter the main quiz
    BeginMainQuiz,
}

/// The single active phase timer for one room.
///
/// Every room transition goes through exactly one of these: arming a new
/// timer aborts the previous task and bumps the generation, so a stale
/// callback that already left the spawn queue can detect it was superseded
/// and do nothing. Destroying the room aborts the pending task via Drop.
#[derive(Debug, Default)]
pub struct PhaseTimer {
    handle: Option<JoinHandle<()>>,
    generation: u64,
}

impl PhaseTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel any pending timer and invalidate its generation. Returns the
    /// generation a newly armed timer must carry.
    pub fn cancel(&mut self) -> u64 {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
        self.generation += 1;
        self.generation
    }

    /// Install the task handle for the timer armed under `cancel()`'s
    /// returned generation
    pub fn arm(&mut self, handle: JoinHandle<()>) {
        self.handle = Some(handle);
    }

    /// Whether a firing timer with this generation is still the active one
    pub fn is_current(&self, generation: u64) -> bool {
        self.generation == generation
    }
}

impl Drop for PhaseTimer {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use tokio::time::{sleep, Duration};

    #[tokio::test]
    async fn test_cancel_invalidates_previous_generation() {
        let mut timer = PhaseTimer::new();
        let first = timer.cancel();
        assert!(timer.is_current(first));

        let second = timer.cancel();
        assert!(!timer.is_current(first));
        assert!(timer.is_current(second));
    }

    #[tokio::test]
    async fn test_cancel_aborts_pending_task() {
        let fired = Arc::new(AtomicBool::new(false));
        let mut timer = PhaseTimer::new();

        timer.cancel();
        let fired_clone = fired.clone();
        timer.arm(tokio::spawn(async move {
            sleep(Duration::from_millis(20)).await;
            fired_clone.store(true, Ordering::SeqCst);
        }));

        timer.cancel();
        sleep(Duration::from_millis(50)).await;
        assert!(!fired.load(Ordering::SeqCst), "aborted timer must not fire");
    }

    #[tokio::test]
    async fn test_drop_aborts_pending_task() {
        let fired = Arc::new(AtomicBool::new(false));
        {
            let mut timer = PhaseTimer::new();
            timer.cancel();
            let fired_clone = fired.clone();
            timer.arm(tokio::spawn(async move {
                sleep(Duration::from_millis(20)).await;
                fired_clone.store(true, Ordering::SeqCst);
            }));
        }

        sleep(Duration::from_millis(50)).await;
        assert!(!fired.load(Ordering::SeqCst), "dropped timer must not fire");
    }
}
