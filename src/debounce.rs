use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;

type Job = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// The pending job, tagged with the generation of the timer allowed to run it.
#[derive(Default)]
struct Slot {
    generation: u64,
    job: Option<Job>,
}

/// Cancel-and-reschedule timer: only the most recently scheduled job runs,
/// `delay` after its scheduling call.
///
/// A job that has already started is never aborted by a later `schedule`.
/// Dropping the debouncer aborts a timer that has not fired yet.
pub struct Debouncer {
    delay: Duration,
    slot: Arc<Mutex<Slot>>,
    timer: Option<JoinHandle<()>>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            slot: Arc::new(Mutex::new(Slot::default())),
            timer: None,
        }
    }

    /// Replace any pending job and restart the timer. Must be called from
    /// within a tokio runtime.
    pub fn schedule<F>(&mut self, job: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let (generation, replaced) = with_slot(&self.slot, |slot| {
            slot.generation += 1;
            let replaced = slot.job.replace(Box::pin(job)).is_some();
            (slot.generation, replaced)
        });
        if replaced && let Some(timer) = self.timer.take() {
            // still sleeping; a stale wake-up can no longer claim the new job
            timer.abort();
        }

        let slot = Arc::clone(&self.slot);
        let delay = self.delay;
        self.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(job) = claim(&slot, generation) {
                job.await;
            }
        }));
    }

    /// Run the pending job now, or wait for one that is already running.
    pub async fn flush(&mut self) {
        let timer = self.timer.take();
        if let Some(job) = with_slot(&self.slot, |slot| slot.job.take()) {
            if let Some(timer) = timer {
                timer.abort();
            }
            job.await;
        } else if let Some(timer) = timer {
            let _ = timer.await;
        }
    }

    pub fn is_pending(&self) -> bool {
        with_slot(&self.slot, |slot| slot.job.is_some())
    }

    /// Drop the pending job without running it.
    pub fn cancel(&mut self) {
        with_slot(&self.slot, |slot| slot.job.take());
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        if self.is_pending()
            && let Some(timer) = self.timer.take()
        {
            timer.abort();
        }
    }
}

fn with_slot<R>(slot: &Mutex<Slot>, f: impl FnOnce(&mut Slot) -> R) -> R {
    match slot.lock() {
        Ok(mut guard) => f(&mut guard),
        Err(poisoned) => f(&mut poisoned.into_inner()),
    }
}

/// Take the job only if no later `schedule` has superseded `generation`.
fn claim(slot: &Mutex<Slot>, generation: u64) -> Option<Job> {
    with_slot(slot, |slot| {
        if slot.generation == generation {
            slot.job.take()
        } else {
            None
        }
    })
}
