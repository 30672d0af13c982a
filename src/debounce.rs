use std::time::Duration;

use tokio::{sync::watch, task::JoinHandle};

/// Delays a rapidly changing value until it has been stable for `delay`
///
/// Inputs go in through [`Debouncer::set`]; the settled value comes out through
/// [`Debouncer::current`] or a [`Debouncer::subscribe`] receiver. Every new input restarts the
/// wait, and a settled value is published once. Dropping the debouncer cancels any pending
/// timer without publishing.
pub struct Debouncer<T> {
    input: watch::Sender<T>,
    output: watch::Receiver<T>,
    task: JoinHandle<()>,
}

impl<T> Debouncer<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// Starts the timer task; `initial` is both the first input and the first output
    pub fn new(initial: T, delay: Duration) -> Self {
        let (input_tx, input_rx) = watch::channel(initial.clone());
        let (output_tx, output_rx) = watch::channel(initial);

        let task = tokio::spawn(debounce_loop(input_rx, output_tx, delay));

        Self {
            input: input_tx,
            output: output_rx,
            task,
        }
    }

    pub fn set(&self, value: T) {
        self.input.send_replace(value);
    }

    /// Latest raw input
    pub fn input(&self) -> T {
        self.input.borrow().clone()
    }

    /// Latest settled output
    pub fn current(&self) -> T {
        self.output.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<T> {
        self.output.clone()
    }

    pub fn is_settled(&self) -> bool {
        *self.input.borrow() == *self.output.borrow()
    }

    /// Waits until the output has caught up with the latest input
    pub async fn settled(&self) -> T {
        let mut output = self.output.clone();
        let mut input = self.input.subscribe();

        loop {
            let target = input.borrow_and_update().clone();
            if *output.borrow_and_update() == target {
                return target;
            }

            tokio::select! {
                changed = output.changed() => {
                    if changed.is_err() {
                        return self.current();
                    }
                }
                _ = input.changed() => {}
            }
        }
    }
}

impl<T> Drop for Debouncer<T> {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn debounce_loop<T>(mut input: watch::Receiver<T>, output: watch::Sender<T>, delay: Duration)
where
    T: Clone + PartialEq,
{
    loop {
        if input.changed().await.is_err() {
            return;
        }

        // Each change restarts the wait
        loop {
            tokio::select! {
                changed = input.changed() => {
                    if changed.is_err() {
                        return;
                    }
                }
                _ = tokio::time::sleep(delay) => break,
            }
        }

        let value = input.borrow_and_update().clone();
        output.send_if_modified(|current| {
            if *current != value {
                *current = value;
                true
            } else {
                false
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    const DELAY: Duration = Duration::from_millis(500);

    fn count_emissions(debouncer: &Debouncer<String>) -> Arc<AtomicUsize> {
        let count = Arc::new(AtomicUsize::new(0));
        let mut rx = debouncer.subscribe();
        let counter = Arc::clone(&count);
        tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });
        count
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_emits_last_value_once() {
        let debouncer = Debouncer::new(String::new(), DELAY);
        let emissions = count_emissions(&debouncer);

        for text in ["b", "ba", "bat", "batm", "batman"] {
            debouncer.set(text.to_string());
            tokio::time::sleep(Duration::from_millis(100)).await;
            assert_eq!(debouncer.current(), "");
        }

        tokio::time::sleep(DELAY).await;
        assert_eq!(debouncer.current(), "batman");

        tokio::time::sleep(DELAY * 4).await;
        assert_eq!(emissions.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_value_held_until_full_delay_elapses() {
        let debouncer = Debouncer::new(0u32, DELAY);
        debouncer.set(7);

        tokio::time::sleep(DELAY - Duration::from_millis(1)).await;
        assert_eq!(debouncer.current(), 0);
        assert!(!debouncer.is_settled());

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert_eq!(debouncer.current(), 7);
        assert!(debouncer.is_settled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_each_stable_period_emits() {
        let debouncer = Debouncer::new(String::new(), DELAY);
        let emissions = count_emissions(&debouncer);

        debouncer.set("alien".to_string());
        tokio::time::sleep(DELAY * 2).await;
        debouncer.set("aliens".to_string());
        tokio::time::sleep(DELAY * 2).await;

        assert_eq!(debouncer.current(), "aliens");
        assert_eq!(emissions.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_returning_to_current_value_does_not_emit() {
        let debouncer = Debouncer::new("up".to_string(), DELAY);
        let emissions = count_emissions(&debouncer);

        debouncer.set("upgrade".to_string());
        tokio::time::sleep(Duration::from_millis(100)).await;
        debouncer.set("up".to_string());
        tokio::time::sleep(DELAY * 2).await;

        assert_eq!(debouncer.current(), "up");
        assert_eq!(emissions.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_cancels_pending_emission() {
        let debouncer = Debouncer::new(String::new(), DELAY);
        let mut rx = debouncer.subscribe();

        debouncer.set("heat".to_string());
        drop(debouncer);

        tokio::time::sleep(DELAY * 2).await;
        assert_eq!(*rx.borrow_and_update(), "");
        assert!(rx.changed().await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_settled_waits_for_output() {
        let debouncer = Debouncer::new(String::new(), DELAY);
        debouncer.set("dune".to_string());

        let settled = debouncer.settled().await;
        assert_eq!(settled, "dune");
        assert_eq!(debouncer.current(), "dune");
    }
}
