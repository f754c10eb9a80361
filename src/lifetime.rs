//! Component lifetime
//!
//! Results of operations still in flight when a component is torn down are
//! discarded rather than applied.

use std::future::Future;
use tokio::sync::watch;

#[derive(Debug)]
pub struct Lifetime {
    ended: watch::Sender<bool>,
}

impl Lifetime {
    pub fn new() -> Self {
        let (ended, _) = watch::channel(false);
        Self { ended }
    }

    /// Mark the owner as torn down. Idempotent.
    pub fn end(&self) {
        self.ended.send_replace(true);
    }

    pub fn is_ended(&self) -> bool {
        *self.ended.borrow()
    }

    /// Drive `fut` unless the lifetime ends first.
    ///
    /// Returns `None` if the lifetime had already ended, ends while `fut`
    /// is pending, or ended by the time `fut` resolved.
    pub async fn run<F: Future>(&self, fut: F) -> Option<F::Output> {
        let mut ended = self.ended.subscribe();
        if *ended.borrow_and_update() {
            return None;
        }

        tokio::select! {
            biased;
            _ = ended.wait_for(|ended| *ended) => None,
            output = fut => {
                if self.is_ended() {
                    None
                } else {
                    Some(output)
                }
            }
        }
    }
}

impl Default for Lifetime {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_run_completes_while_alive() {
        let lifetime = Lifetime::new();
        assert_eq!(lifetime.run(async { 7 }).await, Some(7));
    }

    #[tokio::test]
    async fn test_run_after_end_is_skipped() {
        let lifetime = Lifetime::new();
        lifetime.end();
        lifetime.end();
        assert!(lifetime.is_ended());
        assert_eq!(lifetime.run(async { 7 }).await, None);
    }

    #[tokio::test]
    async fn test_end_discards_pending() {
        let lifetime = Arc::new(Lifetime::new());
        let runner = lifetime.clone();
        let task = tokio::spawn(async move {
            runner
                .run(async {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    "late"
                })
                .await
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        lifetime.end();

        let result = tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(result, None);
    }
}
