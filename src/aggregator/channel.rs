//! Ordered signal channel
//!
//! The execution side pushes lifecycle signals into a bounded channel; the
//! aggregator drains it in order. Awaiting the next signal is the only
//! suspension point.

use tokio::sync::mpsc;
use tracing::{debug, info};

use super::state::{ConsistencyViolation, EventAggregator};
use crate::models::LifecycleEvent;

pub const DEFAULT_CAPACITY: usize = 1024;

pub fn signal_channel(capacity: usize) -> (mpsc::Sender<LifecycleEvent>, mpsc::Receiver<LifecycleEvent>) {
    mpsc::channel(capacity.max(1))
}

impl EventAggregator {
    /// Drain `rx` until every sender is dropped, applying each signal in order
    pub async fn consume(
        mut self,
        mut rx: mpsc::Receiver<LifecycleEvent>,
    ) -> Result<Self, ConsistencyViolation> {
        let mut received = 0usize;
        while let Some(event) = rx.recv().await {
            received += 1;
            self.apply(&event)?;
        }
        debug!("Signal channel closed after {received} signals");

        if !self.is_run_finished() {
            info!("Signal stream ended without a run-finished signal; projecting finished attempts only");
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::ConsistencyMode;
    use crate::models::{AttemptRef, CaseFinished, Status, TestCase, TestCaseResult};

    fn signals() -> Vec<LifecycleEvent> {
        let attempt = AttemptRef {
            pickle_id: "p1".to_string(),
            attempt_number: 1,
        };
        vec![
            LifecycleEvent::TestCasePrepared(TestCase {
                pickle_id: "p1".to_string(),
                steps: Vec::new(),
            }),
            LifecycleEvent::TestCaseStarted(attempt.clone()),
            LifecycleEvent::TestCaseFinished(CaseFinished {
                test_case: attempt,
                result: TestCaseResult {
                    status: Status::Passed,
                    duration: Some(2.0),
                    retried: false,
                },
            }),
        ]
    }

    #[tokio::test]
    async fn test_consume_in_order_from_producer_task() {
        let (tx, rx) = signal_channel(2);
        let producer = tokio::spawn(async move {
            for event in signals() {
                tx.send(event).await.unwrap();
            }
        });

        let aggregator = EventAggregator::new(ConsistencyMode::Strict)
            .consume(rx)
            .await
            .unwrap();
        producer.await.unwrap();

        assert_eq!(aggregator.final_attempts().len(), 1);
        assert!(!aggregator.is_run_finished());
    }

    #[test]
    fn test_strict_violation_stops_consumption() {
        let (tx, rx) = signal_channel(8);
        let mut events = signals();
        events.remove(0);
        for event in events {
            tx.try_send(event).unwrap();
        }
        drop(tx);

        let result = tokio_test::block_on(EventAggregator::new(ConsistencyMode::Strict).consume(rx));
        assert!(matches!(result, Err(ConsistencyViolation::NotPrepared { .. })));
    }
}
