//! Concurrent per-item execution with three aggregation policies.
//!
//! # Design
//! Every item operation is spawned into one `JoinSet` before any of them is
//! awaited, so N requests are in flight together with no cap. The join loop
//! is the single synchronization point: children hand their `(position,
//! result)` back through the set and only the aggregator writes the results.
//!
//! - `strict` waits for every child and fails with the error at the lowest
//!   input position, or returns all values in input order.
//! - `best_effort` waits for every child and returns the successes in the
//!   order they completed, dropping failures.
//! - `best_effort_ordered` also drops failures but returns the successes in
//!   input order.
//!
//! A `FanOut` owns a `CancellationToken`. Cancelling it aborts all in-flight
//! children of every run using that `FanOut`. Dropping a run's future aborts
//! its children too, since the `JoinSet` aborts its tasks on drop.

use std::future::Future;
use std::panic::{self, AssertUnwindSafe};

use futures::FutureExt;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::error::ApiError;

/// Cause reported by `strict` when its token is cancelled mid-run.
pub const CANCELLED: &str = "fan-out cancelled";

type Outcome<T> = (usize, Result<T, ApiError>);

/// A cancellation scope for fan-out runs.
#[derive(Debug, Clone, Default)]
pub struct FanOut {
    token: CancellationToken,
}

impl FanOut {
    pub fn new() -> Self {
        Self::default()
    }

    /// Share an existing token, e.g. a child of a wider shutdown token.
    pub fn with_token(token: CancellationToken) -> Self {
        Self { token }
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Run `op` for every key concurrently; all must succeed.
    ///
    /// Values come back in the order of `keys`. On failure the error of the
    /// first failing key in input order is returned, whichever finished
    /// first.
    pub async fn strict<K, T, F, Fut>(
        &self,
        keys: impl IntoIterator<Item = K>,
        op: F,
    ) -> Result<Vec<T>, ApiError>
    where
        F: FnMut(K) -> Fut,
        Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
        T: Send + 'static,
    {
        let (slots, completed) = self.slots(keys, op).await;
        let total = slots.len();
        if !completed {
            tracing::debug!(total, "strict fan-out cancelled");
            return Err(ApiError::Unknown(Some(CANCELLED.to_string())));
        }

        let mut values = Vec::with_capacity(total);
        for (index, slot) in slots.into_iter().enumerate() {
            match slot {
                Some(Ok(value)) => values.push(value),
                Some(Err(err)) => {
                    tracing::debug!(total, index, error = %err, "strict fan-out failed");
                    return Err(err);
                }
                None => {
                    return Err(ApiError::Unknown(Some(format!(
                        "fan-out item {index} did not complete"
                    ))))
                }
            }
        }
        tracing::debug!(total, "strict fan-out finished");
        Ok(values)
    }

    /// Run `op` for every key concurrently; keep whatever succeeded.
    ///
    /// Values come back in completion order. Failures are dropped. If the
    /// token is cancelled the successes gathered so far are returned.
    pub async fn best_effort<K, T, F, Fut>(&self, keys: impl IntoIterator<Item = K>, op: F) -> Vec<T>
    where
        F: FnMut(K) -> Fut,
        Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
        T: Send + 'static,
    {
        let mut set = launch(keys, op);
        let total = set.len();
        let mut values = Vec::with_capacity(total);

        let completed = self
            .join(&mut set, |index, result| match result {
                Ok(value) => values.push(value),
                Err(err) => tracing::debug!(index, error = %err, "dropping failed fan-out item"),
            })
            .await;

        tracing::debug!(
            total,
            succeeded = values.len(),
            cancelled = !completed,
            "best-effort fan-out finished"
        );
        values
    }

    /// Run `op` for every key concurrently; keep whatever succeeded, in
    /// input order.
    ///
    /// Failures are dropped and the surviving values keep the relative order
    /// of their keys, whichever finished first. If the token is cancelled the
    /// successes gathered so far are returned, still in input order.
    pub async fn best_effort_ordered<K, T, F, Fut>(
        &self,
        keys: impl IntoIterator<Item = K>,
        op: F,
    ) -> Vec<T>
    where
        F: FnMut(K) -> Fut,
        Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
        T: Send + 'static,
    {
        let (slots, completed) = self.slots(keys, op).await;
        let total = slots.len();

        let values: Vec<T> = slots
            .into_iter()
            .enumerate()
            .filter_map(|(index, slot)| match slot? {
                Ok(value) => Some(value),
                Err(err) => {
                    tracing::debug!(index, error = %err, "dropping failed fan-out item");
                    None
                }
            })
            .collect();
        tracing::debug!(
            total,
            succeeded = values.len(),
            cancelled = !completed,
            "ordered best-effort fan-out finished"
        );
        values
    }

    /// Run every item and return the outcomes by input position, plus
    /// whether the run completed. Slots of aborted items stay `None`.
    async fn slots<K, T, F, Fut>(
        &self,
        keys: impl IntoIterator<Item = K>,
        op: F,
    ) -> (Vec<Option<Result<T, ApiError>>>, bool)
    where
        F: FnMut(K) -> Fut,
        Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
        T: Send + 'static,
    {
        let mut set = launch(keys, op);
        let total = set.len();
        let mut slots: Vec<Option<Result<T, ApiError>>> = (0..total).map(|_| None).collect();
        let completed = self
            .join(&mut set, |index, result| slots[index] = Some(result))
            .await;
        (slots, completed)
    }

    /// Drain `set`, handing each outcome to `on_done` as it completes.
    /// Returns `false` if the token was cancelled first.
    async fn join<T, F>(&self, set: &mut JoinSet<Outcome<T>>, mut on_done: F) -> bool
    where
        T: Send + 'static,
        F: FnMut(usize, Result<T, ApiError>),
    {
        loop {
            tokio::select! {
                biased;
                _ = self.token.cancelled() => {
                    set.shutdown().await;
                    return false;
                }
                joined = set.join_next() => match joined {
                    None => return true,
                    Some(Ok((index, result))) => on_done(index, result),
                    Some(Err(err)) => tracing::warn!(error = %err, "fan-out task was lost"),
                },
            }
        }
    }
}

/// Spawn one task per key. Panics, whether raised while `op` builds the
/// future or while the future runs, are caught so every child reports back
/// with its position.
fn launch<K, T, F, Fut>(keys: impl IntoIterator<Item = K>, mut op: F) -> JoinSet<Outcome<T>>
where
    F: FnMut(K) -> Fut,
    Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
    T: Send + 'static,
{
    let mut set = JoinSet::new();
    for (index, key) in keys.into_iter().enumerate() {
        match panic::catch_unwind(AssertUnwindSafe(|| op(key))) {
            Ok(fut) => {
                set.spawn(async move {
                    let result = match AssertUnwindSafe(fut).catch_unwind().await {
                        Ok(result) => result,
                        Err(_) => Err(panicked(index)),
                    };
                    (index, result)
                });
            }
            Err(_) => {
                set.spawn(async move { (index, Err(panicked(index))) });
            }
        }
    }
    set
}

fn panicked(index: usize) -> ApiError {
    ApiError::Unknown(Some(format!("fan-out item {index} panicked")))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use tokio::time::sleep;

    use super::*;

    fn ms(millis: u64) -> Duration {
        Duration::from_millis(millis)
    }

    #[tokio::test(start_paused = true)]
    async fn strict_returns_values_in_input_order() {
        // Later keys finish first.
        let keys: Vec<u64> = (1..=5).collect();
        let values = FanOut::new()
            .strict(keys, |key| async move {
                sleep(ms(100 - key * 10)).await;
                Ok::<_, ApiError>(key * 10)
            })
            .await
            .unwrap();
        assert_eq!(values, vec![10, 20, 30, 40, 50]);
    }

    #[tokio::test(start_paused = true)]
    async fn strict_fails_with_the_failing_item_error() {
        let err = FanOut::new()
            .strict(["a", "b", "c"], |key| async move {
                sleep(ms(10)).await;
                match key {
                    "b" => Err(ApiError::BadStatus(500)),
                    other => Ok(other),
                }
            })
            .await
            .unwrap_err();
        assert_eq!(err, ApiError::BadStatus(500));
    }

    #[tokio::test(start_paused = true)]
    async fn strict_error_follows_input_order_not_completion_order() {
        // "c" fails first in time, "b" fails later; "b" comes first in input.
        let err = FanOut::new()
            .strict(["a", "b", "c"], |key| async move {
                match key {
                    "a" => {
                        sleep(ms(5)).await;
                        Ok(key)
                    }
                    "b" => {
                        sleep(ms(50)).await;
                        Err(ApiError::Unauthorized)
                    }
                    _ => {
                        sleep(ms(1)).await;
                        Err(ApiError::NoContent)
                    }
                }
            })
            .await
            .unwrap_err();
        assert_eq!(err, ApiError::Unauthorized);
    }

    #[tokio::test(start_paused = true)]
    async fn best_effort_keeps_successes_in_completion_order() {
        let values = FanOut::new()
            .best_effort(["a", "b", "c"], |key| async move {
                match key {
                    "a" => {
                        sleep(ms(30)).await;
                        Ok(key)
                    }
                    "b" => {
                        sleep(ms(20)).await;
                        Err(ApiError::BadStatus(404))
                    }
                    _ => {
                        sleep(ms(10)).await;
                        Ok(key)
                    }
                }
            })
            .await;
        assert_eq!(values, vec!["c", "a"]);
    }

    #[tokio::test(start_paused = true)]
    async fn best_effort_ordered_keeps_input_order() {
        // "c" finishes first and "b" fails; "a" still comes first.
        let values = FanOut::new()
            .best_effort_ordered(["a", "b", "c"], |key| async move {
                match key {
                    "a" => {
                        sleep(ms(30)).await;
                        Ok(key)
                    }
                    "b" => {
                        sleep(ms(20)).await;
                        Err(ApiError::BadStatus(404))
                    }
                    _ => {
                        sleep(ms(10)).await;
                        Ok(key)
                    }
                }
            })
            .await;
        assert_eq!(values, vec!["a", "c"]);
    }

    #[tokio::test(start_paused = true)]
    async fn best_effort_ordered_returns_partial_results_on_cancel() {
        let fan_out = FanOut::new();
        let token = fan_out.token().clone();
        tokio::spawn(async move {
            sleep(ms(50)).await;
            token.cancel();
        });

        let values = fan_out
            .best_effort_ordered([1u32, 2, 3], |key| async move {
                let delay = if key == 2 { Duration::from_secs(60) } else { ms(40 - key as u64 * 10) };
                sleep(delay).await;
                Ok::<_, ApiError>(key)
            })
            .await;
        assert_eq!(values, vec![1, 3]);
    }

    #[tokio::test(start_paused = true)]
    async fn items_run_concurrently() {
        let start = tokio::time::Instant::now();
        let values = FanOut::new()
            .strict(0..20u32, |key| async move {
                sleep(ms(100)).await;
                Ok::<_, ApiError>(key)
            })
            .await
            .unwrap();
        assert_eq!(values.len(), 20);
        assert!(start.elapsed() < ms(200));
    }

    #[tokio::test]
    async fn empty_input_yields_empty_output() {
        let fan_out = FanOut::new();
        let strict = fan_out
            .strict(Vec::<u32>::new(), |key| async move { Ok::<_, ApiError>(key) })
            .await
            .unwrap();
        assert!(strict.is_empty());
        let best = fan_out
            .best_effort(Vec::<u32>::new(), |key| async move { Ok::<_, ApiError>(key) })
            .await;
        assert!(best.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn cancelling_the_token_aborts_children() {
        let fan_out = FanOut::new();
        let finished = Arc::new(AtomicUsize::new(0));

        let token = fan_out.token().clone();
        tokio::spawn(async move {
            sleep(ms(10)).await;
            token.cancel();
        });

        let counter = finished.clone();
        let err = fan_out
            .strict(1..=3, move |_| {
                let counter = counter.clone();
                async move {
                    sleep(Duration::from_secs(60)).await;
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, ApiError>(())
                }
            })
            .await
            .unwrap_err();
        assert_eq!(err, ApiError::Unknown(Some(CANCELLED.to_string())));

        sleep(Duration::from_secs(120)).await;
        assert_eq!(finished.load(Ordering::SeqCst), 0);
        assert!(fan_out.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn best_effort_returns_partial_results_on_cancel() {
        let fan_out = FanOut::new();
        let token = fan_out.token().clone();
        tokio::spawn(async move {
            sleep(ms(50)).await;
            token.cancel();
        });

        let values = fan_out
            .best_effort([1u32, 2], |key| async move {
                let delay = if key == 1 { ms(10) } else { Duration::from_secs(60) };
                sleep(delay).await;
                Ok::<_, ApiError>(key)
            })
            .await;
        assert_eq!(values, vec![1]);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_run_aborts_children() {
        let finished = Arc::new(AtomicUsize::new(0));
        let counter = finished.clone();
        let fan_out = FanOut::new();

        let run = fan_out.strict(1..=3, move |_| {
            let counter = counter.clone();
            async move {
                sleep(Duration::from_secs(60)).await;
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<_, ApiError>(())
            }
        });
        assert!(tokio::time::timeout(ms(10), run).await.is_err());

        sleep(Duration::from_secs(120)).await;
        assert_eq!(finished.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn panicking_item_is_reported_at_its_position() {
        let err = FanOut::new()
            .strict([1u32, 2, 3], |key| async move {
                if key == 2 {
                    panic!("boom");
                }
                Ok::<_, ApiError>(key)
            })
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ApiError::Unknown(Some("fan-out item 1 panicked".to_string()))
        );
    }

    #[tokio::test]
    async fn panic_while_building_an_item_is_reported_at_its_position() {
        let err = FanOut::new()
            .strict([1u32, 2, 3], |key| {
                if key == 2 {
                    panic!("boom");
                }
                async move { Ok::<_, ApiError>(key) }
            })
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ApiError::Unknown(Some("fan-out item 1 panicked".to_string()))
        );

        let values = FanOut::new()
            .best_effort_ordered([1u32, 2, 3], |key| {
                if key == 2 {
                    panic!("boom");
                }
                async move { Ok::<_, ApiError>(key) }
            })
            .await;
        assert_eq!(values, vec![1, 3]);
    }
}
