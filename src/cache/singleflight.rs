use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::broadcast;

use crate::error::RenderError;

/// Coordinates concurrent misses for the same key so only one of them
/// actually runs the supplied future; every other caller awaits its
/// result instead. Built by hand rather than via moka because the
/// coordinated work here is an async render with its own error type, not
/// a simple cache-population closure moka's `get_with` expects.
pub struct SingleFlight<K, V> {
    registrations: Mutex<HashMap<K, broadcast::Sender<Result<V, String>>>>,
}

impl<K, V> SingleFlight<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new() -> Self {
        Self {
            registrations: Mutex::new(HashMap::new()),
        }
    }

    pub async fn run<F, Fut>(&self, key: K, work: F) -> Result<V, RenderError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, RenderError>>,
    {
        let mut receiver = {
            let mut registrations = self.registrations.lock();
            if let Some(sender) = registrations.get(&key) {
                Some(sender.subscribe())
            } else {
                let (sender, _) = broadcast::channel(1);
                registrations.insert(key.clone(), sender);
                None
            }
        };

        if let Some(receiver) = receiver.take() {
            return wait_for_result(receiver).await;
        }

        let result = work().await;
        let broadcastable = result
            .as_ref()
            .map(Clone::clone)
            .map_err(ToString::to_string);

        let sender = self.registrations.lock().remove(&key);
        if let Some(sender) = sender {
            let _ = sender.send(broadcastable);
        }
        result
    }
}

impl<K, V> Default for SingleFlight<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

async fn wait_for_result<V: Clone>(
    mut receiver: broadcast::Receiver<Result<V, String>>,
) -> Result<V, RenderError> {
    match receiver.recv().await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(message)) => Err(RenderError::UpstreamQuery(message)),
        Err(_) => Err(RenderError::UpstreamQuery(
            "single-flight leader dropped without a result".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn single_leader_runs_the_work_once() {
        let flight = Arc::new(SingleFlight::<&'static str, u64>::new());
        let calls = Arc::new(AtomicU64::new(0));

        let mut handles = Vec::new();
        for _ in 0..20 {
            let flight = Arc::clone(&flight);
            let calls = Arc::clone(&calls);
            handles.push(tokio::spawn(async move {
                flight
                    .run("k", || {
                        let calls = Arc::clone(&calls);
                        async move {
                            calls.fetch_add(1, Ordering::Relaxed);
                            tokio::time::sleep(Duration::from_millis(5)).await;
                            Ok(7u64)
                        }
                    })
                    .await
                    .unwrap()
            }));
        }

        let mut results = Vec::new();
        for h in handles {
            results.push(h.await.unwrap());
        }

        assert_eq!(calls.load(Ordering::Relaxed), 1);
        assert!(results.iter().all(|&v| v == 7));
    }

    #[tokio::test]
    async fn error_is_propagated_to_every_waiter() {
        let flight = Arc::new(SingleFlight::<&'static str, u64>::new());
        let mut handles = Vec::new();
        for _ in 0..5 {
            let flight = Arc::clone(&flight);
            handles.push(tokio::spawn(async move {
                flight
                    .run("k", || async {
                        tokio::time::sleep(Duration::from_millis(5)).await;
                        Err(RenderError::UpstreamQuery("boom".to_string()))
                    })
                    .await
            }));
        }
        for h in handles {
            assert!(h.await.unwrap().is_err());
        }
    }
}
