//! Per-key coalescing of concurrent async work.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use futures::future::{BoxFuture, FutureExt, Shared};

type FlightMap<K, V> = HashMap<K, (u64, Shared<BoxFuture<'static, V>>)>;

/// At most one outstanding future per key; concurrent callers await the
/// same result.
///
/// The entry is removed when the future completes, whatever its output,
/// so the next caller after a failure starts a new flight.
pub struct SingleFlight<K, V> {
    flights: Arc<Mutex<FlightMap<K, V>>>,
    generation: AtomicU64,
}

impl<K, V> Default for SingleFlight<K, V> {
    fn default() -> Self {
        Self {
            flights: Arc::new(Mutex::new(HashMap::new())),
            generation: AtomicU64::new(0),
        }
    }
}

fn lock<K, V>(flights: &Mutex<FlightMap<K, V>>) -> MutexGuard<'_, FlightMap<K, V>> {
    flights.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl<K, V> SingleFlight<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Join the flight for `key`, or start one with `make`.
    ///
    /// Returns the shared output and whether this caller started the flight.
    pub async fn run<F, Fut>(&self, key: K, make: F) -> (V, bool)
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = V> + Send + 'static,
    {
        let (flight, leader) = {
            let mut flights = lock(&self.flights);
            match flights.get(&key) {
                Some((_, flight)) => (flight.clone(), false),
                None => {
                    let id = self.generation.fetch_add(1, Ordering::Relaxed);
                    let registry = Arc::clone(&self.flights);
                    let owned_key = key.clone();
                    let work = make();

                    let flight = async move {
                        let output = work.await;
                        let mut flights = lock(&registry);
                        // Only clear our own entry; a forget() may have let a newer flight in.
                        if flights.get(&owned_key).is_some_and(|(generation, _)| *generation == id) {
                            flights.remove(&owned_key);
                        }
                        output
                    }
                    .boxed()
                    .shared();

                    flights.insert(key, (id, flight.clone()));
                    (flight, true)
                }
            }
        };

        (flight.await, leader)
    }

    /// Detach the current flight for `key` so the next caller starts a new one.
    ///
    /// Callers already waiting on the old flight still receive its output.
    pub fn forget(&self, key: &K) -> bool {
        lock(&self.flights).remove(key).is_some()
    }

    /// Number of outstanding flights.
    pub fn in_flight(&self) -> usize {
        lock(&self.flights).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[tokio::test]
    async fn test_concurrent_callers_share_one_execution() {
        let flights: Arc<SingleFlight<String, u32>> = Arc::new(SingleFlight::new());
        let executions = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..20)
            .map(|_| {
                let flights = Arc::clone(&flights);
                let executions = Arc::clone(&executions);
                tokio::spawn(async move {
                    flights
                        .run("key".to_string(), move || async move {
                            executions.fetch_add(1, Ordering::SeqCst);
                            tokio::time::sleep(Duration::from_millis(50)).await;
                            42
                        })
                        .await
                })
            })
            .collect();

        let mut leaders = 0;
        for task in tasks {
            let (value, leader) = task.await.unwrap();
            assert_eq!(value, 42);
            if leader {
                leaders += 1;
            }
        }

        assert_eq!(executions.load(Ordering::SeqCst), 1);
        assert_eq!(leaders, 1);
        assert_eq!(flights.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_entry_cleared_after_completion() {
        let flights: SingleFlight<&'static str, Result<u32, String>> = SingleFlight::new();

        let (first, _) = flights
            .run("key", || async { Err::<u32, _>("boom".to_string()) })
            .await;
        assert!(first.is_err());
        assert_eq!(flights.in_flight(), 0);

        let (second, leader) = flights.run("key", || async { Ok(7) }).await;
        assert_eq!(second, Ok(7));
        assert!(leader);
    }

    #[tokio::test]
    async fn test_distinct_keys_do_not_coalesce() {
        let flights: SingleFlight<u32, u32> = SingleFlight::new();
        let (a, b) = tokio::join!(
            flights.run(1, || async { 1 }),
            flights.run(2, || async { 2 })
        );
        assert_eq!((a, b), ((1, true), (2, true)));
    }

    #[tokio::test]
    async fn test_forget_lets_next_caller_start_new_flight() {
        let flights: Arc<SingleFlight<&'static str, u32>> = Arc::new(SingleFlight::new());
        let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();

        let slow = {
            let flights = Arc::clone(&flights);
            tokio::spawn(async move {
                flights
                    .run("key", move || async move {
                        let _ = release_rx.await;
                        1
                    })
                    .await
            })
        };

        while flights.in_flight() == 0 {
            tokio::task::yield_now().await;
        }
        assert!(flights.forget(&"key"));

        let (fresh, leader) = flights.run("key", || async { 2 }).await;
        assert_eq!(fresh, 2);
        assert!(leader);

        release_tx.send(()).unwrap();
        assert_eq!(slow.await.unwrap(), (1, true));
        assert_eq!(flights.in_flight(), 0);
    }
}
