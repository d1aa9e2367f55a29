//! # Concurrent Publishers
//!
//! Many tasks publishing into one channel while listeners drain it.
//!
//! ## Properties Checked
//!
//! - Accepted publishes get distinct sequence numbers forming `0..n`.
//! - A single listener sees envelopes in sequence order.
//! - The queue never exceeds its capacity under racing publishers.

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use rand::Rng;
    use relay_bus::{payload_types, AsyncFnListener, BusConfig, BusError, Envelope, Registry};
    use tokio::sync::mpsc;

    use crate::fixtures::{collect, wait_until, Order, RecordingListener};

    const PUBLISHERS: u32 = 8;
    const PER_PUBLISHER: u32 = 250;

    fn quiet_registry() -> Arc<Registry> {
        Arc::new(Registry::with_config(BusConfig::default().with_verbose(false)))
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_sequences_unique_and_contiguous() {
        let total = (PUBLISHERS * PER_PUBLISHER) as usize;
        let registry = quiet_registry();
        registry
            .init_channel("hot", total, payload_types![Order])
            .unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel();
        registry
            .subscribe("hot", Duration::from_millis(300), RecordingListener::new(0, tx))
            .unwrap();

        let publishers = (0..PUBLISHERS).map(|p| {
            let registry = Arc::clone(&registry);
            tokio::spawn(async move {
                let mut sequences = Vec::with_capacity(PER_PUBLISHER as usize);
                for i in 0..PER_PUBLISHER {
                    let envelope = registry
                        .publish("hot", Order { id: p * PER_PUBLISHER + i })
                        .unwrap();
                    sequences.push(envelope.sequence());
                    if rand::thread_rng().gen_bool(0.05) {
                        tokio::task::yield_now().await;
                    }
                }
                sequences
            })
        });

        let mut all = Vec::with_capacity(total);
        for result in futures::future::join_all(publishers).await {
            let sequences = result.unwrap();
            // Each publisher observes its own numbers increasing.
            assert!(sequences.windows(2).all(|w| w[0] < w[1]));
            all.extend(sequences);
        }
        all.sort_unstable();
        assert_eq!(all, (0..total as u64).collect::<Vec<_>>());

        let delivered: Vec<u64> = collect(&mut rx, total, Duration::from_secs(10))
            .await
            .unwrap()
            .into_iter()
            .map(|(_, env)| env.sequence())
            .collect();
        assert!(delivered.windows(2).all(|w| w[0] + 1 == w[1]));

        registry.destroy_channel("hot").await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_capacity_never_exceeded_under_race() {
        const CAPACITY: usize = 16;
        let registry = quiet_registry();
        registry
            .init_channel("narrow", CAPACITY, payload_types![Order])
            .unwrap();

        // Blocks forever so nothing is drained after the first envelope.
        registry
            .subscribe(
                "narrow",
                Duration::from_secs(30),
                AsyncFnListener::new(|_env: Envelope| std::future::pending::<bool>()),
            )
            .unwrap();
        let channel = registry.lookup("narrow").unwrap();
        registry.publish("narrow", Order { id: 0 }).unwrap();
        assert!(wait_until(Duration::from_secs(1), || channel.depth() == 0).await);

        let accepted = Arc::new(AtomicUsize::new(0));
        let publishers = (0..PUBLISHERS).map(|p| {
            let registry = Arc::clone(&registry);
            let accepted = Arc::clone(&accepted);
            tokio::spawn(async move {
                for i in 0..50 {
                    match registry.publish("narrow", Order { id: p * 50 + i }) {
                        Ok(_) => {
                            accepted.fetch_add(1, Ordering::SeqCst);
                        }
                        Err(BusError::Full { .. }) => {}
                        Err(e) => panic!("unexpected error: {e}"),
                    }
                }
            })
        });
        for result in futures::future::join_all(publishers).await {
            result.unwrap();
        }

        assert_eq!(accepted.load(Ordering::SeqCst), CAPACITY);
        assert_eq!(channel.depth(), CAPACITY);
        assert_eq!(channel.next_sequence(), CAPACITY as u64 + 1);
        registry.destroy_channel("narrow").await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_subscribe_churn_while_publishing() {
        let registry = quiet_registry();
        registry
            .init_channel("churn", 1024, payload_types![Order])
            .unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let anchor = RecordingListener::new(0, tx.clone());
        registry
            .subscribe("churn", Duration::from_millis(300), anchor)
            .unwrap();

        let churner = {
            let registry = Arc::clone(&registry);
            let tx = tx.clone();
            tokio::spawn(async move {
                for index in 1..=20 {
                    let listener = RecordingListener::new(index, tx.clone());
                    let id = registry
                        .subscribe("churn", Duration::from_millis(300), listener)
                        .unwrap();
                    tokio::task::yield_now().await;
                    registry.unsubscribe("churn", id).unwrap();
                }
            })
        };

        let mut accepted = 0;
        for id in 0..500 {
            if registry.publish("churn", Order { id }).is_ok() {
                accepted += 1;
            }
            if id % 50 == 0 {
                tokio::task::yield_now().await;
            }
        }
        churner.await.unwrap();
        assert_eq!(accepted, 500);

        // A cancelled loop's in-flight callback still runs to completion.
        let delivered = collect(&mut rx, 500, Duration::from_secs(5)).await.unwrap();
        let unique: HashSet<u64> = delivered.iter().map(|(_, env)| env.sequence()).collect();
        assert_eq!(unique.len(), 500);
        assert_eq!(registry.lookup("churn").unwrap().listener_count(), 1);
        registry.destroy_channel("churn").await.unwrap();
    }
}
