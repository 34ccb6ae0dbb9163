//! Contract log subscriptions
//!
//! One supervised task per contract forwards raw logs into a shared bounded
//! channel. When the consumer falls behind, `send` waits, which applies
//! backpressure all the way to the node subscription. A failed subscription
//! emits [`SubscriptionEvent::Terminated`] once and is not reopened.
//!
//! ## Usage
//!
//! ```ignore
//! let subscriber = EventSubscriber::new(client, 256);
//! let mut handle = subscriber.subscribe(&[pair_address]).await?;
//! while let Some(event) = handle.recv().await {
//!     // ...
//! }
//! handle.shutdown().await;
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use alloy::primitives::Address;
use futures::StreamExt;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::evm::client::{ChainRpc, LogStream};
use crate::types::SubscriptionEvent;

pub const DEFAULT_SUBSCRIPTION_BUFFER: usize = 256;

pub struct EventSubscriber<C: ChainRpc + ?Sized> {
    client: Arc<C>,
    capacity: usize,
}

impl<C: ChainRpc + ?Sized> EventSubscriber<C> {
    /// `capacity` bounds the shared delivery channel (minimum 1).
    pub fn new(client: Arc<C>, capacity: usize) -> Self {
        Self {
            client,
            capacity: capacity.max(1),
        }
    }

    /// Open a log subscription for every contract, then start forwarding.
    ///
    /// All subscriptions are opened before any task starts; if one fails,
    /// nothing is spawned and the error is returned.
    pub async fn subscribe(&self, contracts: &[Address]) -> Result<SubscriptionHandle> {
        if contracts.is_empty() {
            return Err(Error::Validation(
                "at least one contract address is required".to_string(),
            ));
        }

        let mut streams = Vec::with_capacity(contracts.len());
        for &contract in contracts {
            let stream = self.client.subscribe_logs(contract).await?;
            streams.push((contract, stream));
        }

        let (events_tx, events_rx) = mpsc::channel(self.capacity);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let active = Arc::new(AtomicUsize::new(streams.len()));
        let mut tasks = JoinSet::new();

        for (contract, stream) in streams {
            tasks.spawn(forward_logs(
                contract,
                stream,
                events_tx.clone(),
                shutdown_rx.clone(),
                active.clone(),
            ));
        }

        info!(
            contracts = contracts.len(),
            buffer = self.capacity,
            "Log subscriptions started"
        );

        Ok(SubscriptionHandle {
            events: events_rx,
            tasks,
            shutdown: shutdown_tx,
            active,
            contracts: contracts.to_vec(),
        })
    }
}

async fn forward_logs(
    contract: Address,
    mut stream: LogStream,
    events: mpsc::Sender<SubscriptionEvent>,
    mut shutdown: watch::Receiver<bool>,
    active: Arc<AtomicUsize>,
) {
    let terminal = loop {
        tokio::select! {
            _ = shutdown.changed() => {
                debug!(contract = %contract, "Subscription stopped");
                break None;
            }
            item = stream.next() => match item {
                Some(Ok(entry)) => {
                    if events.send(SubscriptionEvent::Log { contract, entry }).await.is_err() {
                        // consumer dropped the handle
                        break None;
                    }
                }
                Some(Err(e)) => {
                    warn!(contract = %contract, error = %e, "Subscription terminated");
                    break Some(SubscriptionEvent::Terminated {
                        contract,
                        reason: e.to_string(),
                    });
                }
                None => {
                    warn!(contract = %contract, "Subscription stream ended");
                    break Some(SubscriptionEvent::Terminated {
                        contract,
                        reason: "stream ended".to_string(),
                    });
                }
            }
        }
    };

    if let Some(event) = terminal {
        let _ = events.send(event).await;
    }
    active.fetch_sub(1, Ordering::SeqCst);
}

/// Receiving side of a set of subscriptions
#[derive(Debug)]
pub struct SubscriptionHandle {
    events: mpsc::Receiver<SubscriptionEvent>,
    tasks: JoinSet<()>,
    shutdown: watch::Sender<bool>,
    active: Arc<AtomicUsize>,
    contracts: Vec<Address>,
}

impl SubscriptionHandle {
    /// Next event from any contract; `None` once every subscription has ended.
    pub async fn recv(&mut self) -> Option<SubscriptionEvent> {
        self.events.recv().await
    }

    /// Number of subscriptions still delivering
    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    pub fn contracts(&self) -> &[Address] {
        &self.contracts
    }

    /// Stop every delivery loop and wait for the tasks to finish.
    pub async fn shutdown(mut self) {
        let _ = self.shutdown.send(true);
        self.tasks.abort_all();
        while self.tasks.join_next().await.is_some() {}
        self.active.store(0, Ordering::SeqCst);
        info!(contracts = self.contracts.len(), "Log subscriptions shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockChain;
    use crate::types::RawLogEntry;
    use alloy::primitives::{address, Bytes, B256};
    use std::time::Duration;

    const PAIR_A: Address = address!("0eD7e52944161450477ee417DE9Cd3a859b14fD0");
    const PAIR_B: Address = address!("58F876857a02D6762E0101bb5C46A8c1ED44Dc16");

    fn log(address: Address, block: u64) -> RawLogEntry {
        RawLogEntry {
            address,
            topics: vec![B256::repeat_byte(0x1c)],
            data: Bytes::from(vec![0u8; 64]),
            block_number: Some(block),
            transaction_hash: Some(B256::repeat_byte(block as u8)),
        }
    }

    #[tokio::test]
    async fn test_logs_are_delivered_in_order_per_contract() {
        let chain = Arc::new(MockChain::default());
        chain.push_log(log(PAIR_A, 1));
        chain.push_log(log(PAIR_A, 2));
        chain.push_log(log(PAIR_B, 3));

        let subscriber = EventSubscriber::new(chain, 4);
        let mut handle = subscriber.subscribe(&[PAIR_A, PAIR_B]).await.unwrap();
        assert_eq!(handle.contracts(), &[PAIR_A, PAIR_B]);

        let mut blocks_a = Vec::new();
        let mut blocks_b = Vec::new();
        for _ in 0..3 {
            match tokio::time::timeout(Duration::from_secs(1), handle.recv())
                .await
                .unwrap()
                .unwrap()
            {
                SubscriptionEvent::Log { contract, entry } if contract == PAIR_A => {
                    blocks_a.push(entry.block_number.unwrap())
                }
                SubscriptionEvent::Log { contract, entry } if contract == PAIR_B => {
                    blocks_b.push(entry.block_number.unwrap())
                }
                other => panic!("unexpected event {:?}", other),
            }
        }
        assert_eq!(blocks_a, vec![1, 2]);
        assert_eq!(blocks_b, vec![3]);
        assert_eq!(handle.active(), 2);

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_stream_error_terminates_only_that_contract() {
        let chain = Arc::new(MockChain::default());
        chain.push_log(log(PAIR_A, 1));
        chain.close_subscription_after_logs(PAIR_A);

        let subscriber = EventSubscriber::new(chain, 8);
        let mut handle = subscriber.subscribe(&[PAIR_A, PAIR_B]).await.unwrap();

        let first = handle.recv().await.unwrap();
        assert!(matches!(first, SubscriptionEvent::Log { contract, .. } if contract == PAIR_A));

        match handle.recv().await.unwrap() {
            SubscriptionEvent::Terminated { contract, reason } => {
                assert_eq!(contract, PAIR_A);
                assert!(reason.contains("closed"));
            }
            other => panic!("unexpected event {:?}", other),
        }
        tokio::time::timeout(Duration::from_secs(1), async {
            while handle.active() != 1 {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_buffered_logs_arrive_before_terminated() {
        let chain = Arc::new(MockChain::default());
        for block in 1..=5 {
            chain.push_log(log(PAIR_A, block));
        }
        chain.close_subscription_after_logs(PAIR_A);

        let subscriber = EventSubscriber::new(chain, 2);
        let mut handle = subscriber.subscribe(&[PAIR_A]).await.unwrap();

        let mut blocks = Vec::new();
        let mut terminated = false;
        while let Some(event) = handle.recv().await {
            match event {
                SubscriptionEvent::Log { entry, .. } => {
                    assert!(!terminated);
                    blocks.push(entry.block_number.unwrap());
                }
                SubscriptionEvent::Terminated { .. } => terminated = true,
            }
        }

        assert_eq!(blocks, vec![1, 2, 3, 4, 5]);
        assert!(terminated);
        assert_eq!(handle.active(), 0);
    }

    #[tokio::test]
    async fn test_subscribe_fails_fast() {
        let chain = Arc::new(MockChain::default().without_ws());
        let subscriber = EventSubscriber::new(chain, 8);
        assert!(matches!(
            subscriber.subscribe(&[PAIR_A]).await,
            Err(Error::SubscriptionUnavailable)
        ));

        let chain = Arc::new(MockChain::default());
        chain.fail_subscription(PAIR_B);
        let subscriber = EventSubscriber::new(chain, 8);
        assert!(matches!(
            subscriber.subscribe(&[PAIR_A, PAIR_B]).await,
            Err(Error::Subscription(_))
        ));

        assert!(matches!(
            subscriber.subscribe(&[]).await,
            Err(Error::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_slow_consumer_applies_backpressure() {
        let chain = Arc::new(MockChain::default());
        for block in 0..10 {
            chain.push_log(log(PAIR_A, block));
        }

        let subscriber = EventSubscriber::new(chain, 1);
        let mut handle = subscriber.subscribe(&[PAIR_A]).await.unwrap();

        tokio::time::sleep(Duration::from_millis(20)).await;
        let mut received = Vec::new();
        while received.len() < 10 {
            if let Some(SubscriptionEvent::Log { entry, .. }) = handle.recv().await {
                received.push(entry.block_number.unwrap());
            }
        }
        // nothing dropped, nothing reordered
        assert_eq!(received, (0..10).collect::<Vec<_>>());

        handle.shutdown().await;
    }
}
