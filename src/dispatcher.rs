use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::db::DbPool;
use crate::domain::ports::{InventoryGateway, OutboxStore};
use crate::infrastructure::inventory_client::HttpInventoryClient;
use crate::infrastructure::outbox_store::DieselOutboxStore;

/// Periodic outbox dispatcher.
///
/// Reads all unsent stock adjustments, delivers each to the inventory
/// service, and flips `sent` on success. Delivery is at-least-once: a crash
/// between the call and the flip leaves the record unsent and it is
/// redelivered on the next cycle. Records are independent; one failing never
/// blocks the others.
///
/// The single-writer requirement is met structurally: one instance runs on
/// one dedicated thread, and a cycle finishes before the next starts.
pub struct OutboxDispatcher<S, G> {
    store: S,
    gateway: G,
    interval: Duration,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleStats {
    pub delivered: usize,
    pub failed: usize,
}

impl<S: OutboxStore, G: InventoryGateway> OutboxDispatcher<S, G> {
    pub fn new(store: S, gateway: G, interval: Duration) -> Self {
        Self {
            store,
            gateway,
            interval,
        }
    }

    /// Run one dispatch cycle over the current unsent set.
    pub fn run_cycle(&self) -> CycleStats {
        let mut stats = CycleStats::default();

        let pending = match self.store.find_unsent() {
            Ok(pending) => pending,
            Err(e) => {
                log::error!("Outbox scan failed: {e}");
                return stats;
            }
        };

        for record in pending {
            match self.gateway.adjust_stock(record.endpoint, &record.payload) {
                Ok(()) => match self.store.mark_sent(record.id) {
                    Ok(()) => stats.delivered += 1,
                    // The adjustment went out but the flag did not stick; the
                    // record stays unsent and is redelivered next cycle, which
                    // the inventory service tolerates per record.
                    Err(e) => {
                        log::error!("Delivered record {} but could not mark it sent: {e}", record.id);
                        stats.failed += 1;
                    }
                },
                Err(e) => {
                    log::warn!(
                        "Could not deliver {} record {}: {e}",
                        record.endpoint,
                        record.id
                    );
                    stats.failed += 1;
                }
            }
        }

        stats
    }

    /// Loop forever: one cycle, then sleep the configured interval.
    pub fn run_forever(&self) {
        loop {
            let stats = self.run_cycle();
            if stats.delivered > 0 || stats.failed > 0 {
                log::info!(
                    "Stock outbox cycle: {} delivered, {} pending retry",
                    stats.delivered,
                    stats.failed
                );
            }
            thread::sleep(self.interval);
        }
    }
}

/// Spawn the dispatcher on its own worker thread.
///
/// The HTTP client is built on the new thread because it is a blocking
/// reqwest client, which refuses to live on a runtime thread.
pub fn spawn(
    pool: DbPool,
    inventory_url: String,
    interval: Duration,
) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("stock-outbox-dispatcher".to_string())
        .spawn(move || {
            let gateway = match HttpInventoryClient::new(&inventory_url) {
                Ok(gateway) => gateway,
                Err(e) => {
                    log::error!("Could not build inventory client, dispatcher disabled: {e}");
                    return;
                }
            };
            OutboxDispatcher::new(DieselOutboxStore::new(pool), gateway, interval).run_forever();
        })
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Mutex;

    use chrono::Utc;
    use serde_json::{json, Value};
    use uuid::Uuid;

    use super::*;
    use crate::domain::errors::DomainError;
    use crate::domain::ports::DeliveryError;
    use crate::domain::stock::{StockAdjustment, StockEndpoint};

    struct InMemoryStore {
        records: Mutex<Vec<StockAdjustment>>,
        sent: Mutex<HashSet<Uuid>>,
        fail_scan: bool,
        fail_mark_once: Mutex<bool>,
    }

    impl InMemoryStore {
        fn with_records(records: Vec<StockAdjustment>) -> Self {
            Self {
                records: Mutex::new(records),
                sent: Mutex::new(HashSet::new()),
                fail_scan: false,
                fail_mark_once: Mutex::new(false),
            }
        }

        fn sent_ids(&self) -> HashSet<Uuid> {
            self.sent.lock().unwrap().clone()
        }
    }

    impl OutboxStore for InMemoryStore {
        fn find_unsent(&self) -> Result<Vec<StockAdjustment>, DomainError> {
            if self.fail_scan {
                return Err(DomainError::Internal("connection refused".to_string()));
            }
            let sent = self.sent.lock().unwrap();
            Ok(self
                .records
                .lock()
                .unwrap()
                .iter()
                .filter(|r| !sent.contains(&r.id))
                .cloned()
                .collect())
        }

        fn mark_sent(&self, id: Uuid) -> Result<(), DomainError> {
            let mut fail_once = self.fail_mark_once.lock().unwrap();
            if *fail_once {
                *fail_once = false;
                return Err(DomainError::Internal("connection reset".to_string()));
            }
            self.sent.lock().unwrap().insert(id);
            Ok(())
        }
    }

    struct RecordingGateway {
        calls: Mutex<Vec<(StockEndpoint, Value)>>,
        rejected_payload: Mutex<Option<Value>>,
    }

    impl RecordingGateway {
        fn new() -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                rejected_payload: Mutex::new(None),
            }
        }

        fn calls(&self) -> Vec<(StockEndpoint, Value)> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl InventoryGateway for RecordingGateway {
        fn adjust_stock(
            &self,
            endpoint: StockEndpoint,
            payload: &Value,
        ) -> Result<(), DeliveryError> {
            if let Some(rejected) = &*self.rejected_payload.lock().unwrap() {
                if rejected == payload {
                    return Err(DeliveryError("503 Service Unavailable".to_string()));
                }
            }
            self.calls
                .lock()
                .unwrap()
                .push((endpoint, payload.clone()));
            Ok(())
        }
    }

    fn record(endpoint: StockEndpoint, product_id: i64, stock: i32) -> StockAdjustment {
        StockAdjustment {
            id: Uuid::new_v4(),
            endpoint,
            payload: json!([{ "productId": product_id, "stock": stock }]),
            created_at: Utc::now(),
        }
    }

    fn dispatcher<S: OutboxStore, G: InventoryGateway>(store: S, gateway: G) -> OutboxDispatcher<S, G> {
        OutboxDispatcher::new(store, gateway, Duration::from_secs(60))
    }

    #[test]
    fn delivers_every_unsent_record_and_marks_it_sent() {
        let first = record(StockEndpoint::ConsumeStock, 1, 2);
        let second = record(StockEndpoint::AddStock, 2, 5);
        let ids: HashSet<Uuid> = [first.id, second.id].into_iter().collect();
        let dispatcher = dispatcher(
            InMemoryStore::with_records(vec![first, second]),
            RecordingGateway::new(),
        );

        let stats = dispatcher.run_cycle();

        assert_eq!(
            stats,
            CycleStats {
                delivered: 2,
                failed: 0
            }
        );
        assert_eq!(dispatcher.store.sent_ids(), ids);
        assert_eq!(dispatcher.gateway.calls().len(), 2);
    }

    #[test]
    fn an_empty_outbox_is_a_quiet_cycle() {
        let dispatcher = dispatcher(
            InMemoryStore::with_records(vec![]),
            RecordingGateway::new(),
        );

        let stats = dispatcher.run_cycle();

        assert_eq!(stats, CycleStats::default());
        assert!(dispatcher.gateway.calls().is_empty());
    }

    #[test]
    fn a_failed_delivery_stays_unsent_and_does_not_block_the_rest() {
        let failing = record(StockEndpoint::ConsumeStock, 1, 2);
        let healthy = record(StockEndpoint::AddStock, 2, 5);
        let failing_id = failing.id;
        let healthy_id = healthy.id;

        let gateway = RecordingGateway::new();
        *gateway.rejected_payload.lock().unwrap() = Some(failing.payload.clone());
        let dispatcher = dispatcher(InMemoryStore::with_records(vec![failing, healthy]), gateway);

        let stats = dispatcher.run_cycle();

        assert_eq!(
            stats,
            CycleStats {
                delivered: 1,
                failed: 1
            }
        );
        let sent = dispatcher.store.sent_ids();
        assert!(sent.contains(&healthy_id));
        assert!(!sent.contains(&failing_id));

        // Once the service recovers, the next cycle picks the record back up.
        *dispatcher.gateway.rejected_payload.lock().unwrap() = None;
        let stats = dispatcher.run_cycle();
        assert_eq!(
            stats,
            CycleStats {
                delivered: 1,
                failed: 0
            }
        );
        assert!(dispatcher.store.sent_ids().contains(&failing_id));
    }

    #[test]
    fn redelivery_after_a_missed_sent_flip_is_tolerated() {
        let only = record(StockEndpoint::ConsumeStock, 1, 2);
        let store = InMemoryStore::with_records(vec![only]);
        // Simulate a crash between "call succeeded" and "mark sent".
        *store.fail_mark_once.lock().unwrap() = true;
        let dispatcher = dispatcher(store, RecordingGateway::new());

        let stats = dispatcher.run_cycle();
        assert_eq!(
            stats,
            CycleStats {
                delivered: 0,
                failed: 1
            }
        );

        // The record is delivered a second time; the cycle treats that as a
        // normal success, not an error.
        let stats = dispatcher.run_cycle();
        assert_eq!(
            stats,
            CycleStats {
                delivered: 1,
                failed: 0
            }
        );
        assert_eq!(dispatcher.gateway.calls().len(), 2);
    }

    #[test]
    fn a_failed_outbox_scan_ends_the_cycle_without_deliveries() {
        let mut store = InMemoryStore::with_records(vec![record(StockEndpoint::AddStock, 1, 1)]);
        store.fail_scan = true;
        let dispatcher = dispatcher(store, RecordingGateway::new());

        let stats = dispatcher.run_cycle();

        assert_eq!(stats, CycleStats::default());
        assert!(dispatcher.gateway.calls().is_empty());
    }
}
