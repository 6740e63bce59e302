//! Shared harness: one service over in-memory stores, a manual clock and
//! an observable event bus.

use sigil_bus::{EventFilter, InMemoryEventBus, LedgerEvent, Subscription};
use sigil_ledger::adapters::{InMemoryLockStore, LocalKeySigner, ManualClock};
use sigil_ledger::application::SigilLedgerDependencies;
use sigil_ledger::{
    ArtifactCore, InhaleReceipt, LedgerConfig, SendRequest, ShareLink, SigilLedgerApi,
    SigilLedgerService,
};
use sigil_types::{Amount, Hash};
use std::sync::Arc;

pub const START_PULSE: u64 = 1_000;

pub struct Node {
    pub service: SigilLedgerService,
    pub clock: Arc<ManualClock>,
    pub locks: Arc<InMemoryLockStore>,
    pub bus: Arc<InMemoryEventBus>,
    pub owner: LocalKeySigner,
    pub receiver: LocalKeySigner,
}

impl Node {
    pub fn new(config: LedgerConfig) -> Self {
        Self::with(config, |_| {})
    }

    pub fn with(config: LedgerConfig, customize: impl FnOnce(&mut SigilLedgerDependencies)) -> Self {
        let clock = Arc::new(ManualClock::new(START_PULSE));
        let locks = Arc::new(InMemoryLockStore::new());
        let bus = Arc::new(InMemoryEventBus::new());
        let mut deps = SigilLedgerDependencies::in_memory(clock.clone());
        deps.locks = locks.clone();
        deps.events = bus.clone();
        customize(&mut deps);
        Self {
            service: SigilLedgerService::new(deps, config).unwrap(),
            clock,
            locks,
            bus,
            owner: LocalKeySigner::from_seed([1u8; 32]),
            receiver: LocalKeySigner::from_seed([2u8; 32]),
        }
    }

    pub async fn issue(&self, base: i64) -> Hash {
        self.service
            .issue(core(), units(base), &self.owner)
            .await
            .unwrap()
            .canonical_hash
    }

    pub async fn send(&self, artifact: Hash, amount: i64) -> ShareLink {
        self.service
            .exhale(artifact, &self.owner, SendRequest::new(units(amount), "tab-1"))
            .await
            .unwrap()
    }

    pub async fn send_and_claim(&self, artifact: Hash, amount: i64) -> InhaleReceipt {
        let share = self.send(artifact, amount).await;
        self.service.inhale(&share, &self.receiver).await.unwrap()
    }

    pub fn subscribe(&self) -> Subscription {
        self.bus.subscribe(EventFilter::all())
    }
}

pub fn core() -> ArtifactCore {
    ArtifactCore {
        creation_pulse: 777,
        beat: 12,
        step_index: 3,
        day_category: "Solhara".to_string(),
    }
}

pub fn units(n: i64) -> Amount {
    Amount::from_units(n).unwrap()
}

/// Every event currently buffered on `subscription`.
pub fn drain(subscription: &mut Subscription) -> Vec<LedgerEvent> {
    let mut events = Vec::new();
    while let Ok(Some(event)) = subscription.try_recv() {
        events.push(event);
    }
    events
}
