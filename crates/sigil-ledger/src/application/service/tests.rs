//! # Sigil Ledger Service Tests

use super::*;
use crate::adapters::{
    DigestCommitmentOracle, FailingPublisher, InMemoryLedgerStore, InMemoryLockStore,
    LocalKeySigner, ManualClock,
};
use crate::application::request::SendRequest;
use crate::domain::{
    ArtifactCore, DerivationStatus, HardenedLink, HeadCommitment, HeadStatus, LedgerError, LockKey,
    LockRecord, Nonce, TransferRecord,
};
use crate::domain::SigningError;
use crate::ports::{LockStore, SigilLedgerApi, SigningCapability};
use async_trait::async_trait;
use sigil_bus::{EventFilter, EventTopic, InMemoryEventBus, LedgerEvent};
use sigil_crypto::{Ed25519PublicKey, Ed25519Signature};
use sigil_types::Amount;
use std::sync::atomic::{AtomicUsize, Ordering};

struct Harness {
    service: SigilLedgerService,
    clock: Arc<ManualClock>,
    locks: Arc<InMemoryLockStore>,
    bus: Arc<InMemoryEventBus>,
    owner: LocalKeySigner,
    receiver: LocalKeySigner,
}

fn harness_with(config: LedgerConfig, customize: impl FnOnce(&mut SigilLedgerDependencies)) -> Harness {
    let clock = Arc::new(ManualClock::new(1_000));
    let locks = Arc::new(InMemoryLockStore::new());
    let bus = Arc::new(InMemoryEventBus::new());
    let mut deps = SigilLedgerDependencies::in_memory(clock.clone());
    deps.locks = locks.clone();
    deps.events = bus.clone();
    customize(&mut deps);
    Harness {
        service: SigilLedgerService::new(deps, config).unwrap(),
        clock,
        locks,
        bus,
        owner: LocalKeySigner::from_seed([1u8; 32]),
        receiver: LocalKeySigner::from_seed([2u8; 32]),
    }
}

fn harness() -> Harness {
    harness_with(LedgerConfig::for_testing(), |_| {})
}

fn units(n: i64) -> Amount {
    Amount::from_units(n).unwrap()
}

fn core(beat: u32) -> ArtifactCore {
    ArtifactCore {
        creation_pulse: 1_000,
        beat,
        step_index: 4,
        day_category: "Solhara".into(),
    }
}

/// Signer that yields to the scheduler and counts every signature.
struct SlowSigner {
    inner: LocalKeySigner,
    calls: AtomicUsize,
}

impl SlowSigner {
    fn from_seed(seed: [u8; 32]) -> Self {
        Self {
            inner: LocalKeySigner::from_seed(seed),
            calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SigningCapability for SlowSigner {
    fn public_key(&self) -> Ed25519PublicKey {
        self.inner.public_key()
    }

    async fn sign(&self, message: &[u8]) -> Result<Ed25519Signature, SigningError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        self.inner.sign(message).await
    }
}

/// A second service over `store`, as another process would see it.
fn service_over(store: &Arc<InMemoryLedgerStore>, clock: &Arc<ManualClock>) -> SigilLedgerService {
    let mut deps = SigilLedgerDependencies::in_memory(clock.clone());
    deps.ledgers = store.clone();
    SigilLedgerService::new(deps, LedgerConfig::for_testing()).unwrap()
}

async fn issue(h: &Harness, base: i64) -> Hash {
    h.service
        .issue(core(7), units(base), &h.owner)
        .await
        .unwrap()
        .canonical_hash
}

#[tokio::test]
async fn test_issue_is_idempotent() {
    let h = harness();
    let first = h.service.issue(core(1), units(10), &h.owner).await.unwrap();
    let again = h.service.issue(core(1), units(10), &h.owner).await.unwrap();
    assert_eq!(first, again);

    let result = h.service.issue(core(1), units(11), &h.owner).await;
    assert!(matches!(result, Err(LedgerError::ArtifactExists(hash)) if hash == first.canonical_hash));
}

#[tokio::test]
async fn test_send_receive_scenario() {
    let h = harness();
    let artifact = issue(&h, 10).await;

    let first = h
        .service
        .exhale(artifact, &h.owner, SendRequest::new(units(3), "tab"))
        .await
        .unwrap();
    assert_eq!(h.service.balance(artifact).await.unwrap().remaining, units(7));

    h.service
        .inhale(&first, &h.receiver)
        .await
        .unwrap();

    let over = h
        .service
        .exhale(artifact, &h.owner, SendRequest::new(units(8), "tab"))
        .await;
    match over {
        Err(LedgerError::InvalidAmount {
            requested,
            remaining,
            ..
        }) => {
            assert_eq!(requested, units(8));
            assert_eq!(remaining, units(7));
        }
        other => panic!("expected InvalidAmount, got {other:?}"),
    }

    h.service
        .exhale(artifact, &h.owner, SendRequest::new(units(7), "tab"))
        .await
        .unwrap();
    assert_eq!(h.service.balance(artifact).await.unwrap().remaining, Amount::ZERO);
}

#[tokio::test]
async fn test_lock_released_on_error_path() {
    let h = harness();
    let artifact = issue(&h, 1).await;

    let result = h
        .service
        .exhale(artifact, &h.owner, SendRequest::new(units(5), "tab"))
        .await;
    assert!(result.is_err());
    assert!(h.locks.is_empty());
}

#[tokio::test]
async fn test_second_open_rejected() {
    let h = harness();
    let artifact = issue(&h, 10).await;
    h.service
        .exhale(artifact, &h.owner, SendRequest::new(units(1), "tab"))
        .await
        .unwrap();

    let result = h
        .service
        .exhale(artifact, &h.owner, SendRequest::new(units(1), "other-tab"))
        .await;
    assert!(matches!(result, Err(LedgerError::TransferInFlight { index: 0, .. })));
}

#[tokio::test]
async fn test_held_lock_blocks_send() {
    let h = harness();
    let artifact = issue(&h, 10).await;
    let key = LockKey::new(artifact, "tab");
    h.locks
        .compare_and_swap(&key, None, LockRecord::new(h.clock.now_pulse()))
        .unwrap();

    let result = h
        .service
        .exhale(artifact, &h.owner, SendRequest::new(units(1), "tab"))
        .await;
    assert!(matches!(result, Err(LedgerError::LockHeld { .. })));

    // Past the TTL the abandoned lock is displaced.
    h.clock.advance(h.service.config().lock_ttl_pulses + 1);
    assert!(h
        .service
        .exhale(artifact, &h.owner, SendRequest::new(units(1), "tab"))
        .await
        .is_ok());
}

#[tokio::test]
async fn test_non_owner_cannot_send() {
    let h = harness();
    let artifact = issue(&h, 10).await;
    let result = h
        .service
        .exhale(artifact, &h.receiver, SendRequest::new(units(1), "tab"))
        .await;
    assert!(matches!(result, Err(LedgerError::SignatureMismatch(_))));
}

#[tokio::test]
async fn test_replay_with_same_nonce() {
    let h = harness();
    let artifact = issue(&h, 10).await;
    let request = SendRequest::new(units(2), "tab").with_nonce(Nonce::new("retry-1"));

    let first = h.service.exhale(artifact, &h.owner, request.clone()).await.unwrap();
    let replay = h.service.exhale(artifact, &h.owner, request).await.unwrap();
    assert_eq!(first, replay);
    assert_eq!(h.service.ledger(artifact).await.unwrap().window.len(), 1);

    let conflicting = SendRequest::new(units(3), "tab").with_nonce(Nonce::new("retry-1"));
    let result = h.service.exhale(artifact, &h.owner, conflicting).await;
    assert!(matches!(result, Err(LedgerError::NonceReused { .. })));
}

#[tokio::test]
async fn test_inhale_twice_reports_already_closed() {
    let h = harness();
    let artifact = issue(&h, 10).await;
    let share = h
        .service
        .exhale(artifact, &h.owner, SendRequest::new(units(1), "tab"))
        .await
        .unwrap();
    h.service.inhale(&share, &h.receiver).await.unwrap();

    let again = h.service.inhale(&share, &h.receiver).await;
    assert!(matches!(again, Err(LedgerError::AlreadyClosed { index: 0, .. })));
}

#[tokio::test]
async fn test_tampered_share_link_rejected() {
    let h = harness();
    let artifact = issue(&h, 10).await;
    let mut share = h
        .service
        .exhale(artifact, &h.owner, SendRequest::new(units(1), "tab"))
        .await
        .unwrap();
    share.sender.amount = units(9);

    let result = h.service.inhale(&share, &h.receiver).await;
    assert!(matches!(result, Err(LedgerError::SignatureMismatch(_))));
}

#[tokio::test]
async fn test_expired_claim() {
    let h = harness();
    let artifact = issue(&h, 10).await;
    let share = h
        .service
        .exhale(artifact, &h.owner, SendRequest::new(units(4), "tab"))
        .await
        .unwrap();

    h.clock.set(share.claim.expire_pulse + 1);
    assert_eq!(h.service.balance(artifact).await.unwrap().remaining, units(10));

    let result = h.service.inhale(&share, &h.receiver).await;
    match result {
        Err(LedgerError::Expired { expire_pulse, now }) => {
            assert_eq!(expire_pulse, share.claim.expire_pulse);
            assert_eq!(now, share.claim.expire_pulse + 1);
        }
        other => panic!("expected Expired, got {other:?}"),
    }

    let ledger = h.service.ledger(artifact).await.unwrap();
    assert!(matches!(ledger.window.last(), Some(TransferRecord::Lapsed(_))));
    assert_eq!(
        ledger.derivation(&share.child).unwrap().status,
        DerivationStatus::Expired
    );

    // The lapsed head no longer blocks a send.
    assert!(h
        .service
        .exhale(artifact, &h.owner, SendRequest::new(units(10), "tab"))
        .await
        .is_ok());
}

#[tokio::test]
async fn test_child_branch_accounting() {
    let h = harness();
    let artifact = issue(&h, 10).await;
    let share = h
        .service
        .exhale(artifact, &h.owner, SendRequest::new(units(4), "tab"))
        .await
        .unwrap();
    let receipt = h.service.inhale(&share, &h.receiver).await.unwrap();
    assert_eq!(receipt.child, share.child);

    let child = h.service.ledger(share.child).await.unwrap();
    assert_eq!(child.branch.parent, Some(artifact));
    assert_eq!(child.branch.base, units(4));
    assert_eq!(child.branch.owner, h.receiver.public_key());

    // The receiver now spends from the child branch, independently.
    let third = LocalKeySigner::from_seed([3u8; 32]);
    let nested = h
        .service
        .exhale(share.child, &h.receiver, SendRequest::new(units(3), "child-tab"))
        .await
        .unwrap();
    h.service.inhale(&nested, &third).await.unwrap();
    assert_eq!(h.service.balance(share.child).await.unwrap().remaining, units(1));
    assert_eq!(h.service.balance(artifact).await.unwrap().remaining, units(6));
}

async fn send_and_claim(h: &Harness, artifact: Hash, request: SendRequest) -> crate::domain::ShareLink {
    let share = h.service.exhale(artifact, &h.owner, request).await.unwrap();
    h.service.inhale(&share, &h.receiver).await.unwrap();
    share
}

#[tokio::test]
async fn test_hardening_is_sticky() {
    let h = harness();
    let artifact = issue(&h, 10).await;

    send_and_claim(&h, artifact, SendRequest::new(units(1), "tab")).await;
    let hardened = send_and_claim(&h, artifact, SendRequest::new(units(1), "tab").hardened()).await;
    assert!(hardened.hardened);

    let ledger = h.service.ledger(artifact).await.unwrap();
    assert!(ledger.window.is_hardened());
    let link = ledger.window.link(1).unwrap();
    assert!(matches!(link, HardenedLink::Basic(_)));
    assert!(link.is_closed());

    let result = h
        .service
        .exhale(artifact, &h.owner, SendRequest::new(units(1), "tab"))
        .await;
    assert!(matches!(result, Err(LedgerError::HardeningGap { index: 2, .. })));
}

#[tokio::test]
async fn test_hardened_link_with_zk_refs() {
    let h = harness_with(LedgerConfig::for_testing(), |deps| {
        deps.zk = Some(Arc::new(DigestCommitmentOracle::new()));
    });
    let artifact = issue(&h, 10).await;
    send_and_claim(&h, artifact, SendRequest::new(units(2), "tab").hardened()).await;

    let ledger = h.service.ledger(artifact).await.unwrap();
    let link = ledger.window.link(0).unwrap();
    let zk = link.zk().expect("zk refs present");
    assert!(zk.receive.is_some());
    assert_eq!(link.previous_head_root(), &Hash::ZERO);
    assert!(link.verify().is_ok());
}

#[tokio::test]
async fn test_zk_outage_does_not_block_hardening() {
    let oracle = Arc::new(DigestCommitmentOracle::new());
    oracle.set_offline(true);
    let shared = oracle.clone();
    let h = harness_with(LedgerConfig::for_testing(), move |deps| {
        deps.zk = Some(shared);
    });
    let artifact = issue(&h, 10).await;
    send_and_claim(&h, artifact, SendRequest::new(units(2), "tab").hardened()).await;

    let ledger = h.service.ledger(artifact).await.unwrap();
    assert!(matches!(ledger.window.link(0), Some(HardenedLink::Basic(_))));
}

#[tokio::test]
async fn test_rollup_and_history_proofs() {
    let h = harness();
    let artifact = issue(&h, 100).await;
    let segment_size = h.service.config().segment_size;

    let mut receipts = Vec::new();
    for _ in 0..segment_size {
        let share = h
            .service
            .exhale(artifact, &h.owner, SendRequest::new(units(1), "tab"))
            .await
            .unwrap();
        receipts.push(h.service.inhale(&share, &h.receiver).await.unwrap());
    }
    assert!(receipts[..segment_size - 1].iter().all(|r| r.sealed.is_none()));
    let segment = receipts.last().and_then(|r| r.sealed.clone()).unwrap();
    assert_eq!(segment.count, segment_size);

    let head = h.service.head(artifact).await.unwrap();
    assert_eq!(head.segment_count, 1);
    assert_eq!(head.window_len, 0);

    // One more transfer lands in the fresh window, chained from the segment.
    send_and_claim(&h, artifact, SendRequest::new(units(1), "tab")).await;
    let head_after = h.service.head(artifact).await.unwrap();
    assert_eq!(head_after.segments_root, head.segments_root);

    for sequence in 0..=segment_size as u64 {
        let proof = h.service.prove_transfer(artifact, sequence).await.unwrap();
        assert!(h.service.verify_history(artifact, &proof).await.unwrap());
    }
    assert!(matches!(
        h.service.prove_transfer(artifact, segment_size as u64 + 1).await,
        Err(LedgerError::ProofIndexOutOfRange { .. })
    ));
    assert_eq!(h.service.balance(artifact).await.unwrap().spent, units(segment_size as i64 + 1));
}

#[tokio::test]
async fn test_publication_fallback() {
    let failing = Arc::new(FailingPublisher::new());
    let publisher = failing.clone();
    let h = harness_with(LedgerConfig::for_testing(), move |deps| {
        deps.publisher = publisher;
    });
    let artifact = issue(&h, 10).await;
    let share = h
        .service
        .exhale(artifact, &h.owner, SendRequest::new(units(1), "tab"))
        .await
        .unwrap();

    let receipt = h.service.inhale(&share, &h.receiver).await.unwrap();
    let content_id = receipt.content_id.unwrap();
    assert!(content_id.is_local_fallback());
    assert_eq!(failing.attempts(), 1);

    // The close is recorded regardless.
    let ledger = h.service.ledger(artifact).await.unwrap();
    assert!(ledger.window.get(0).unwrap().is_closed());
}

#[tokio::test]
async fn test_publication_disabled() {
    let config = LedgerConfig {
        publish_windows: false,
        ..LedgerConfig::for_testing()
    };
    let h = harness_with(config, |_| {});
    let artifact = issue(&h, 10).await;
    let share = send_and_claim(&h, artifact, SendRequest::new(units(1), "tab")).await;
    assert!(h.service.ledger(share.child).await.is_ok());
}

#[tokio::test]
async fn test_check_head() {
    let h = harness();
    let artifact = issue(&h, 10).await;
    let mut conflicts = h.bus.subscribe(EventFilter::topics(vec![EventTopic::Conflict]));

    let before = h.service.head(artifact).await.unwrap();
    send_and_claim(&h, artifact, SendRequest::new(units(1), "tab")).await;
    let now = h.service.head(artifact).await.unwrap();

    assert_eq!(h.service.check_head(artifact, &now).await.unwrap(), HeadStatus::InSync);
    assert_eq!(h.service.check_head(artifact, &before).await.unwrap(), HeadStatus::PeerBehind);

    let ahead = HeadCommitment {
        window_len: now.window_len + 1,
        ..now
    };
    assert_eq!(h.service.check_head(artifact, &ahead).await.unwrap(), HeadStatus::PeerAhead);

    let forked = HeadCommitment {
        window_root: Hash([9u8; 32]),
        ..now
    };
    assert_eq!(h.service.check_head(artifact, &forked).await.unwrap(), HeadStatus::Diverged);
    match conflicts.try_recv().unwrap() {
        Some(LedgerEvent::HeadConflict { remote_root, .. }) => assert_eq!(remote_root, Hash([9u8; 32])),
        other => panic!("expected HeadConflict, got {other:?}"),
    }
}

#[tokio::test]
async fn test_unknown_artifact() {
    let h = harness();
    let result = h.service.balance(Hash([5u8; 32])).await;
    assert!(matches!(result, Err(LedgerError::ArtifactNotFound(_))));
}

#[test]
fn test_invalid_config_rejected() {
    let clock = Arc::new(ManualClock::new(0));
    let config = LedgerConfig {
        claim_steps: 0,
        ..LedgerConfig::for_testing()
    };
    assert!(SigilLedgerService::new(SigilLedgerDependencies::in_memory(clock), config).is_err());
}

#[tokio::test]
async fn test_concurrent_writers_cannot_both_commit() {
    let clock = Arc::new(ManualClock::new(1_000));
    let store = Arc::new(InMemoryLedgerStore::new());
    let first = service_over(&store, &clock);
    let second = service_over(&store, &clock);
    let owner = SlowSigner::from_seed([1u8; 32]);
    let artifact = first
        .issue(core(7), units(10), &owner)
        .await
        .unwrap()
        .canonical_hash;

    // Different tokens, so the send lock does not serialize them.
    let (a, b) = tokio::join!(
        first.exhale(artifact, &owner, SendRequest::new(units(6), "tab-a")),
        second.exhale(artifact, &owner, SendRequest::new(units(6), "tab-b")),
    );
    let (won, lost) = match (a, b) {
        (Ok(share), Err(e)) | (Err(e), Ok(share)) => (share, e),
        other => panic!("expected exactly one send to commit, got {other:?}"),
    };
    assert!(matches!(lost, LedgerError::HeadMoved { .. }));

    let ledger = first.ledger(artifact).await.unwrap();
    assert_eq!(ledger.window.len(), 1);
    assert_eq!(ledger.balance().unwrap().pending, units(6));

    second
        .inhale(&won, &LocalKeySigner::from_seed([2u8; 32]))
        .await
        .unwrap();
    assert_eq!(first.balance(artifact).await.unwrap().remaining, units(4));
}

#[tokio::test]
async fn test_overspend_reported_while_send_open() {
    let h = harness();
    let artifact = issue(&h, 10).await;
    h.service
        .exhale(artifact, &h.owner, SendRequest::new(units(3), "tab"))
        .await
        .unwrap();

    let result = h
        .service
        .exhale(artifact, &h.owner, SendRequest::new(units(8), "tab"))
        .await;
    match result {
        Err(LedgerError::InvalidAmount {
            requested,
            remaining,
            ..
        }) => {
            assert_eq!(requested, units(8));
            assert_eq!(remaining, units(7));
        }
        other => panic!("expected InvalidAmount, got {other:?}"),
    }
}

#[tokio::test]
async fn test_replay_after_restart_returns_original_link() {
    let clock = Arc::new(ManualClock::new(1_000));
    let store = Arc::new(InMemoryLedgerStore::new());
    let owner = LocalKeySigner::from_seed([1u8; 32]);
    let request = SendRequest::new(units(2), "tab").with_nonce(Nonce::new("n1"));

    let before = service_over(&store, &clock);
    let artifact = before
        .issue(core(7), units(10), &owner)
        .await
        .unwrap()
        .canonical_hash;
    let original = before.exhale(artifact, &owner, request.clone()).await.unwrap();
    drop(before);

    clock.advance(3);
    let after = service_over(&store, &clock);
    let replay = after.exhale(artifact, &owner, request.clone()).await.unwrap();
    assert_eq!(replay, original);
    assert_eq!(after.ledger(artifact).await.unwrap().window.len(), 1);

    // Still a no-op once the transfer is closed.
    after
        .inhale(&original, &LocalKeySigner::from_seed([2u8; 32]))
        .await
        .unwrap();
    let restarted = service_over(&store, &clock);
    let replay = restarted.exhale(artifact, &owner, request).await.unwrap();
    assert_eq!(replay, original);

    let conflicting = SendRequest::new(units(5), "tab").with_nonce(Nonce::new("n1"));
    let result = restarted.exhale(artifact, &owner, conflicting).await;
    assert!(matches!(result, Err(LedgerError::NonceReused { .. })));
}

#[tokio::test]
async fn test_non_owner_replay_rejected() {
    let h = harness();
    let artifact = issue(&h, 10).await;
    let request = SendRequest::new(units(2), "tab").with_nonce(Nonce::new("retry-1"));
    h.service
        .exhale(artifact, &h.owner, request.clone())
        .await
        .unwrap();

    let result = h.service.exhale(artifact, &h.receiver, request).await;
    assert!(matches!(result, Err(LedgerError::SignatureMismatch(_))));
}

#[tokio::test]
async fn test_settled_record_rejected_before_signing() {
    let h = harness();
    let artifact = issue(&h, 10).await;
    let closed = h
        .service
        .exhale(artifact, &h.owner, SendRequest::new(units(1), "tab"))
        .await
        .unwrap();
    h.service.inhale(&closed, &h.receiver).await.unwrap();

    let receiver = SlowSigner::from_seed([2u8; 32]);
    let again = h.service.inhale(&closed, &receiver).await;
    assert!(matches!(again, Err(LedgerError::AlreadyClosed { index: 0, .. })));
    assert_eq!(receiver.calls(), 0);

    let lapsing = h
        .service
        .exhale(artifact, &h.owner, SendRequest::new(units(1), "tab"))
        .await
        .unwrap();
    h.clock.set(lapsing.claim.expire_pulse + 1);
    let late = h.service.inhale(&lapsing, &receiver).await;
    assert!(matches!(late, Err(LedgerError::Expired { .. })));
    assert_eq!(receiver.calls(), 0);
}

#[tokio::test]
async fn test_head_mutexes_released_after_use() {
    let h = harness();
    let artifact = issue(&h, 10).await;
    let share = h
        .service
        .exhale(artifact, &h.owner, SendRequest::new(units(2), "tab"))
        .await
        .unwrap();
    h.service.inhale(&share, &h.receiver).await.unwrap();
    assert!(h
        .service
        .exhale(artifact, &h.receiver, SendRequest::new(units(1), "tab"))
        .await
        .is_err());

    assert!(h.service.heads.lock().is_empty());
}
