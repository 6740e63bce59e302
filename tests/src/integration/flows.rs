//! # Transfer Flow Tests
//!
//! Drive the ledger service through its public API the way a wallet host
//! would and check balances, heads and proofs after each step.
//!
//! ## Flows Tested
//!
//! 1. **Send and receive**: reservation, close, exhaustion of a branch
//! 2. **Derivation**: identical inputs mint identical derivatives
//! 3. **Rollup**: the segments root moves once per `segment_size` closes
//! 4. **Recovery**: stale send locks and lapsed claims free the branch
//! 5. **Hardening**: once hardened, plain sends are refused

#[cfg(test)]
mod tests {
    use super::super::fixtures::{units, Node, START_PULSE};
    use sigil_ledger::{
        AmountRejection, LedgerConfig, LedgerError, LockKey, LockRecord, LockStore, Nonce,
        SendRequest, SigilLedgerApi, TransferRecord,
    };

    fn config() -> LedgerConfig {
        LedgerConfig {
            segment_size: 3,
            claim_steps: 2,
            pulses_per_step: 5,
            lock_ttl_pulses: 10,
            dedup_retention_pulses: 100,
            publish_windows: true,
        }
    }

    // =========================================================================
    // SEND AND RECEIVE
    // =========================================================================

    #[tokio::test]
    async fn test_branch_is_spent_down_to_zero() {
        let node = Node::new(config());
        let artifact = node.issue(10).await;

        let share = node.send(artifact, 3).await;
        let balance = node.service.balance(artifact).await.unwrap();
        assert_eq!(balance.pending, units(3));
        assert_eq!(balance.remaining, units(7));

        // One open transfer per branch at a time.
        let blocked = node
            .service
            .exhale(artifact, &node.owner, SendRequest::new(units(1), "tab-1"))
            .await;
        assert!(matches!(blocked, Err(LedgerError::TransferInFlight { index: 0, .. })));

        node.service.inhale(&share, &node.receiver).await.unwrap();
        let balance = node.service.balance(artifact).await.unwrap();
        assert_eq!(balance.spent, units(3));
        assert_eq!(balance.pending, units(0));

        let too_much = node
            .service
            .exhale(artifact, &node.owner, SendRequest::new(units(8), "tab-1"))
            .await;
        assert!(matches!(
            too_much,
            Err(LedgerError::InvalidAmount {
                reason: AmountRejection::ExceedsRemaining,
                ..
            })
        ));

        node.send_and_claim(artifact, 7).await;
        let balance = node.service.balance(artifact).await.unwrap();
        assert_eq!(balance.remaining, units(0));

        let empty = node
            .service
            .exhale(artifact, &node.owner, SendRequest::new(units(1), "tab-1"))
            .await;
        assert!(matches!(empty, Err(LedgerError::InvalidAmount { .. })));
    }

    #[tokio::test]
    async fn test_oversized_send_refused_while_first_is_open() {
        let node = Node::new(config());
        let artifact = node.issue(10).await;

        let first = node.send(artifact, 3).await;
        let over = node
            .service
            .exhale(artifact, &node.owner, SendRequest::new(units(8), "tab-1"))
            .await;
        match over {
            Err(LedgerError::InvalidAmount {
                requested,
                remaining,
                reason,
            }) => {
                assert_eq!(requested, units(8));
                assert_eq!(remaining, units(7));
                assert_eq!(reason, AmountRejection::ExceedsRemaining);
            }
            other => panic!("expected InvalidAmount, got {other:?}"),
        }

        node.service.inhale(&first, &node.receiver).await.unwrap();
        node.send(artifact, 7).await;
        let balance = node.service.balance(artifact).await.unwrap();
        assert_eq!(balance.remaining, units(0));
        assert_eq!(balance.pending, units(7));
        assert_eq!(balance.spent, units(3));
    }

    #[tokio::test]
    async fn test_claimed_derivative_is_owned_by_receiver() {
        let node = Node::new(config());
        let artifact = node.issue(10).await;
        let receipt = node.send_and_claim(artifact, 4).await;

        let child = node.service.ledger(receipt.child).await.unwrap();
        assert_eq!(child.branch.parent, Some(artifact));
        assert_eq!(child.branch.base, units(4));
        assert_eq!(child.branch.owner, receipt.receiver.receiver_pubkey);

        // The original owner has no authority over the derivative.
        let result = node
            .service
            .exhale(receipt.child, &node.owner, SendRequest::new(units(1), "tab-1"))
            .await;
        assert!(matches!(result, Err(LedgerError::SignatureMismatch(_))));
    }

    // =========================================================================
    // DERIVATION
    // =========================================================================

    #[tokio::test]
    async fn test_identical_sends_mint_identical_children() {
        let left = Node::new(config());
        let right = Node::new(config());
        let artifact = left.issue(10).await;
        assert_eq!(right.issue(10).await, artifact);

        let request = SendRequest::new(units(2), "tab-1").with_nonce(Nonce::new("n-1"));
        let a = left
            .service
            .exhale(artifact, &left.owner, request.clone())
            .await
            .unwrap();
        let b = right
            .service
            .exhale(artifact, &right.owner, request)
            .await
            .unwrap();

        assert_eq!(a.child, b.child);
        assert_eq!(a.send_id, b.send_id);
        assert_eq!(a.recompute_child().unwrap(), a.child);

        let ra = left.service.inhale(&a, &left.receiver).await.unwrap();
        let rb = right.service.inhale(&b, &right.receiver).await.unwrap();
        assert_eq!(ra.window_root, rb.window_root);

        let ca = left.service.ledger(a.child).await.unwrap();
        let cb = right.service.ledger(b.child).await.unwrap();
        assert_eq!(ca.identity, cb.identity);
    }

    #[tokio::test]
    async fn test_different_nonce_mints_different_child() {
        let node = Node::new(config());
        let artifact = node.issue(10).await;

        let first = node.send_and_claim(artifact, 1).await;
        let second = node.send_and_claim(artifact, 1).await;
        assert_ne!(first.child, second.child);
    }

    // =========================================================================
    // ROLLUP
    // =========================================================================

    #[tokio::test]
    async fn test_segments_root_moves_once_per_segment() {
        let node = Node::new(config());
        let artifact = node.issue(100).await;
        let mut previous = node.service.head(artifact).await.unwrap();

        for close in 1..=7u64 {
            let receipt = node.send_and_claim(artifact, 1).await;
            let head = node.service.head(artifact).await.unwrap();

            if close % 3 == 0 {
                assert!(receipt.sealed.is_some(), "close {close} seals");
                assert_ne!(head.segments_root, previous.segments_root);
                assert_eq!(head.window_len, 0);
            } else {
                assert!(receipt.sealed.is_none(), "close {close} does not seal");
                assert_eq!(head.segments_root, previous.segments_root);
            }
            assert_eq!(head.segment_count, close / 3);
            previous = head;
        }

        let ledger = node.service.ledger(artifact).await.unwrap();
        assert_eq!(ledger.segments.total_records(), 6);
        assert_eq!(ledger.window.len(), 1);
        assert_eq!(node.service.balance(artifact).await.unwrap().spent, units(7));

        for sequence in 0..7 {
            let proof = node.service.prove_transfer(artifact, sequence).await.unwrap();
            assert!(node.service.verify_history(artifact, &proof).await.unwrap());
        }
    }

    #[tokio::test]
    async fn test_live_proof_goes_stale_when_window_moves() {
        let node = Node::new(config());
        let artifact = node.issue(10).await;
        node.send_and_claim(artifact, 1).await;

        let proof = node.service.prove_transfer(artifact, 0).await.unwrap();
        assert!(node.service.verify_history(artifact, &proof).await.unwrap());

        node.send_and_claim(artifact, 1).await;
        assert!(!node.service.verify_history(artifact, &proof).await.unwrap());

        let fresh = node.service.prove_transfer(artifact, 0).await.unwrap();
        assert!(node.service.verify_history(artifact, &fresh).await.unwrap());
    }

    // =========================================================================
    // RECOVERY
    // =========================================================================

    #[tokio::test]
    async fn test_crashed_holder_lock_is_taken_over_after_ttl() {
        let node = Node::new(config());
        let artifact = node.issue(10).await;
        let key = LockKey::new(artifact, "tab-1");
        node.locks
            .compare_and_swap(&key, None, LockRecord::new(START_PULSE))
            .unwrap();

        let held = node
            .service
            .exhale(artifact, &node.owner, SendRequest::new(units(1), "tab-1"))
            .await;
        assert!(matches!(held, Err(LedgerError::LockHeld { .. })));

        // Exactly at the TTL boundary the holder still counts as alive.
        node.clock.advance(10);
        let boundary = node
            .service
            .exhale(artifact, &node.owner, SendRequest::new(units(1), "tab-1"))
            .await;
        assert!(matches!(boundary, Err(LedgerError::LockHeld { .. })));

        node.clock.advance(1);
        let share = node.send(artifact, 1).await;
        assert_eq!(share.parent, artifact);
        assert!(node.locks.get(&key).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_lapsed_claim_frees_the_branch() {
        let node = Node::new(config());
        let artifact = node.issue(10).await;
        let share = node.send(artifact, 6).await;

        node.clock.set(share.claim.expire_pulse + 1);
        assert_eq!(
            node.service.balance(artifact).await.unwrap().remaining,
            units(10)
        );

        let next = node.send(artifact, 9).await;
        let ledger = node.service.ledger(artifact).await.unwrap();
        assert!(matches!(ledger.window.get(0), Some(TransferRecord::Lapsed(_))));
        assert!(matches!(ledger.window.get(1), Some(TransferRecord::Open(_))));

        let late = node.service.inhale(&share, &node.receiver).await;
        assert!(matches!(late, Err(LedgerError::Expired { .. })));
        node.service.inhale(&next, &node.receiver).await.unwrap();
    }

    // =========================================================================
    // HARDENING
    // =========================================================================

    #[tokio::test]
    async fn test_hardened_window_refuses_plain_sends() {
        let node = Node::new(config());
        let artifact = node.issue(10).await;

        node.send_and_claim(artifact, 1).await;
        let hardened = node
            .service
            .exhale(
                artifact,
                &node.owner,
                SendRequest::new(units(1), "tab-1").hardened(),
            )
            .await
            .unwrap();
        assert!(hardened.hardened);
        node.service.inhale(&hardened, &node.receiver).await.unwrap();

        let plain = node
            .service
            .exhale(artifact, &node.owner, SendRequest::new(units(1), "tab-1"))
            .await;
        assert!(matches!(plain, Err(LedgerError::HardeningGap { index: 2, .. })));

        let ledger = node.service.ledger(artifact).await.unwrap();
        let link = ledger.window.link(1).unwrap();
        assert!(link.body().receive.is_some());
    }
}
