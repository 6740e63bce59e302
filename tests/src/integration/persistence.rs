//! # Persistence Tests
//!
//! File-backed ledgers, send locks and publication shared by services that
//! come and go over the same data directory, as separate CLI processes do.

#[cfg(test)]
mod tests {
    use super::super::fixtures::{core, units};
    use sigil_bus::NoopPublisher;
    use sigil_ledger::adapters::{
        DirectoryPublisher, FileBackedLedgerStore, FileLockStore, LocalKeySigner, ManualClock,
    };
    use sigil_ledger::application::SigilLedgerDependencies;
    use sigil_ledger::{
        LedgerConfig, LedgerError, LedgerStore, LockKey, Nonce, SendRequest, SigilLedgerApi,
        SigilLedgerService, StoreError, TransferWindow,
    };
    use std::path::Path;
    use std::sync::Arc;

    fn open(dir: &Path, clock: Arc<ManualClock>) -> SigilLedgerService {
        let deps = SigilLedgerDependencies {
            clock,
            locks: Arc::new(FileLockStore::open(dir.join("locks")).unwrap()),
            ledgers: Arc::new(FileBackedLedgerStore::open(dir.join("ledgers")).unwrap()),
            publisher: Arc::new(DirectoryPublisher::open(dir.join("published")).unwrap()),
            events: Arc::new(NoopPublisher),
            zk: None,
        };
        SigilLedgerService::new(deps, LedgerConfig::for_testing()).unwrap()
    }

    #[tokio::test]
    async fn test_transfer_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let clock = Arc::new(ManualClock::new(500));
        let owner = LocalKeySigner::from_seed([7u8; 32]);
        let receiver = LocalKeySigner::from_seed([8u8; 32]);

        let share = {
            let service = open(dir.path(), clock.clone());
            let identity = service.issue(core(), units(10), &owner).await.unwrap();
            service
                .exhale(
                    identity.canonical_hash,
                    &owner,
                    SendRequest::new(units(4), "tab-1"),
                )
                .await
                .unwrap()
        };

        let service = open(dir.path(), clock.clone());
        let balance = service.balance(share.parent).await.unwrap();
        assert_eq!(balance.pending, units(4));

        let receipt = service.inhale(&share, &receiver).await.unwrap();
        let balance = service.balance(share.parent).await.unwrap();
        assert_eq!(balance.spent, units(4));
        assert_eq!(balance.remaining, units(6));

        let content_id = receipt.content_id.unwrap();
        let publisher = DirectoryPublisher::open(dir.path().join("published")).unwrap();
        let snapshot = publisher.get(&content_id).unwrap();
        let window: TransferWindow = serde_json::from_slice(&snapshot).unwrap();
        assert_eq!(window.root().unwrap(), receipt.window_root);

        let restarted = open(dir.path(), clock);
        let child = restarted.ledger(share.child).await.unwrap();
        assert_eq!(child.branch.base, units(4));
        assert_eq!(child.branch.owner, receipt.receiver.receiver_pubkey);
    }

    #[tokio::test]
    async fn test_lock_held_by_other_process_blocks_send() {
        let dir = tempfile::tempdir().unwrap();
        let clock = Arc::new(ManualClock::new(500));
        let owner = LocalKeySigner::from_seed([7u8; 32]);

        let first = open(dir.path(), clock.clone());
        let second = open(dir.path(), clock.clone());
        let artifact = first
            .issue(core(), units(10), &owner)
            .await
            .unwrap()
            .canonical_hash;

        let guard = first
            .send_lock()
            .guard(LockKey::new(artifact, "tab-1"))
            .unwrap();
        let blocked = second
            .exhale(artifact, &owner, SendRequest::new(units(1), "tab-1"))
            .await;
        assert!(matches!(blocked, Err(LedgerError::LockHeld { .. })));

        // A different link token is a different lock.
        second
            .exhale(artifact, &owner, SendRequest::new(units(1), "tab-2"))
            .await
            .unwrap();

        drop(guard);
        let balance = first.balance(artifact).await.unwrap();
        assert_eq!(balance.pending, units(1));
    }

    #[tokio::test]
    async fn test_abandoned_lock_file_expires() {
        let dir = tempfile::tempdir().unwrap();
        let clock = Arc::new(ManualClock::new(500));
        let owner = LocalKeySigner::from_seed([7u8; 32]);

        let crashed = open(dir.path(), clock.clone());
        let artifact = crashed
            .issue(core(), units(10), &owner)
            .await
            .unwrap()
            .canonical_hash;
        let handle = crashed
            .send_lock()
            .acquire(LockKey::new(artifact, "tab-1"))
            .unwrap();
        drop(crashed);

        let survivor = open(dir.path(), clock.clone());
        clock.advance(survivor.config().lock_ttl_pulses + 1);
        survivor
            .exhale(artifact, &owner, SendRequest::new(units(1), "tab-1"))
            .await
            .unwrap();

        // The displaced holder can no longer release what it lost.
        assert!(!survivor.send_lock().release(&handle).unwrap());
    }

    #[tokio::test]
    async fn test_retried_send_in_new_process_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let clock = Arc::new(ManualClock::new(500));
        let owner = LocalKeySigner::from_seed([7u8; 32]);
        let request = SendRequest::new(units(3), "tab-1").with_nonce(Nonce::new("cli-retry"));

        let (artifact, original) = {
            let service = open(dir.path(), clock.clone());
            let artifact = service
                .issue(core(), units(10), &owner)
                .await
                .unwrap()
                .canonical_hash;
            let share = service.exhale(artifact, &owner, request.clone()).await.unwrap();
            (artifact, share)
        };

        clock.advance(1);
        let retry = open(dir.path(), clock.clone());
        let share = retry.exhale(artifact, &owner, request).await.unwrap();
        assert_eq!(share, original);

        let ledger = retry.ledger(artifact).await.unwrap();
        assert_eq!(ledger.window.len(), 1);
        assert_eq!(ledger.balance().unwrap().pending, units(3));
    }

    #[tokio::test]
    async fn test_stale_process_cannot_overwrite_ledger() {
        let dir = tempfile::tempdir().unwrap();
        let clock = Arc::new(ManualClock::new(500));
        let owner = LocalKeySigner::from_seed([7u8; 32]);

        let first = open(dir.path(), clock.clone());
        let artifact = first
            .issue(core(), units(10), &owner)
            .await
            .unwrap()
            .canonical_hash;

        // Another process commits a send after this one loaded the ledger.
        let ledgers = FileBackedLedgerStore::open(dir.path().join("ledgers")).unwrap();
        let loaded = ledgers.load(&artifact).unwrap().unwrap();
        first
            .exhale(artifact, &owner, SendRequest::new(units(6), "tab-a"))
            .await
            .unwrap();

        let result = ledgers.save_if(&loaded, Some(&loaded.head().unwrap()));
        assert!(matches!(result, Err(StoreError::HeadMoved { .. })));
        assert_eq!(first.ledger(artifact).await.unwrap().window.len(), 1);
    }

    #[tokio::test]
    async fn test_corrupt_ledger_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let clock = Arc::new(ManualClock::new(500));
        let owner = LocalKeySigner::from_seed([7u8; 32]);

        let service = open(dir.path(), clock);
        let artifact = service
            .issue(core(), units(10), &owner)
            .await
            .unwrap()
            .canonical_hash;

        let path = dir
            .path()
            .join("ledgers")
            .join(format!("{}.json", artifact.to_hex()));
        std::fs::write(&path, b"{ not json").unwrap();

        let result = service.balance(artifact).await;
        assert!(matches!(
            result,
            Err(LedgerError::Storage(StoreError::Corrupt { .. }))
        ));
    }
}
