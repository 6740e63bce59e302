//! # End-to-End Choreography Tests
//!
//! Checks the order of events the service publishes for each transition:
//!
//! ```text
//! exhale:  LockAcquired → [TransferLapsed] → TransferOpened → LockReleased
//! inhale:  LockAcquired → TransferClosed → [SegmentSealed]
//!          → ArtifactIssued(child) → WindowPublished → LockReleased
//! ```
//!
//! A rejected transition still releases its lock, and a failed publication
//! still announces the locally derived content id.

#[cfg(test)]
mod tests {
    use super::super::fixtures::{drain, units, Node};
    use sigil_bus::{EventFilter, EventTopic, LedgerEvent};
    use sigil_ledger::adapters::FailingPublisher;
    use sigil_ledger::{LedgerConfig, SendRequest, SigilLedgerApi};
    use std::sync::Arc;

    fn config() -> LedgerConfig {
        LedgerConfig {
            segment_size: 2,
            ..LedgerConfig::for_testing()
        }
    }

    fn names(events: &[LedgerEvent]) -> Vec<&'static str> {
        events
            .iter()
            .map(|e| match e {
                LedgerEvent::ArtifactIssued { .. } => "ArtifactIssued",
                LedgerEvent::TransferOpened { .. } => "TransferOpened",
                LedgerEvent::TransferClosed { .. } => "TransferClosed",
                LedgerEvent::TransferLapsed { .. } => "TransferLapsed",
                LedgerEvent::SegmentSealed { .. } => "SegmentSealed",
                LedgerEvent::LockAcquired { .. } => "LockAcquired",
                LedgerEvent::LockReleased { .. } => "LockReleased",
                LedgerEvent::HeadConflict { .. } => "HeadConflict",
                LedgerEvent::WindowPublished { .. } => "WindowPublished",
            })
            .collect()
    }

    #[tokio::test]
    async fn test_exhale_inhale_event_order() {
        let node = Node::new(config());
        let mut events = node.subscribe();

        let artifact = node.issue(10).await;
        assert_eq!(names(&drain(&mut events)), vec!["ArtifactIssued"]);

        let share = node.send(artifact, 2).await;
        assert_eq!(
            names(&drain(&mut events)),
            vec!["LockAcquired", "TransferOpened", "LockReleased"]
        );

        node.service.inhale(&share, &node.receiver).await.unwrap();
        let closed = drain(&mut events);
        assert_eq!(
            names(&closed),
            vec![
                "LockAcquired",
                "TransferClosed",
                "ArtifactIssued",
                "WindowPublished",
                "LockReleased"
            ]
        );
        assert!(matches!(
            &closed[2],
            LedgerEvent::ArtifactIssued { artifact: child, parent: Some(parent), base }
                if *child == share.child && *parent == artifact && *base == units(2)
        ));
    }

    #[tokio::test]
    async fn test_seal_is_announced_after_the_close() {
        let node = Node::new(config());
        let artifact = node.issue(10).await;
        node.send_and_claim(artifact, 1).await;

        let mut events = node.subscribe();
        node.send_and_claim(artifact, 1).await;
        let order = names(&drain(&mut events));
        let closed = order.iter().position(|n| *n == "TransferClosed").unwrap();
        let sealed = order.iter().position(|n| *n == "SegmentSealed").unwrap();
        assert_eq!(sealed, closed + 1);

        let head = node.service.head(artifact).await.unwrap();
        assert_eq!(head.segment_count, 1);
    }

    #[tokio::test]
    async fn test_lapse_is_announced_before_the_next_open() {
        let node = Node::new(config());
        let artifact = node.issue(10).await;
        let share = node.send(artifact, 4).await;
        node.clock.set(share.claim.expire_pulse + 1);

        let mut events = node.subscribe();
        node.send(artifact, 4).await;
        assert_eq!(
            names(&drain(&mut events)),
            vec![
                "LockAcquired",
                "TransferLapsed",
                "TransferOpened",
                "LockReleased"
            ]
        );
    }

    #[tokio::test]
    async fn test_rejected_send_still_releases_lock() {
        let node = Node::new(config());
        let artifact = node.issue(1).await;
        let mut events = node.subscribe();

        let result = node
            .service
            .exhale(artifact, &node.owner, SendRequest::new(units(5), "tab-1"))
            .await;
        assert!(result.is_err());
        assert_eq!(
            names(&drain(&mut events)),
            vec!["LockAcquired", "LockReleased"]
        );
    }

    #[tokio::test]
    async fn test_failed_publication_announces_local_id() {
        let failing = Arc::new(FailingPublisher::new());
        let publisher = failing.clone();
        let node = Node::with(config(), move |deps| deps.publisher = publisher);
        let artifact = node.issue(10).await;
        let mut publications = node
            .bus
            .subscribe(EventFilter::topics(vec![EventTopic::Publication]));

        let receipt = node.send_and_claim(artifact, 1).await;
        let content_id = receipt.content_id.unwrap();
        assert_eq!(failing.attempts(), 1);

        match publications.try_recv().unwrap() {
            Some(LedgerEvent::WindowPublished {
                artifact: published,
                content_id: announced,
            }) => {
                assert_eq!(published, artifact);
                assert_eq!(announced, content_id);
            }
            other => panic!("expected WindowPublished, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_artifact_filter_isolates_branches() {
        let node = Node::new(config());
        let artifact = node.issue(10).await;
        let receipt = node.send_and_claim(artifact, 5).await;

        let mut child_events = node
            .bus
            .subscribe(EventFilter::for_artifacts(vec![receipt.child]));
        node.send_and_claim(artifact, 1).await;
        assert!(drain(&mut child_events).is_empty());

        let share = node
            .service
            .exhale(
                receipt.child,
                &node.receiver,
                SendRequest::new(units(2), "child-tab"),
            )
            .await
            .unwrap();
        let events = drain(&mut child_events);
        assert!(events.iter().all(|e| e.artifact() == receipt.child));
        assert!(events.iter().any(|e| matches!(
            e,
            LedgerEvent::TransferOpened { child, .. } if *child == share.child
        )));
    }
}
