//! # Ledger Events
//!
//! Every notification the ledger service emits. Consumers (other tabs, a
//! publication worker, a UI) filter by [`EventTopic`] and/or artifact.

use serde::{Deserialize, Serialize};
use sigil_types::{Amount, ContentId, Hash, Pulse};

/// All events that can be published to the bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LedgerEvent {
    // =========================================================================
    // ARTIFACT
    // =========================================================================
    /// A new artifact (root or derivative) now has a ledger.
    ArtifactIssued {
        /// Canonical hash of the artifact.
        artifact: Hash,
        /// Parent artifact, for derivatives.
        parent: Option<Hash>,
        /// Base allocation of the branch.
        base: Amount,
    },

    // =========================================================================
    // TRANSFER STATE MACHINE
    // =========================================================================
    /// An exhale opened a transfer and minted a derivative identity.
    TransferOpened {
        /// Sending artifact.
        artifact: Hash,
        /// Position of the record in the live window.
        index: usize,
        /// Derivative identity handed to the recipient.
        child: Hash,
        /// Amount reserved by the transfer.
        amount: Amount,
        /// Whether the record carries a hardened link.
        hardened: bool,
    },

    /// An inhale closed the open transfer.
    TransferClosed {
        /// Sending artifact.
        artifact: Hash,
        /// Position of the record in the live window.
        index: usize,
        /// Derivative identity that was claimed.
        child: Hash,
        /// Window root after the close.
        window_root: Hash,
    },

    /// An open transfer's claim window ran out.
    TransferLapsed {
        /// Sending artifact.
        artifact: Hash,
        /// Position of the record in the live window.
        index: usize,
        /// Derivative that can no longer be claimed.
        child: Hash,
        /// Pulse at which the claim window closed.
        expire_pulse: Pulse,
    },

    // =========================================================================
    // SEGMENT ROLLUP
    // =========================================================================
    /// A full window was sealed into an immutable segment.
    SegmentSealed {
        /// Artifact whose window was sealed.
        artifact: Hash,
        /// Index of the new segment.
        segment_index: usize,
        /// Root of the sealed window.
        root: Hash,
        /// Number of records sealed.
        count: usize,
        /// Merkle root over all segment roots.
        segments_root: Hash,
    },

    // =========================================================================
    // CONCURRENCY LOCK
    // =========================================================================
    /// A send lock was taken.
    LockAcquired {
        /// Artifact the lock guards.
        artifact: Hash,
        /// Link token the lock is scoped to.
        token: String,
        /// Whether a stale holder was displaced.
        forced: bool,
    },

    /// A send lock was released by its holder.
    LockReleased {
        /// Artifact the lock guarded.
        artifact: Hash,
        /// Link token the lock was scoped to.
        token: String,
    },

    // =========================================================================
    // CONFLICT DETECTION
    // =========================================================================
    /// A peer reported a head that diverges from the local one.
    HeadConflict {
        /// Artifact in conflict.
        artifact: Hash,
        /// Local window root.
        local_root: Hash,
        /// Root the peer claimed.
        remote_root: Hash,
    },

    // =========================================================================
    // PUBLICATION
    // =========================================================================
    /// Window data was handed to the publication adapter.
    WindowPublished {
        /// Artifact whose window was published.
        artifact: Hash,
        /// Identifier of the published blob (may be a local fallback).
        content_id: ContentId,
    },
}

impl LedgerEvent {
    /// Get the topic for this event (for filtering).
    #[must_use]
    pub fn topic(&self) -> EventTopic {
        match self {
            Self::ArtifactIssued { .. } => EventTopic::Artifact,
            Self::TransferOpened { .. }
            | Self::TransferClosed { .. }
            | Self::TransferLapsed { .. } => EventTopic::Transfer,
            Self::SegmentSealed { .. } => EventTopic::Segment,
            Self::LockAcquired { .. } | Self::LockReleased { .. } => EventTopic::Lock,
            Self::HeadConflict { .. } => EventTopic::Conflict,
            Self::WindowPublished { .. } => EventTopic::Publication,
        }
    }

    /// Artifact the event concerns.
    #[must_use]
    pub fn artifact(&self) -> Hash {
        match self {
            Self::ArtifactIssued { artifact, .. }
            | Self::TransferOpened { artifact, .. }
            | Self::TransferClosed { artifact, .. }
            | Self::TransferLapsed { artifact, .. }
            | Self::SegmentSealed { artifact, .. }
            | Self::LockAcquired { artifact, .. }
            | Self::LockReleased { artifact, .. }
            | Self::HeadConflict { artifact, .. }
            | Self::WindowPublished { artifact, .. } => *artifact,
        }
    }
}

/// Event topics for subscription filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventTopic {
    /// Issuance events.
    Artifact,
    /// Exhale / inhale / lapse events.
    Transfer,
    /// Segment rollup events.
    Segment,
    /// Send-lock events.
    Lock,
    /// Divergent head reports.
    Conflict,
    /// Publication results.
    Publication,
    /// All events (no filtering).
    All,
}

/// Filter for subscribing to specific events.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// Topics to include. Empty means all topics.
    pub topics: Vec<EventTopic>,
    /// Artifacts to include. Empty means all artifacts.
    pub artifacts: Vec<Hash>,
}

impl EventFilter {
    /// Create a filter that accepts all events.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Create a filter for specific topics.
    #[must_use]
    pub fn topics(topics: Vec<EventTopic>) -> Self {
        Self {
            topics,
            artifacts: Vec::new(),
        }
    }

    /// Create a filter for events about specific artifacts.
    #[must_use]
    pub fn for_artifacts(artifacts: Vec<Hash>) -> Self {
        Self {
            topics: Vec::new(),
            artifacts,
        }
    }

    /// Check if an event matches this filter.
    #[must_use]
    pub fn matches(&self, event: &LedgerEvent) -> bool {
        let topic_match = self.topics.is_empty()
            || self.topics.contains(&EventTopic::All)
            || self.topics.contains(&event.topic());

        let artifact_match = self.artifacts.is_empty() || self.artifacts.contains(&event.artifact());

        topic_match && artifact_match
    }
}
