//! # Exhale / Inhale
//!
//! The two transfer transitions, run while the caller holds the send lock.
//! Each loads the ledger under the artifact's head mutex, validates in the
//! domain, collects signatures, re-checks every invariant and only then
//! persists.

use super::SigilLedgerService;
use crate::application::request::{InhaleReceipt, SendRequest};
use crate::domain::child::send_id;
use crate::domain::hardened::{link_receive_message, link_send_message};
use crate::domain::invariants;
use crate::domain::transfer::{
    leaf_hash_receive, receiver_message, receiver_stamp, sender_message, sender_stamp,
};
use crate::domain::{
    derive_child_hash, ArtifactLedger, ClaimWindow, DerivationStatus, ExhaleDraft, HardenedLink,
    LedgerError, LinkBody, LinkReceive, LinkSend, Nonce, OpenTransfer, ReceiverHalf, SenderHalf,
    ShareLink, TransferRecord, ZkRefs,
};
use crate::ports::{SigningCapability, ZkStatementKind};
use sigil_bus::LedgerEvent;
use sigil_crypto::canonical;
use sigil_types::{Hash, Pulse};
use tracing::{debug, info};

impl SigilLedgerService {
    pub(crate) async fn exhale_locked(
        &self,
        artifact: Hash,
        signer: &dyn SigningCapability,
        request: &SendRequest,
    ) -> Result<ShareLink, LedgerError> {
        let head = self.head_mutex(artifact);
        let _head = head.lock().await;
        let now = self.clock.now_pulse();

        let mut ledger = self.load_existing(&artifact)?;
        if signer.public_key() != ledger.branch.owner {
            return Err(LedgerError::SignatureMismatch(format!(
                "signer {} does not own {}",
                signer.public_key(),
                artifact.short()
            )));
        }
        let mut stored = Some(ledger.head()?);

        if let Some(nonce) = &request.nonce {
            if let Some(share) = self.replay_send(&ledger, nonce, request, now)? {
                return Ok(share);
            }
        }

        if self.settle_head(&mut ledger, now).await? {
            invariants::check_ledger(&ledger)?;
            self.persist(&ledger, &mut stored).await?;
        }

        let nonce = request.nonce.clone().unwrap_or_else(Nonce::random);
        let draft = ledger.prepare_exhale(request.amount, request.harden, &nonce)?;

        let stamp = sender_stamp(
            &artifact,
            &draft.previous_head_root,
            request.amount,
            &nonce,
            now,
            request.payload.as_deref(),
        )?;
        let sender_sig = signer.sign(&sender_message(&artifact, &stamp, now)?).await?;
        let sender = SenderHalf {
            sender_pubkey: signer.public_key(),
            sender_sig,
            sender_stamp: stamp,
            sender_pulse: now,
            amount: request.amount,
            nonce,
            payload: request.payload.clone(),
        };
        let leaf_send = sender.leaf_hash()?;
        let child = derive_child_hash(
            &artifact,
            &sender.nonce,
            &sender.sender_stamp,
            now,
            &draft.previous_head_root,
            &leaf_send,
        )?;

        let link = if draft.hardened {
            Some(
                self.build_send_link(artifact, signer, &draft, &sender, leaf_send)
                    .await?,
            )
        } else {
            None
        };
        let with_zk = link.as_ref().is_some_and(|l| l.zk().is_some());

        let open = OpenTransfer {
            sender: sender.clone(),
            child,
            claim: ClaimWindow::new(now, self.config.claim_steps, self.config.pulses_per_step)?,
        };
        let claim = open.claim;
        ledger.commit_exhale(&draft, open, link)?;
        invariants::check_ledger(&ledger)?;
        self.persist(&ledger, &mut stored).await?;

        let share = ShareLink {
            parent: artifact,
            previous_head_root: draft.previous_head_root,
            send_id: send_id(&artifact, &child, &sender, &draft.previous_head_root, &leaf_send)?,
            sender,
            child,
            claim,
            token: request.token.clone(),
            hardened: draft.hardened,
        };
        self.dedup.lock().record(share.clone(), now);

        info!(
            artifact = %artifact.short(),
            index = draft.index,
            child = %child.short(),
            amount = %request.amount,
            remaining = %ledger.balance()?.remaining,
            hardened = draft.hardened,
            with_zk,
            expire_pulse = claim.expire_pulse,
            "Transfer opened"
        );
        self.events
            .publish(LedgerEvent::TransferOpened {
                artifact,
                index: draft.index,
                child,
                amount: request.amount,
                hardened: draft.hardened,
            })
            .await;
        Ok(share)
    }

    /// Share link of an earlier send with the same nonce, if any.
    ///
    /// The in-process index answers recent retries. Anything it no longer
    /// holds is rebuilt from the stored window, so a retry after a restart
    /// is still a no-op.
    fn replay_send(
        &self,
        ledger: &ArtifactLedger,
        nonce: &Nonce,
        request: &SendRequest,
        now: Pulse,
    ) -> Result<Option<ShareLink>, LedgerError> {
        let artifact = ledger.canonical_hash();
        let indexed = self.dedup.lock().check(&artifact, nonce, request.amount, now)?;
        let (share, source) = match indexed {
            Some(share) => (share, "index"),
            None => match ledger.replay_send(nonce, request.amount, &request.token)? {
                Some(share) => {
                    self.dedup.lock().record(share.clone(), now);
                    (share, "ledger")
                }
                None => return Ok(None),
            },
        };
        info!(
            artifact = %artifact.short(),
            nonce = %nonce,
            child = %share.child.short(),
            send_id = %share.send_id.short(),
            source,
            "Replayed send, returning original share link"
        );
        Ok(Some(share))
    }

    async fn build_send_link(
        &self,
        artifact: Hash,
        signer: &dyn SigningCapability,
        draft: &ExhaleDraft,
        sender: &SenderHalf,
        leaf_send: Hash,
    ) -> Result<HardenedLink, LedgerError> {
        let message = link_send_message(
            &draft.previous_head_root,
            &sender.sender_pubkey,
            sender.sender_pulse,
            &sender.nonce,
            &leaf_send,
        )?;
        let send = LinkSend {
            previous_head_root: draft.previous_head_root,
            sender_pubkey: sender.sender_pubkey,
            sender_pulse: sender.sender_pulse,
            nonce: sender.nonce.clone(),
            leaf_hash_send: leaf_send,
            sender_sig: signer.sign(&message).await?,
        };
        let body = LinkBody { send, receive: None };

        let proof = self
            .prove_zk(ZkStatementKind::Send, artifact, draft.previous_head_root, leaf_send)
            .await;
        Ok(match proof {
            Some(send) => HardenedLink::WithZk {
                body,
                zk: ZkRefs { send, receive: None },
            },
            None => HardenedLink::Basic(body),
        })
    }

    pub(crate) async fn inhale_locked(
        &self,
        share: &ShareLink,
        signer: &dyn SigningCapability,
    ) -> Result<InhaleReceipt, LedgerError> {
        let parent = share.parent;
        let head = self.head_mutex(parent);
        let _head = head.lock().await;
        let now = self.clock.now_pulse();

        let mut ledger = self.load_existing(&parent)?;
        let mut stored = Some(ledger.head()?);
        if self.settle_head(&mut ledger, now).await? {
            invariants::check_ledger(&ledger)?;
            self.persist(&ledger, &mut stored).await?;
        }

        let index = ledger
            .window
            .position_of(&share.child)
            .ok_or_else(|| unclaimable(&ledger, &share.child, now))?;
        let recorded = ledger
            .window
            .get(index)
            .map(|r| r.sender().clone())
            .ok_or(LedgerError::UnknownDerivative {
                artifact: parent,
                child: share.child,
            })?;
        if recorded != share.sender {
            return Err(LedgerError::SignatureMismatch(format!(
                "share link for {} does not match the recorded send",
                share.child.short()
            )));
        }

        match ledger.window.get(index) {
            Some(TransferRecord::Closed(_)) => {
                return Err(LedgerError::AlreadyClosed {
                    artifact: parent,
                    index,
                })
            }
            Some(TransferRecord::Lapsed(lapsed)) => {
                return Err(LedgerError::Expired {
                    expire_pulse: lapsed.expire_pulse,
                    now,
                })
            }
            _ => {}
        }

        let receiver = self.sign_receiver(signer, &share.child, &recorded, now).await?;
        let link = ledger
            .window
            .link(index)
            .map(|l| (l.body().send.clone(), l.zk().is_some()));
        let link_receipt = match link {
            Some((link_send, with_zk)) => {
                let receive = self
                    .sign_link_receipt(signer, &link_send, &recorded, &receiver, now)
                    .await?;
                let proof = if with_zk {
                    self.prove_zk(
                        ZkStatementKind::Receive,
                        parent,
                        link_send.previous_head_root,
                        receive.leaf_hash_receive,
                    )
                    .await
                } else {
                    None
                };
                Some((receive, proof))
            }
            None => None,
        };

        ledger.commit_inhale(index, receiver.clone(), link_receipt, now)?;
        let window_root = ledger.window.root()?;
        let snapshot = canonical::encode_serializable(&ledger.window)?;
        let sealed = ledger.maybe_seal(self.config.segment_size, now)?;
        invariants::check_ledger(&ledger)?;

        let derivation = ledger
            .derivation(&share.child)
            .cloned()
            .ok_or(LedgerError::UnknownDerivative {
                artifact: parent,
                child: share.child,
            })?;
        let child_ledger = ArtifactLedger::derive(&derivation, receiver.receiver_pubkey, now)?;
        invariants::check_ledger(&child_ledger)?;

        // Child first: a retry after a failed parent save re-derives the
        // same child identity and finds it already stored.
        match self.ledgers.load(&share.child)? {
            Some(existing) if existing.identity == child_ledger.identity => {
                debug!(child = %share.child.short(), "Derivative already stored");
            }
            Some(_) => {
                return Err(LedgerError::InvariantViolated {
                    invariant: "derivative identity",
                    detail: format!("{} is stored with another identity", share.child.short()),
                })
            }
            None => self.persist(&child_ledger, &mut None).await?,
        }
        self.persist(&ledger, &mut stored).await?;

        info!(
            artifact = %parent.short(),
            index,
            child = %share.child.short(),
            amount = %derivation.allocation_amount,
            window_root = %window_root.short(),
            "Transfer closed"
        );
        self.events
            .publish(LedgerEvent::TransferClosed {
                artifact: parent,
                index,
                child: share.child,
                window_root,
            })
            .await;
        if let Some(segment) = &sealed {
            self.announce_seal(&ledger, segment).await;
        }
        info!(
            artifact = %share.child.short(),
            parent = %parent.short(),
            base = %derivation.allocation_amount,
            "Derivative issued"
        );
        self.events
            .publish(LedgerEvent::ArtifactIssued {
                artifact: share.child,
                parent: Some(parent),
                base: derivation.allocation_amount,
            })
            .await;

        let content_id = if self.config.publish_windows {
            Some(self.publish_snapshot(parent, snapshot).await)
        } else {
            None
        };

        Ok(InhaleReceipt {
            parent,
            child: share.child,
            index,
            window_root,
            receiver,
            sealed,
            content_id,
        })
    }

    async fn sign_receiver(
        &self,
        signer: &dyn SigningCapability,
        child: &Hash,
        sender: &SenderHalf,
        now: Pulse,
    ) -> Result<ReceiverHalf, LedgerError> {
        let receiver_pubkey = signer.public_key();
        let message = receiver_message(&sender.sender_stamp, sender.sender_pulse, now)?;
        let receiver = ReceiverHalf {
            receiver_pubkey,
            receiver_sig: signer.sign(&message).await?,
            receiver_stamp: receiver_stamp(child, &sender.sender_stamp, &receiver_pubkey, now)?,
            receiver_pulse: now,
        };
        // A signer returning a signature under another key is caught here.
        receiver.verify(sender)?;
        debug!(child = %child.short(), receiver = %receiver_pubkey, "Receiver half signed");
        Ok(receiver)
    }

    async fn sign_link_receipt(
        &self,
        signer: &dyn SigningCapability,
        link_send: &LinkSend,
        sender: &SenderHalf,
        receiver: &ReceiverHalf,
        now: Pulse,
    ) -> Result<LinkReceive, LedgerError> {
        let leaf = leaf_hash_receive(&sender.leaf_hash()?, receiver)?;
        let message = link_receive_message(link_send, &receiver.receiver_pubkey, now, &leaf)?;
        Ok(LinkReceive {
            receiver_pubkey: receiver.receiver_pubkey,
            receiver_pulse: now,
            leaf_hash_receive: leaf,
            receiver_sig: signer.sign(&message).await?,
        })
    }
}

/// Why a derivative no longer in the live window cannot be claimed.
fn unclaimable(ledger: &ArtifactLedger, child: &Hash, now: Pulse) -> LedgerError {
    let artifact = ledger.canonical_hash();
    let found = ledger
        .derivations
        .iter()
        .enumerate()
        .find(|(_, d)| d.child_canonical_hash == *child);
    match found {
        Some((sequence, d)) => match d.status {
            DerivationStatus::Used { .. } => LedgerError::AlreadyClosed {
                artifact,
                index: sequence,
            },
            DerivationStatus::Expired => LedgerError::Expired {
                expire_pulse: d.claim.expire_pulse,
                now,
            },
            DerivationStatus::Claimable => LedgerError::UnknownDerivative {
                artifact,
                child: *child,
            },
        },
        None => LedgerError::UnknownDerivative {
            artifact,
            child: *child,
        },
    }
}
