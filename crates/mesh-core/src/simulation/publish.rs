//! Publication and verification.

use mesh_events::{
    MessageClass, MessageId, NodeId, Packet, PacketBody, PacketId, ProofCheck, PublishReceipt,
    SealedEnvelope, SignatureCheck,
};
use rand::RngCore;
use tracing::info;
use x25519_dalek::PublicKey;

use super::MeshSimulation;
use crate::components::inventory::Inventory;
use crate::components::world::NodeIndex;
use crate::config::MeshConfig;
use crate::crypto::{self, NodeKeys};
use crate::error::MeshError;
use crate::ledger::{EconomyTracker, LedgerError, TransactionKind, Wallet};
use crate::SimRng;

/// A request to originate a message
#[derive(Debug, Clone, PartialEq)]
pub struct PublishRequest {
    pub publisher: NodeId,
    pub text: String,
    pub targets: Vec<NodeId>,
    pub class: MessageClass,
}

impl PublishRequest {
    pub fn new(
        publisher: NodeId,
        text: impl Into<String>,
        targets: Vec<NodeId>,
        class: MessageClass,
    ) -> Self {
        Self {
            publisher,
            text: text.into(),
            targets,
            class,
        }
    }

    /// Build a request from a textual class name ("Logistics", "Help" or "Safe").
    pub fn parse(
        publisher: NodeId,
        text: impl Into<String>,
        targets: Vec<NodeId>,
        class: &str,
    ) -> Result<Self, MeshError> {
        Ok(Self::new(publisher, text, targets, class.parse()?))
    }

    fn validate(&self, config: &MeshConfig, index: &NodeIndex) -> Result<(), MeshError> {
        if !index.contains(self.publisher) {
            return Err(MeshError::UnknownNode(self.publisher));
        }
        if self.text.is_empty() {
            return Err(MeshError::invalid("message text cannot be empty"));
        }
        let length = self.text.chars().count();
        if length > config.messages.max_length {
            return Err(MeshError::invalid(format!(
                "message text is {} characters, limit is {}",
                length, config.messages.max_length
            )));
        }
        if self.targets.is_empty() {
            return Err(MeshError::invalid("at least one target is required"));
        }
        if self.targets.len() > index.len() {
            return Err(MeshError::invalid(format!(
                "{} targets exceeds the node count of {}",
                self.targets.len(),
                index.len()
            )));
        }
        if let Some(&missing) = self.targets.iter().find(|t| !index.contains(**t)) {
            return Err(MeshError::UnknownNode(missing));
        }
        Ok(())
    }
}

fn send_kind(class: MessageClass) -> TransactionKind {
    if class.is_safety() {
        TransactionKind::SafetySend
    } else {
        TransactionKind::LogisticsSend
    }
}

/// `[HASH] <first 16 hex chars>...` placeholder shown to non-targets.
pub(crate) fn opaque_digest(payload: &[u8]) -> String {
    let digest = crypto::hash(payload);
    format!("[HASH] {}...", &digest[..16])
}

impl MeshSimulation {
    /// Originate a message at `request.publisher`.
    ///
    /// The request is fully validated and the send cost checked before
    /// anything is mutated. The packet is only added to the publisher's
    /// inventory; it spreads on subsequent ticks.
    pub fn publish(&mut self, request: PublishRequest) -> Result<PublishReceipt, MeshError> {
        let config = self.config().clone();
        request.validate(&config, self.world.resource::<NodeIndex>())?;

        let cost = config.economy.send_cost(request.class);
        let balance = self.component::<Wallet>(request.publisher)?.balance;
        if cost > balance {
            return Err(LedgerError::InsufficientBalance {
                needed: cost,
                available: balance,
            }
            .into());
        }

        let keys = self.component::<NodeKeys>(request.publisher)?.clone();
        let recipients: Vec<(NodeId, PublicKey)> = match request.class {
            MessageClass::Logistics => request
                .targets
                .iter()
                .map(|&t| Ok((t, self.component::<NodeKeys>(t)?.exchange_public())))
                .collect::<Result<_, MeshError>>()?,
            _ => Vec::new(),
        };

        let now_ms = self.clock().now_ms;
        let (body, nonce) = {
            let mut rng = self.world.resource_mut::<SimRng>();
            let body = match request.class {
                MessageClass::Logistics => {
                    let mut envelopes = Vec::with_capacity(recipients.len());
                    for (recipient, public) in &recipients {
                        let key = keys.shared_secret(public);
                        let (ciphertext, nonce) =
                            crypto::encrypt(&key, request.text.as_bytes(), &mut rng.0)
                                .ok_or_else(|| MeshError::invalid("encryption failed"))?;
                        envelopes.push(SealedEnvelope {
                            recipient: *recipient,
                            ciphertext,
                            nonce,
                        });
                    }
                    PacketBody::Sealed { envelopes }
                }
                MessageClass::Help => PacketBody::Signed {
                    signature: keys.sign(request.text.as_bytes()),
                    text: request.text.clone(),
                },
                MessageClass::Safe => PacketBody::Anonymous {
                    text: request.text.clone(),
                    proof: crypto::generate_anonymity_proof(),
                },
            };
            (body, rng.0.next_u64())
        };

        let message_id = crypto::message_id(request.publisher, &request.text, now_ms, nonce);
        let packet = Packet::originate(
            message_id.clone(),
            request.publisher,
            request.targets.clone(),
            now_ms,
            body,
        );
        let packet_id = packet.packet_id;
        let network = packet.network;
        let signature = match &packet.body {
            PacketBody::Signed { signature, .. } => Some(hex::encode(signature)),
            _ => None,
        };
        let proof = match &packet.body {
            PacketBody::Anonymous { proof, .. } => Some(proof.clone()),
            _ => None,
        };

        let remaining_balance = {
            let mut wallet = self.component_mut::<Wallet>(request.publisher)?;
            wallet.spend(cost)?;
            wallet.balance
        };
        if cost > 0 {
            self.world
                .resource_mut::<EconomyTracker>()
                .record(send_kind(request.class), cost);
        }
        {
            let mut inventory = self.component_mut::<Inventory>(request.publisher)?;
            inventory.insert(packet);
            inventory.enforce_cap(config.inventory.max_size);
        }

        info!(
            message = %message_id,
            publisher = %request.publisher,
            class = %request.class,
            targets = request.targets.len(),
            cost,
            "published"
        );

        Ok(PublishReceipt {
            message_id,
            packet_id,
            publisher_node_id: request.publisher,
            class: request.class,
            network,
            send_cost: cost,
            remaining_balance,
            created_at_ms: now_ms,
            signature,
            proof,
        })
    }

    /// Plain text of a packet held by `node`, for targets only.
    ///
    /// Sealed packets are decrypted with the key shared between the holder
    /// and the publisher. A failed decryption is reported the same way as a
    /// non-target asking.
    pub fn open_packet(&self, node: NodeId, packet_id: PacketId) -> Result<String, MeshError> {
        let packet = self
            .component::<Inventory>(node)?
            .get(packet_id)
            .ok_or(MeshError::UnknownPacket(packet_id))?;
        if !packet.is_target(node) {
            return Err(MeshError::NotDecryptable {
                node,
                packet: packet_id,
            });
        }
        match &packet.body {
            PacketBody::Sealed { .. } => {
                let envelope = packet.body.envelope_for(node).ok_or(MeshError::NotDecryptable {
                    node,
                    packet: packet_id,
                })?;
                let publisher = self.component::<NodeKeys>(packet.publisher_id)?;
                let key = self
                    .component::<NodeKeys>(node)?
                    .shared_secret(&publisher.exchange_public());
                crypto::decrypt(&key, &envelope.ciphertext, &envelope.nonce)
                    .and_then(|bytes| String::from_utf8(bytes).ok())
                    .ok_or(MeshError::NotDecryptable {
                        node,
                        packet: packet_id,
                    })
            }
            PacketBody::Signed { text, .. } | PacketBody::Anonymous { text, .. } => {
                Ok(text.clone())
            }
        }
    }

    /// Check the publisher signature on the first held copy of a Help message.
    pub fn verify_signature(&self, message_id: &MessageId) -> Result<SignatureCheck, MeshError> {
        let packet = self.first_copy(message_id)?;
        let PacketBody::Signed { text, signature } = &packet.body else {
            return Err(MeshError::WrongClass {
                expected: MessageClass::Help,
                what: "signature",
            });
        };
        let signature_valid = self
            .component::<NodeKeys>(packet.publisher_id)
            .map(|keys| {
                crypto::verify(&keys.verifying_key(), text.as_bytes(), signature)
            })
            .unwrap_or(false);

        Ok(SignatureCheck {
            message_id: message_id.clone(),
            publisher_id: packet.publisher_id,
            signature_valid,
            message_text: if signature_valid {
                text.clone()
            } else {
                "[INVALID SIGNATURE]".to_string()
            },
        })
    }

    /// Check the anonymity proof on the first held copy of a Safe message.
    pub fn verify_proof(&self, message_id: &MessageId) -> Result<ProofCheck, MeshError> {
        let packet = self.first_copy(message_id)?;
        let PacketBody::Anonymous { text, proof } = &packet.body else {
            return Err(MeshError::WrongClass {
                expected: MessageClass::Safe,
                what: "proof",
            });
        };
        let proof_valid = crypto::verify_anonymity_proof(proof);

        Ok(ProofCheck {
            message_id: message_id.clone(),
            proof_valid,
            publisher: if proof_valid { "ANONYMOUS" } else { "INVALID" }.to_string(),
            message_text: if proof_valid {
                text.clone()
            } else {
                "[INVALID PROOF]".to_string()
            },
        })
    }

    /// First copy of a message in node id order.
    fn first_copy(&self, message_id: &MessageId) -> Result<&Packet, MeshError> {
        let index = self.world.resource::<NodeIndex>();
        index
            .iter()
            .filter_map(|(_, entity)| self.world.get::<Inventory>(entity))
            .find_map(|inv| {
                inv.packets()
                    .iter()
                    .find(|p| &p.original_message_id == message_id)
            })
            .ok_or_else(|| MeshError::UnknownMessage(message_id.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MeshConfig;

    fn sim() -> MeshSimulation {
        MeshSimulation::new(MeshConfig::default())
    }

    #[test]
    fn test_publish_charges_and_stores() {
        let mut sim = sim();
        let receipt = sim
            .publish(PublishRequest::new(
                NodeId(1),
                "need water",
                vec![NodeId(2)],
                MessageClass::Help,
            ))
            .unwrap();
        assert_eq!(receipt.send_cost, 2);
        assert_eq!(receipt.remaining_balance, 98);
        assert!(receipt.signature.is_some());
        assert!(receipt.proof.is_none());

        let inv = sim.component::<Inventory>(NodeId(1)).unwrap();
        assert_eq!(inv.len(), 1);
        assert!(inv.knows(&receipt.message_id));
        assert_eq!(inv.packets()[0].history, vec![NodeId(1)]);
        assert!(sim.ledger_balanced());
    }

    #[test]
    fn test_safe_publish_is_free() {
        let mut sim = sim();
        let receipt = sim
            .publish(PublishRequest::new(
                NodeId(3),
                "I am safe",
                vec![NodeId(1), NodeId(2)],
                MessageClass::Safe,
            ))
            .unwrap();
        assert_eq!(receipt.send_cost, 0);
        assert_eq!(receipt.remaining_balance, 100);
        assert_eq!(receipt.proof.as_deref(), Some(crypto::ANONYMITY_PROOF));
        assert_eq!(receipt.network.to_string(), "LoRa");
    }

    #[test]
    fn test_validation_happens_before_mutation() {
        let mut sim = sim();
        let cases = vec![
            PublishRequest::new(NodeId(99), "x", vec![NodeId(1)], MessageClass::Help),
            PublishRequest::new(NodeId(1), "", vec![NodeId(2)], MessageClass::Help),
            PublishRequest::new(NodeId(1), "x".repeat(1_001), vec![NodeId(2)], MessageClass::Help),
            PublishRequest::new(NodeId(1), "x", vec![], MessageClass::Help),
            PublishRequest::new(NodeId(1), "x", vec![NodeId(42)], MessageClass::Help),
            PublishRequest::new(NodeId(1), "x", (1..=11).map(NodeId).collect(), MessageClass::Help),
        ];
        for request in cases {
            assert!(sim.publish(request).is_err());
        }
        assert_eq!(sim.total_balance(), 1_000);
        assert!(sim.all_packets().is_empty());
    }

    #[test]
    fn test_unknown_class_is_rejected() {
        let err = PublishRequest::parse(NodeId(1), "x", vec![NodeId(2)], "Urgent").unwrap_err();
        assert!(matches!(err, MeshError::Class(_)));
        let ok = PublishRequest::parse(NodeId(1), "x", vec![NodeId(2)], "Logistics").unwrap();
        assert_eq!(ok.class, MessageClass::Logistics);
    }

    #[test]
    fn test_insufficient_credits() {
        let mut sim = sim();
        sim.drain_wallet(NodeId(1)).unwrap();
        let err = sim
            .publish(PublishRequest::new(
                NodeId(1),
                "x",
                vec![NodeId(2)],
                MessageClass::Logistics,
            ))
            .unwrap_err();
        assert_eq!(err.to_string(), "Insufficient credits. Need 2, have 0");
        assert!(sim.all_packets().is_empty());
    }

    #[test]
    fn test_logistics_is_sealed_per_target() {
        let mut sim = sim();
        let receipt = sim
            .publish(PublishRequest::new(
                NodeId(1),
                "3 pallets at dock B",
                vec![NodeId(1), NodeId(4)],
                MessageClass::Logistics,
            ))
            .unwrap();
        assert_eq!(
            sim.open_packet(NodeId(1), receipt.packet_id).unwrap(),
            "3 pallets at dock B"
        );

        let (_, packet) = sim.find_packet(receipt.packet_id).unwrap();
        let PacketBody::Sealed { envelopes } = &packet.body else {
            panic!("expected sealed body");
        };
        assert_eq!(envelopes.len(), 2);
        assert!(envelopes
            .iter()
            .all(|e| e.ciphertext != b"3 pallets at dock B".to_vec()));
        assert_eq!(packet.text(), None);

        // Node 2 holds no envelope even when handed the packet
        let copy = packet.relay_to(NodeId(2)).unwrap();
        sim.component_mut::<Inventory>(NodeId(2)).unwrap().insert(copy.clone());
        assert!(matches!(
            sim.open_packet(NodeId(2), copy.packet_id),
            Err(MeshError::NotDecryptable { .. })
        ));
    }

    #[test]
    fn test_verify_signature_and_proof() {
        let mut sim = sim();
        let help = sim
            .publish(PublishRequest::new(NodeId(1), "help", vec![NodeId(2)], MessageClass::Help))
            .unwrap();
        let safe = sim
            .publish(PublishRequest::new(NodeId(2), "safe", vec![NodeId(1)], MessageClass::Safe))
            .unwrap();

        let check = sim.verify_signature(&help.message_id).unwrap();
        assert!(check.signature_valid);
        assert_eq!(check.message_text, "help");

        let proof = sim.verify_proof(&safe.message_id).unwrap();
        assert!(proof.proof_valid);
        assert_eq!(proof.publisher, "ANONYMOUS");

        assert!(matches!(
            sim.verify_signature(&safe.message_id),
            Err(MeshError::WrongClass { .. })
        ));
        assert!(matches!(
            sim.verify_proof(&help.message_id),
            Err(MeshError::WrongClass { .. })
        ));
        assert!(matches!(
            sim.verify_proof(&MessageId::from("nope")),
            Err(MeshError::UnknownMessage(_))
        ));
    }

    #[test]
    fn test_opaque_digest_format() {
        let digest = opaque_digest(b"hello");
        assert!(digest.starts_with("[HASH] "));
        assert!(digest.ends_with("..."));
        assert_eq!(digest.len(), "[HASH] ".len() + 16 + 3);
    }
}
