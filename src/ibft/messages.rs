/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Messages exchanged by validators running the IBFT protocol, and the certificates built from them.
//!
//! ## Payloads and signed payloads
//!
//! Each kind of message has a payload type that implements [`Payload`]: [`Proposal`], [`Prepare`],
//! [`Commit`], [`RoundChange`], and [`NewRound`]. A payload is only ever sent inside a
//! [`SignedPayload`], which carries the verifying key of its signer and a signature over the
//! message code and the payload.
//!
//! ## Decoding
//!
//! Wire-level [`Message`]s are turned into an [`IbftMessage`] exactly once, in
//! [`IbftMessage::decode`]. Decoding checks every signature in the message, including the signatures
//! of the payloads embedded in certificates, so that the rest of the protocol can trust the
//! [`sender`](SignedPayload::sender) of any signed payload it handles.

use std::fmt::{self, Display, Formatter};

use borsh::{BorshDeserialize, BorshSerialize};

use crate::networking::messages::Message;
use crate::types::{
    block::{Block, CommitSeal},
    crypto_primitives::{address_of_key_bytes, recover_signer, Keypair},
    data_types::*,
};

pub const PROPOSAL: u8 = 0;
pub const PREPARE: u8 = 1;
pub const COMMIT: u8 = 2;
pub const ROUND_CHANGE: u8 = 3;
pub const NEW_ROUND: u8 = 4;

/// Implemented by the body of every kind of IBFT message.
pub trait Payload: Clone + BorshSerialize + BorshDeserialize {
    /// Message type code of the messages that carry this payload.
    const CODE: u8;

    /// Get the round that this payload belongs to.
    fn round_identifier(&self) -> RoundIdentifier;
}

/// A candidate block for a round.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct Proposal {
    pub round: RoundIdentifier,
    pub block: Block,
}

/// Attestation that the sender accepted the block with hash `digest` as the proposal for `round`.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct Prepare {
    pub round: RoundIdentifier,
    pub digest: CryptoHash,
}

/// Attestation that the sender saw a prepare quorum for the block with hash `digest`, together with a
/// seal that the sender's address can be recovered from.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct Commit {
    pub round: RoundIdentifier,
    pub digest: CryptoHash,
    pub commit_seal: CommitSeal,
}

/// Request to move to `round`, optionally carrying proof that the sender was prepared in an earlier
/// round.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct RoundChange {
    pub round: RoundIdentifier,
    pub prepared_certificate: Option<PreparedCertificate>,
}

/// The proposer of `round`'s justification for starting the round: the proposal for the round and the
/// proof that a quorum of validators asked to move to it.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct NewRound {
    pub round: RoundIdentifier,
    pub proposal: SignedPayload<Proposal>,
    pub round_change_certificate: Option<RoundChangeCertificate>,
}

impl Payload for Proposal {
    const CODE: u8 = PROPOSAL;

    fn round_identifier(&self) -> RoundIdentifier {
        self.round
    }
}

impl Payload for Prepare {
    const CODE: u8 = PREPARE;

    fn round_identifier(&self) -> RoundIdentifier {
        self.round
    }
}

impl Payload for Commit {
    const CODE: u8 = COMMIT;

    fn round_identifier(&self) -> RoundIdentifier {
        self.round
    }
}

impl Payload for RoundChange {
    const CODE: u8 = ROUND_CHANGE;

    fn round_identifier(&self) -> RoundIdentifier {
        self.round
    }
}

impl Payload for NewRound {
    const CODE: u8 = NEW_ROUND;

    fn round_identifier(&self) -> RoundIdentifier {
        self.round
    }
}

/// A payload together with the verifying key of its signer and the signature.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct SignedPayload<P> {
    pub payload: P,
    pub signer: VerifyingKeyBytes,
    pub signature: SignatureBytes,
}

impl<P: Payload> SignedPayload<P> {
    /// Sign `payload` with `keypair`.
    pub fn new(keypair: &Keypair, payload: P) -> SignedPayload<P> {
        let signature = keypair.sign(&signing_bytes(&payload));
        SignedPayload {
            payload,
            signer: keypair.public().to_bytes(),
            signature,
        }
    }

    /// Get the address of the signer of this payload.
    ///
    /// This can only be trusted after [`is_correctly_signed`](Self::is_correctly_signed) returned true,
    /// which is the case for every signed payload obtained from [`IbftMessage::decode`].
    pub fn sender(&self) -> Address {
        address_of_key_bytes(&self.signer)
    }

    pub fn round_identifier(&self) -> RoundIdentifier {
        self.payload.round_identifier()
    }

    pub fn is_correctly_signed(&self) -> bool {
        recover_signer(&self.signer, &signing_bytes(&self.payload), &self.signature).is_some()
    }
}

// The bytes signed for a payload: its message code followed by its Borsh encoding.
fn signing_bytes<P: Payload>(payload: &P) -> Vec<u8> {
    let mut bytes = vec![P::CODE];
    // Safety: serializing into a Vec cannot fail.
    bytes.extend(payload.try_to_vec().unwrap());
    bytes
}

/// Proof that the block in `proposal` reached prepare quorum in the proposal's round.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct PreparedCertificate {
    pub proposal: SignedPayload<Proposal>,
    pub prepares: Vec<SignedPayload<Prepare>>,
}

impl PreparedCertificate {
    pub fn round_identifier(&self) -> RoundIdentifier {
        self.proposal.payload.round
    }

    pub fn block(&self) -> &Block {
        &self.proposal.payload.block
    }

    fn is_correctly_signed(&self) -> bool {
        self.proposal.is_correctly_signed()
            && self.prepares.iter().all(|prepare| prepare.is_correctly_signed())
    }
}

/// Proof that a quorum of validators asked to move to the same round.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct RoundChangeCertificate {
    pub round_changes: Vec<SignedPayload<RoundChange>>,
}

impl RoundChangeCertificate {
    /// Get the prepared certificate from the latest round among those carried by the round changes in
    /// this certificate.
    pub fn latest_prepared_certificate(&self) -> Option<&PreparedCertificate> {
        self.round_changes
            .iter()
            .filter_map(|round_change| round_change.payload.prepared_certificate.as_ref())
            .max_by_key(|prepared_certificate| prepared_certificate.round_identifier())
    }

    pub fn senders(&self) -> Vec<Address> {
        self.round_changes
            .iter()
            .map(|round_change| round_change.sender())
            .collect()
    }

    fn is_correctly_signed(&self) -> bool {
        self.round_changes.iter().all(|round_change| {
            round_change.is_correctly_signed()
                && round_change
                    .payload
                    .prepared_certificate
                    .as_ref()
                    .map_or(true, |cert| cert.is_correctly_signed())
        })
    }
}

/// An IBFT message whose signatures have all been checked.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IbftMessage {
    Proposal(SignedPayload<Proposal>),
    Prepare(SignedPayload<Prepare>),
    Commit(SignedPayload<Commit>),
    RoundChange(SignedPayload<RoundChange>),
    NewRound(SignedPayload<NewRound>),
}

impl IbftMessage {
    /// Decode `message` into the variant selected by its code, and check every signature it carries.
    pub fn decode(message: &Message) -> Result<IbftMessage, DecodeError> {
        let code = message.code;
        let ibft_message = match code {
            PROPOSAL => IbftMessage::Proposal(decode_signed_payload(message)?),
            PREPARE => IbftMessage::Prepare(decode_signed_payload(message)?),
            COMMIT => IbftMessage::Commit(decode_signed_payload(message)?),
            ROUND_CHANGE => IbftMessage::RoundChange(decode_signed_payload(message)?),
            NEW_ROUND => IbftMessage::NewRound(decode_signed_payload(message)?),
            _ => return Err(DecodeError::UnrecognizedMessageCode(code)),
        };

        if ibft_message.is_correctly_signed() {
            Ok(ibft_message)
        } else {
            Err(DecodeError::InvalidSignature { code })
        }
    }

    pub fn code(&self) -> u8 {
        match self {
            IbftMessage::Proposal(_) => PROPOSAL,
            IbftMessage::Prepare(_) => PREPARE,
            IbftMessage::Commit(_) => COMMIT,
            IbftMessage::RoundChange(_) => ROUND_CHANGE,
            IbftMessage::NewRound(_) => NEW_ROUND,
        }
    }

    pub fn round_identifier(&self) -> RoundIdentifier {
        match self {
            IbftMessage::Proposal(msg) => msg.round_identifier(),
            IbftMessage::Prepare(msg) => msg.round_identifier(),
            IbftMessage::Commit(msg) => msg.round_identifier(),
            IbftMessage::RoundChange(msg) => msg.round_identifier(),
            IbftMessage::NewRound(msg) => msg.round_identifier(),
        }
    }

    pub fn height(&self) -> BlockHeight {
        self.round_identifier().height
    }

    /// Get the address of the validator that signed this message.
    pub fn sender(&self) -> Address {
        match self {
            IbftMessage::Proposal(msg) => msg.sender(),
            IbftMessage::Prepare(msg) => msg.sender(),
            IbftMessage::Commit(msg) => msg.sender(),
            IbftMessage::RoundChange(msg) => msg.sender(),
            IbftMessage::NewRound(msg) => msg.sender(),
        }
    }

    pub fn signature(&self) -> SignatureBytes {
        match self {
            IbftMessage::Proposal(msg) => msg.signature,
            IbftMessage::Prepare(msg) => msg.signature,
            IbftMessage::Commit(msg) => msg.signature,
            IbftMessage::RoundChange(msg) => msg.signature,
            IbftMessage::NewRound(msg) => msg.signature,
        }
    }

    fn is_correctly_signed(&self) -> bool {
        match self {
            IbftMessage::Proposal(msg) => msg.is_correctly_signed(),
            IbftMessage::Prepare(msg) => msg.is_correctly_signed(),
            IbftMessage::Commit(msg) => msg.is_correctly_signed(),
            IbftMessage::RoundChange(msg) => {
                msg.is_correctly_signed()
                    && msg
                        .payload
                        .prepared_certificate
                        .as_ref()
                        .map_or(true, |cert| cert.is_correctly_signed())
            }
            IbftMessage::NewRound(msg) => {
                msg.is_correctly_signed()
                    && msg.payload.proposal.is_correctly_signed()
                    && msg
                        .payload
                        .round_change_certificate
                        .as_ref()
                        .map_or(true, |cert| cert.is_correctly_signed())
            }
        }
    }
}

fn decode_signed_payload<P: Payload>(message: &Message) -> Result<SignedPayload<P>, DecodeError> {
    SignedPayload::<P>::try_from_slice(&message.data)
        .map_err(|_| DecodeError::MalformedPayload { code: message.code })
}

impl<P: Payload> From<SignedPayload<P>> for Message {
    fn from(value: SignedPayload<P>) -> Self {
        // Safety: serializing into a Vec cannot fail.
        Message::new(P::CODE, value.try_to_vec().unwrap())
    }
}

impl From<IbftMessage> for Message {
    fn from(value: IbftMessage) -> Self {
        match value {
            IbftMessage::Proposal(msg) => msg.into(),
            IbftMessage::Prepare(msg) => msg.into(),
            IbftMessage::Commit(msg) => msg.into(),
            IbftMessage::RoundChange(msg) => msg.into(),
            IbftMessage::NewRound(msg) => msg.into(),
        }
    }
}

macro_rules! impl_from_signed_payload {
    ($($payload:ident),*) => {
        $(
            impl From<SignedPayload<$payload>> for IbftMessage {
                fn from(value: SignedPayload<$payload>) -> Self {
                    IbftMessage::$payload(value)
                }
            }
        )*
    };
}

impl_from_signed_payload!(Proposal, Prepare, Commit, RoundChange, NewRound);

/// Reasons why a wire-level message could not be turned into an [`IbftMessage`]. Displayed as an
/// "unrecognized IBFT message".
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DecodeError {
    UnrecognizedMessageCode(u8),
    MalformedPayload { code: u8 },
    InvalidSignature { code: u8 },
}

impl Display for DecodeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::UnrecognizedMessageCode(code) => {
                write!(f, "unrecognized IBFT message: unknown message code {}", code)
            }
            DecodeError::MalformedPayload { code } => {
                write!(f, "unrecognized IBFT message: malformed payload for code {}", code)
            }
            DecodeError::InvalidSignature { code } => {
                write!(f, "unrecognized IBFT message: invalid signature for code {}", code)
            }
        }
    }
}

impl std::error::Error for DecodeError {}
