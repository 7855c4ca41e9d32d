/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Cryptographic primitives.
//!
//! The definitions and re-exports in this module provide two categories of cryptographic primitives:
//! 1. **Cryptographic Hashes**: provided by the [`sha2`] crate.
//! 2. **Digital Signatures**: provided by the [`ed25519_dalek`] crate.
//!
//! Participants are identified by an [`Address`] derived from their verifying key. "Recovering" the
//! signer of a message means checking its signature against the verifying key carried alongside it,
//! and then deriving the address of that key.

use super::data_types::{Address, SignatureBytes, VerifyingKeyBytes};

// re-exports below.
pub use sha2::Digest;
pub use sha2::Sha256 as CryptoHasher;

pub use ed25519_dalek::{Signature, SignatureError, Signer, SigningKey, Verifier, VerifyingKey};

/// A facade around [`SigningKey`] that implements methods for [`sign`](Self::sign)-ing messages, as
/// well as getters for the [`public`](Self::public) key and the [`address`](Self::address) associated
/// with the signing key.
#[derive(Clone)]
pub struct Keypair(SigningKey);

impl Keypair {
    /// Create a `Keypair` that wraps over `signing_key`.
    pub fn new(signing_key: SigningKey) -> Keypair {
        Keypair(signing_key)
    }

    /// Sign an arbitrary `message` with the `Keypair`.
    pub fn sign(&self, message: &[u8]) -> SignatureBytes {
        SignatureBytes::new(self.0.sign(message).to_bytes())
    }

    /// Get the `VerifyingKey` of this `Keypair`.
    pub fn public(&self) -> VerifyingKey {
        self.0.verifying_key()
    }

    /// Get the `Address` of this `Keypair`.
    pub fn address(&self) -> Address {
        address_of(&self.public())
    }
}

/// Derive the `Address` of a verifying key: the last 20 bytes of the SHA-256 hash of its bytes.
pub fn address_of(verifying_key: &VerifyingKey) -> Address {
    address_of_key_bytes(&verifying_key.to_bytes())
}

pub(crate) fn address_of_key_bytes(verifying_key_bytes: &VerifyingKeyBytes) -> Address {
    let digest: [u8; 32] = CryptoHasher::digest(verifying_key_bytes).into();
    let mut address = [0u8; 20];
    address.copy_from_slice(&digest[12..]);
    Address::new(address)
}

/// Recover the address of the signer of `message`.
///
/// Returns `None` if `verifying_key_bytes` is not a valid Ed25519 point, or if `signature` is not a
/// correct signature over `message` by that key.
pub fn recover_signer(
    verifying_key_bytes: &VerifyingKeyBytes,
    message: &[u8],
    signature: &SignatureBytes,
) -> Option<Address> {
    let verifying_key = VerifyingKey::from_bytes(verifying_key_bytes).ok()?;
    let signature = Signature::from_bytes(&signature.bytes());
    verifying_key.verify(message, &signature).ok()?;
    Some(address_of(&verifying_key))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recovered_signer_is_the_address_of_the_signing_key() {
        let keypair = Keypair::new(SigningKey::from_bytes(&[7u8; 32]));
        let message = b"round change".to_vec();
        let signature = keypair.sign(&message);

        assert_eq!(
            recover_signer(&keypair.public().to_bytes(), &message, &signature),
            Some(keypair.address())
        );
        assert_eq!(
            recover_signer(&keypair.public().to_bytes(), b"tampered", &signature),
            None
        );
    }
}
