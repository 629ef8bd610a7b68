//! Account identities derived from configured secret keys.
//!
//! Each account secret is a hex-encoded ed25519 seed. The on-chain address is
//! a one-way derivation: blake3 over the signature-scheme flag byte followed
//! by the public key, hex-encoded with a `0x` prefix. Derivation happens once
//! per orchestrator; the identity is read-only afterwards.

use ed25519_dalek::{Signer, SigningKey, VerifyingKey};

use crate::chain::ChainAddress;

/// Scheme flag prepended to the public key before hashing, so addresses from
/// different signature schemes can never collide.
const ED25519_SCHEME_FLAG: u8 = 0x00;

#[derive(Debug, thiserror::Error)]
pub(crate) enum IdentityError {
    #[error("account secret is not valid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),
    #[error("account secret must decode to 32 bytes, got {0}")]
    InvalidLength(usize),
}

/// A signing identity for one account: address plus ed25519 key material.
pub(crate) struct Identity {
    address: ChainAddress,
    signing_key: SigningKey,
}

impl Identity {
    pub(crate) fn from_secret_hex(secret: &str) -> Result<Self, IdentityError> {
        let stripped = secret.trim().trim_start_matches("0x");
        let bytes = hex::decode(stripped)?;
        let seed: [u8; 32] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| IdentityError::InvalidLength(bytes.len()))?;

        let signing_key = SigningKey::from_bytes(&seed);
        let address = derive_address(&signing_key.verifying_key());

        Ok(Self {
            address,
            signing_key,
        })
    }

    pub(crate) fn address(&self) -> &ChainAddress {
        &self.address
    }

    /// Signs an arbitrary message and returns the signature hex-encoded, as
    /// the task API's login challenge expects.
    pub(crate) fn sign_hex(&self, message: &[u8]) -> String {
        hex::encode(self.signing_key.sign(message).to_bytes())
    }

    /// Signs raw transaction bytes and returns the serialized signature the
    /// chain expects: base64 over flag byte, signature, public key.
    pub(crate) fn sign_transaction(&self, tx_bytes: &[u8]) -> String {
        use base64::Engine as _;
        use base64::engine::general_purpose::STANDARD;

        let signature = self.signing_key.sign(tx_bytes);
        let mut serialized = Vec::with_capacity(1 + 64 + 32);
        serialized.push(ED25519_SCHEME_FLAG);
        serialized.extend_from_slice(&signature.to_bytes());
        serialized.extend_from_slice(self.signing_key.verifying_key().as_bytes());
        STANDARD.encode(serialized)
    }
}

impl std::fmt::Debug for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Key material stays out of logs.
        f.debug_struct("Identity")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

fn derive_address(verifying_key: &VerifyingKey) -> ChainAddress {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&[ED25519_SCHEME_FLAG]);
    hasher.update(verifying_key.as_bytes());
    ChainAddress::new(format!("0x{}", hex::encode(hasher.finalize().as_bytes())))
}
