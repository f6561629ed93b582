//! secp256k1 keys, signatures and address derivation.

use std::fmt;

use serde::{de::Deserializer, Deserialize, Serialize, Serializer};
use sha3::Digest;

use crate::common::{Addr, BytesRef, BytesVisitor, Hash};

/// Compressed secp256k1 public key.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct PubKey([u8; 33]);

impl PubKey {
    pub const LEN: usize = 33;

    pub fn from_slice(s: &[u8]) -> Option<Self> {
        if s.len() != Self::LEN {
            return None
        }
        let mut t = [0u8; 33];
        t.copy_from_slice(s);
        // reject points that are not on the curve
        libsecp256k1::PublicKey::parse_compressed(&t).ok()?;
        Some(Self(t))
    }

    #[inline(always)]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    fn point(&self) -> libsecp256k1::PublicKey {
        // NOTE: validated on construction
        libsecp256k1::PublicKey::parse_compressed(&self.0)
            .unwrap_or_else(|_| panic!("invalid pubkey {:?}", self))
    }

    /// Last 20 bytes of the keccak256 of the uncompressed point.
    pub fn address(&self) -> Addr {
        let full = self.point().serialize();
        Addr::from_slice(&sha3::Keccak256::digest(&full[1..]).as_slice()[12..])
    }

    /// Verify a 64-byte compact signature over `keccak256(msg)`.
    pub fn verify(&self, msg: &[u8], sig: &[u8]) -> bool {
        let sig = match libsecp256k1::Signature::parse_standard_slice(sig) {
            Ok(sig) => sig,
            Err(_) => return false,
        };
        let digest = Hash::hash(msg).to_fixed_bytes();
        let msg = libsecp256k1::Message::parse(&digest);
        libsecp256k1::verify(&msg, &sig, &self.point())
    }
}

impl fmt::Debug for PubKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PubKey(0x{:x})", BytesRef(&self.0))
    }
}

impl fmt::Display for PubKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:x}", BytesRef(&self.0))
    }
}

impl rlp::Encodable for PubKey {
    fn rlp_append(&self, s: &mut rlp::RlpStream) {
        s.encoder().encode_value(&self.0);
    }
}

impl rlp::Decodable for PubKey {
    fn decode(rlp: &rlp::Rlp) -> Result<Self, rlp::DecoderError> {
        rlp.decoder().decode_value(|bytes| {
            PubKey::from_slice(bytes)
                .ok_or(rlp::DecoderError::Custom("invalid pubkey"))
        })
    }
}

impl Serialize for PubKey {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        BytesRef::serialize(&BytesRef(&self.0), serializer)
    }
}

impl<'de> Deserialize<'de> for PubKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        use serde::de::Error;
        let bytes = deserializer.deserialize_str(BytesVisitor)?;
        PubKey::from_slice(&bytes)
            .ok_or_else(|| D::Error::custom("invalid compressed pubkey"))
    }
}

/// A secp256k1 signing key.
#[derive(Clone)]
pub struct PrivKey(libsecp256k1::SecretKey);

impl PrivKey {
    pub fn from_bytes(b: &[u8; 32]) -> Option<Self> {
        Some(Self(libsecp256k1::SecretKey::parse(b).ok()?))
    }

    pub fn pub_key(&self) -> PubKey {
        PubKey(libsecp256k1::PublicKey::from_secret_key(&self.0).serialize_compressed())
    }

    /// 64-byte compact signature over `keccak256(msg)`.
    pub fn sign(&self, msg: &[u8]) -> Vec<u8> {
        let digest = Hash::hash(msg).to_fixed_bytes();
        let msg = libsecp256k1::Message::parse(&digest);
        let (sig, _) = libsecp256k1::sign(&msg, &self.0);
        sig.serialize().to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(seed: &[u8]) -> PrivKey {
        PrivKey::from_bytes(&Hash::hash(seed).to_fixed_bytes()).unwrap()
    }

    #[test]
    fn test_sign_verify() {
        let k = key(b"alice");
        let pk = k.pub_key();
        let sig = k.sign(b"hello");
        assert!(pk.verify(b"hello", &sig));
        assert!(!pk.verify(b"hellp", &sig));
        assert!(!key(b"bob").pub_key().verify(b"hello", &sig));
        assert!(!pk.verify(b"hello", &sig[..63]));
    }

    #[test]
    fn test_pubkey_codec() {
        let pk = key(b"alice").pub_key();
        let back: PubKey = rlp::decode(&rlp::encode(&pk)).unwrap();
        assert_eq!(back, pk);
        assert_eq!(back.address(), pk.address());
        assert!(PubKey::from_slice(&[2u8; 32]).is_none());
    }
}
