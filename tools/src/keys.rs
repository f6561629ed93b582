use qsdk::common::{Addr, Hash};
use qsdk::crypto::{PrivKey, PubKey};

/// A key pair derived from a human-readable seed, so every run (and every node) gets the same
/// accounts.
#[derive(Clone)]
pub struct TestKey {
    pub priv_key: PrivKey,
    pub pub_key: PubKey,
    pub address: Addr,
}

impl TestKey {
    pub fn from_seed(seed: &str) -> Self {
        let mut h = Hash::hash(seed.as_bytes());
        // NOTE: a digest is out of the curve order with negligible probability
        let priv_key = loop {
            match PrivKey::from_bytes(&h.to_fixed_bytes()) {
                Some(k) => break k,
                None => h = Hash::hash(h.as_bytes()),
            }
        };
        let pub_key = priv_key.pub_key();
        let address = pub_key.address();
        log::trace!("test key {} -> {}", seed, address);
        Self {
            priv_key,
            pub_key,
            address,
        }
    }

    #[inline(always)]
    pub fn sign(&self, msg: &[u8]) -> Vec<u8> {
        self.priv_key.sign(msg)
    }

    /// `0x`-prefixed address, as used in query paths.
    pub fn hex_address(&self) -> String {
        format!("0x{}", hex::encode(self.address.as_bytes()))
    }
}

#[test]
fn test_from_seed() {
    let a = TestKey::from_seed("alice");
    let b = TestKey::from_seed("alice");
    assert_eq!(a.address, b.address);
    assert_ne!(a.address, TestKey::from_seed("bob").address);
    let sig = a.sign(b"hello");
    assert!(a.pub_key.verify(b"hello", &sig));
}
