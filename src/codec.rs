//! Type-tag registry for polymorphic messages, and typed load/save helpers over raw stores.

use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::store::{KVStore, KVStoreR};
use crate::tx::Msg;

pub type MsgDecoder = fn(&[u8]) -> std::result::Result<Msg, rlp::DecoderError>;

/// Maps each message type tag to its decoder. Built once by the application; every instance owns
/// its own table.
#[derive(Clone, Default)]
pub struct MsgRegistry {
    decoders: BTreeMap<&'static str, MsgDecoder>,
}

impl MsgRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tag: &'static str, dec: MsgDecoder) -> Result<()> {
        if self.decoders.insert(tag, dec).is_some() {
            return Err(Error::Configuration(format!(
                "message type {} registered twice",
                tag
            )))
        }
        Ok(())
    }

    pub fn decode(&self, tag: &str, body: &[u8]) -> Result<Msg> {
        let dec = self.decoders.get(tag).ok_or_else(|| {
            Error::TxDecode(format!("unknown message type {}", tag))
        })?;
        let msg = dec(body)?;
        if msg.type_tag() != tag {
            return Err(Error::TxDecode(format!(
                "decoder for {} produced {}",
                tag,
                msg.type_tag()
            )))
        }
        Ok(msg)
    }
}

/// Read and decode a record this crate persisted.
///
/// Aborts (panics) when the bytes under `key` do not decode, i.e. the store is corrupt.
pub fn load<T, S>(store: &S, key: &[u8]) -> Option<T>
where
    T: rlp::Decodable,
    S: KVStoreR + ?Sized,
{
    let raw = store.get(key)?;
    Some(decode_stored(key, &raw))
}

/// Decode a stored value; see [load] for the abort condition.
pub fn decode_stored<T: rlp::Decodable>(key: &[u8], raw: &[u8]) -> T {
    match rlp::decode(raw) {
        Ok(v) => v,
        Err(e) => panic!("corrupt record under key {}: {}", hex::encode(key), e),
    }
}

#[inline]
pub fn save<T, S>(store: &mut S, key: &[u8], v: &T)
where
    T: rlp::Encodable,
    S: KVStore + ?Sized,
{
    store.set(key, rlp::encode(v).to_vec())
}
