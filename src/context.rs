//! Per-request execution context.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::coin::Coins;
use crate::common::Addr;

/// Block header as delivered by the consensus engine.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub chain_id: String,
    pub height: u64,
    /// Block time, unix seconds.
    pub time: u64,
    #[serde(default)]
    pub proposer: Option<Addr>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    /// Mempool admission against the ephemeral check state.
    Check,
    /// Block execution against the deliver state.
    Deliver,
}

/// Logger whose records are attributed to a module target.
#[derive(Clone, Debug)]
pub struct Logger {
    target: Arc<str>,
}

impl Logger {
    pub fn new(target: &str) -> Self {
        Self {
            target: target.into(),
        }
    }

    #[inline(always)]
    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn debug(&self, args: fmt::Arguments) {
        log::debug!(target: self.target(), "{}", args)
    }

    pub fn info(&self, args: fmt::Arguments) {
        log::info!(target: self.target(), "{}", args)
    }

    pub fn warn(&self, args: fmt::Arguments) {
        log::warn!(target: self.target(), "{}", args)
    }
}

type Extensions = HashMap<TypeId, Arc<dyn Any + Send + Sync>>;

/// An immutable value passed by value (cheap clones) through every stage of a request.
///
/// Derivation (`with_*`) returns a new context and leaves the parent untouched. Extension values
/// are keyed by their type and are cloned on every read, so a handler never holds a reference
/// into state that a sibling branch can observe.
#[derive(Clone)]
pub struct Context {
    header: Arc<Header>,
    mode: Mode,
    tx_bytes: Arc<[u8]>,
    fee: Arc<Coins>,
    logger: Logger,
    ext: Arc<Extensions>,
}

impl Context {
    pub fn new(header: Header, mode: Mode, tx_bytes: &[u8]) -> Self {
        Self {
            header: Arc::new(header),
            mode,
            tx_bytes: tx_bytes.into(),
            fee: Arc::new(Coins::empty()),
            logger: Logger::new("qsdk"),
            ext: Arc::new(HashMap::new()),
        }
    }

    #[inline(always)]
    pub fn header(&self) -> &Header {
        &self.header
    }

    #[inline(always)]
    pub fn block_height(&self) -> u64 {
        self.header.height
    }

    #[inline(always)]
    pub fn block_time(&self) -> u64 {
        self.header.time
    }

    #[inline(always)]
    pub fn chain_id(&self) -> &str {
        &self.header.chain_id
    }

    #[inline(always)]
    pub fn is_check_tx(&self) -> bool {
        self.mode == Mode::Check
    }

    #[inline(always)]
    pub fn mode(&self) -> Mode {
        self.mode
    }

    #[inline(always)]
    pub fn tx_bytes(&self) -> &[u8] {
        &self.tx_bytes
    }

    /// Fee the ante stage charged for the current tx.
    #[inline(always)]
    pub fn fee(&self) -> &Coins {
        &self.fee
    }

    #[inline(always)]
    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    pub fn with_header(&self, header: Header) -> Self {
        let mut c = self.clone();
        c.header = Arc::new(header);
        c
    }

    pub fn with_mode(&self, mode: Mode) -> Self {
        let mut c = self.clone();
        c.mode = mode;
        c
    }

    pub fn with_tx_bytes(&self, tx_bytes: &[u8]) -> Self {
        let mut c = self.clone();
        c.tx_bytes = tx_bytes.into();
        c
    }

    pub fn with_fee(&self, fee: Coins) -> Self {
        let mut c = self.clone();
        c.fee = Arc::new(fee);
        c
    }

    /// Derive a context whose logger targets `module`.
    pub fn with_module(&self, module: &str) -> Self {
        let mut c = self.clone();
        c.logger = Logger::new(module);
        c
    }

    pub fn with_value<T: Clone + Send + Sync + 'static>(&self, v: T) -> Self {
        let mut ext = (*self.ext).clone();
        ext.insert(TypeId::of::<T>(), Arc::new(v));
        let mut c = self.clone();
        c.ext = Arc::new(ext);
        c
    }

    /// A fresh copy of the extension value of type `T`, if set.
    pub fn value<T: Clone + Send + Sync + 'static>(&self) -> Option<T> {
        self.ext.get(&TypeId::of::<T>())?.downcast_ref::<T>().cloned()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("header", &self.header)
            .field("mode", &self.mode)
            .field("module", &self.logger.target())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Debug, PartialEq)]
    struct Memo(Vec<u8>);

    #[test]
    fn test_values_do_not_leak() {
        let header = Header {
            chain_id: "test".into(),
            height: 3,
            time: 100,
            proposer: None,
        };
        let root = Context::new(header, Mode::Deliver, b"tx");
        let a = root.with_value(Memo(vec![1]));
        let b = root.with_value(Memo(vec![2]));
        assert_eq!(root.value::<Memo>(), None);
        assert_eq!(a.value::<Memo>(), Some(Memo(vec![1])));
        assert_eq!(b.value::<Memo>(), Some(Memo(vec![2])));

        let mut m = a.value::<Memo>().unwrap();
        m.0.push(9);
        assert_eq!(a.value::<Memo>(), Some(Memo(vec![1])));

        let m = a.with_module("qsdk::bank").with_mode(Mode::Check);
        assert!(m.is_check_tx());
        assert_eq!(m.logger().target(), "qsdk::bank");
        assert_eq!(m.block_height(), 3);
        assert_eq!(m.tx_bytes(), b"tx");
        assert!(!a.is_check_tx());

        let f = m.with_fee(Coins::single("mycoin", 1u64));
        assert_eq!(f.fee(), &Coins::single("mycoin", 1u64));
        assert!(m.fee().is_empty());
    }
}
