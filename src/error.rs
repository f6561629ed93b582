//! Error taxonomy shared by every stage of transaction processing.
//!
//! Each error maps to a `(codespace, code)` pair. The consensus-visible code packs both into one
//! `u32` so that modules can define their own codes without clashing with the root ones.

use thiserror::Error;

pub type CodeType = u16;
pub type Codespace = u16;

pub const CODESPACE_ROOT: Codespace = 1;
pub const CODESPACE_BANK: Codespace = 2;
pub const CODESPACE_STAKE: Codespace = 4;
pub const CODESPACE_SLASHING: Codespace = 10;

pub const CODE_OK: CodeType = 0;
pub const CODE_INTERNAL: CodeType = 1;
pub const CODE_TX_DECODE: CodeType = 2;
pub const CODE_INVALID_SEQUENCE: CodeType = 3;
pub const CODE_UNAUTHORIZED: CodeType = 4;
pub const CODE_INSUFFICIENT_FUNDS: CodeType = 5;
pub const CODE_UNKNOWN_REQUEST: CodeType = 6;
pub const CODE_INVALID_ADDRESS: CodeType = 7;
pub const CODE_INVALID_PUB_KEY: CodeType = 8;
pub const CODE_UNKNOWN_ADDRESS: CodeType = 9;
pub const CODE_INSUFFICIENT_COINS: CodeType = 10;
pub const CODE_INVALID_COINS: CodeType = 11;
pub const CODE_OUT_OF_GAS: CodeType = 12;
pub const CODE_CONFIGURATION: CodeType = 13;
pub const CODE_GENESIS_PARSE: CodeType = 14;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("internal error: {0}")]
    Internal(String),

    #[error("tx parse error: {0}")]
    TxDecode(String),

    #[error("invalid sequence: {0}")]
    InvalidSequence(String),

    /// Bad or missing signature, expired tx or wrong chain.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Fee payer cannot cover fee plus transferred amount (ante stage).
    #[error("insufficient funds: {0}")]
    InsufficientFunds(String),

    #[error("unknown request: {0}")]
    UnknownRequest(String),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("invalid pubkey: {0}")]
    InvalidPubKey(String),

    #[error("unknown address: {0}")]
    UnknownAddress(String),

    /// Module-level balance insufficiency.
    #[error("insufficient coins: {0}")]
    InsufficientCoins(String),

    #[error("invalid coins: {0}")]
    InvalidCoins(String),

    #[error("out of gas: {0}")]
    OutOfGas(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("genesis parse error: {0}")]
    GenesisParse(String),

    /// A code owned by a module codespace.
    #[error("{msg}")]
    Module {
        codespace: Codespace,
        code: CodeType,
        msg: String,
    },
}

/// Pack a codespace and a code into the consensus-visible result code.
#[inline]
pub fn to_abci_code(space: Codespace, code: CodeType) -> u32 {
    if space == CODESPACE_ROOT && code == CODE_OK {
        return 0
    }
    ((space as u32) << 16) | code as u32
}

impl Error {
    pub fn codespace(&self) -> Codespace {
        match self {
            Error::Module { codespace, .. } => *codespace,
            _ => CODESPACE_ROOT,
        }
    }

    pub fn code(&self) -> CodeType {
        match self {
            Error::Internal(_) => CODE_INTERNAL,
            Error::TxDecode(_) => CODE_TX_DECODE,
            Error::InvalidSequence(_) => CODE_INVALID_SEQUENCE,
            Error::Unauthorized(_) => CODE_UNAUTHORIZED,
            Error::InsufficientFunds(_) => CODE_INSUFFICIENT_FUNDS,
            Error::UnknownRequest(_) => CODE_UNKNOWN_REQUEST,
            Error::InvalidAddress(_) => CODE_INVALID_ADDRESS,
            Error::InvalidPubKey(_) => CODE_INVALID_PUB_KEY,
            Error::UnknownAddress(_) => CODE_UNKNOWN_ADDRESS,
            Error::InsufficientCoins(_) => CODE_INSUFFICIENT_COINS,
            Error::InvalidCoins(_) => CODE_INVALID_COINS,
            Error::OutOfGas(_) => CODE_OUT_OF_GAS,
            Error::Configuration(_) => CODE_CONFIGURATION,
            Error::GenesisParse(_) => CODE_GENESIS_PARSE,
            Error::Module { code, .. } => *code,
        }
    }

    #[inline]
    pub fn abci_code(&self) -> u32 {
        to_abci_code(self.codespace(), self.code())
    }

    /// The `(code, log)` pair returned to the consensus engine.
    pub fn result(&self) -> (u32, String) {
        let log = format!(
            "=== ABCI Log ===\nCodespace: {}\nCode:      {}\nABCICode:  {}\nError:     {}\n=== /ABCI Log ===\n",
            self.codespace(),
            self.code(),
            self.abci_code(),
            self
        );
        (self.abci_code(), log)
    }

    pub fn module(codespace: Codespace, code: CodeType, msg: String) -> Self {
        Error::Module {
            codespace,
            code,
            msg,
        }
    }
}

impl From<rlp::DecoderError> for Error {
    fn from(e: rlp::DecoderError) -> Self {
        Error::TxDecode(e.to_string())
    }
}

#[test]
fn test_abci_code() {
    assert_eq!(to_abci_code(CODESPACE_ROOT, CODE_OK), 0);
    let e = Error::InsufficientCoins("2mycoin < 5mycoin".into());
    assert_eq!(e.abci_code(), (1 << 16) | 10);
    let e = Error::module(CODESPACE_STAKE, 101, "no validator".into());
    assert_eq!(e.abci_code(), (4 << 16) | 101);
    let (code, log) = e.result();
    assert_eq!(code, e.abci_code());
    assert!(log.contains("no validator"));
    assert!(log.contains("Codespace: 4"));
}
