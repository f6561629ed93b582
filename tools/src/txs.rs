use qsdk::bank::{Input, MsgSend, Output};
use qsdk::coin::Coins;
use qsdk::common::{Addr, Bytes};
use qsdk::tx::{sign_bytes, Fee, Msg, StdSignature, StdTx};

use crate::keys::TestKey;

/// One-input, one-output transfer.
pub fn send_msg(from: &Addr, to: &Addr, coins: Coins) -> Msg {
    Msg::Send(MsgSend::new(
        vec![Input::new(*from, coins.clone())],
        vec![Output::new(*to, coins)],
    ))
}

/// One-input, one-output transfer whose input also carries `fee`.
pub fn send_msg_with_fee(from: &Addr, to: &Addr, coins: Coins, fee: &Coins) -> Msg {
    let input = coins.plus(fee).expect("input overflows");
    Msg::Send(MsgSend::new(
        vec![Input::new(*from, input)],
        vec![Output::new(*to, coins)],
    ))
}

pub struct TxBuilder {
    chain_id: String,
    msg: Msg,
    fee: Option<Fee>,
    expires_at: u64,
}

impl TxBuilder {
    pub fn new(chain_id: &str, msg: Msg) -> Self {
        Self {
            chain_id: chain_id.into(),
            msg,
            fee: None,
            expires_at: 0,
        }
    }

    pub fn fee(mut self, amount: Coins, gas: u64) -> Self {
        self.fee = Some(Fee { amount, gas });
        self
    }

    pub fn expires_at(mut self, height: u64) -> Self {
        self.expires_at = height;
        self
    }

    /// Sign with `(key, sequence)` pairs given in the message's signer order. Every signature
    /// carries its public key.
    pub fn sign(self, signers: &[(&TestKey, u64)]) -> StdTx {
        let seqs: Vec<u64> = signers.iter().map(|(_, s)| *s).collect();
        let bytes = sign_bytes(
            &self.chain_id,
            self.expires_at,
            &seqs,
            self.fee.as_ref(),
            &self.msg,
        );
        let signatures = signers
            .iter()
            .map(|(k, seq)| StdSignature {
                pub_key: Some(k.pub_key.clone()),
                signature: Bytes::from(k.sign(&bytes)),
                sequence: *seq,
            })
            .collect();
        StdTx {
            msg: self.msg,
            fee: self.fee,
            chain_id: self.chain_id,
            expires_at: self.expires_at,
            signatures,
        }
    }

    /// Same as [Self::sign], straight to wire bytes.
    pub fn sign_encoded(self, signers: &[(&TestKey, u64)]) -> Vec<u8> {
        self.sign(signers).encode()
    }
}
