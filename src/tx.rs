//! Transaction envelope: a typed message wrapped by a chain/expiry layer and a multi-signature
//! layer, plus the canonical bytes each signer signs.

use rlp::{Rlp, RlpStream};
use rlp_derive::{RlpDecodable, RlpEncodable};

use crate::bank::{MsgIssue, MsgSend};
use crate::codec::MsgRegistry;
use crate::coin::Coins;
use crate::common::{Addr, Bytes};
use crate::crypto::PubKey;
use crate::error::{Error, Result};
use crate::slashing::MsgUnrevoke;
use crate::stake::{
    MsgBeginRedelegate, MsgBeginUnbonding, MsgCreateValidator, MsgDelegate,
    MsgEditValidator,
};

/// Behaviour shared by every message body.
pub trait MsgBody {
    /// Wire type tag, `<route>/<name>`.
    fn tag(&self) -> &'static str;
    /// Addresses that must sign, in signature order.
    fn signers(&self) -> Vec<Addr>;
    /// Stateless well-formedness checks.
    fn validate_basic(&self) -> Result<()>;
    /// Coins the message moves out of `addr`'s account, used by the ante stage to check the fee
    /// payer can cover fee and transfer together.
    fn outflow(&self, _addr: &Addr) -> Option<Coins> {
        Some(Coins::empty())
    }
    /// Checks of the message against the fee declared in its envelope.
    fn validate_fee(&self, _fee: &Coins) -> Result<()> {
        Ok(())
    }
    /// Whether the fee is part of the coins the message moves out, rather than charged on top.
    fn inputs_carry_fee(&self) -> bool {
        false
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Msg {
    Send(MsgSend),
    Issue(MsgIssue),
    CreateValidator(MsgCreateValidator),
    EditValidator(MsgEditValidator),
    Delegate(MsgDelegate),
    BeginUnbonding(MsgBeginUnbonding),
    BeginRedelegate(MsgBeginRedelegate),
    Unrevoke(MsgUnrevoke),
}

impl Msg {
    pub fn body(&self) -> &dyn MsgBody {
        match self {
            Msg::Send(m) => m,
            Msg::Issue(m) => m,
            Msg::CreateValidator(m) => m,
            Msg::EditValidator(m) => m,
            Msg::Delegate(m) => m,
            Msg::BeginUnbonding(m) => m,
            Msg::BeginRedelegate(m) => m,
            Msg::Unrevoke(m) => m,
        }
    }

    fn encode_body(&self) -> Vec<u8> {
        match self {
            Msg::Send(m) => rlp::encode(m),
            Msg::Issue(m) => rlp::encode(m),
            Msg::CreateValidator(m) => rlp::encode(m),
            Msg::EditValidator(m) => rlp::encode(m),
            Msg::Delegate(m) => rlp::encode(m),
            Msg::BeginUnbonding(m) => rlp::encode(m),
            Msg::BeginRedelegate(m) => rlp::encode(m),
            Msg::Unrevoke(m) => rlp::encode(m),
        }
        .to_vec()
    }

    #[inline(always)]
    pub fn type_tag(&self) -> &'static str {
        self.body().tag()
    }

    /// Router name: the part of the tag before `/`.
    pub fn route(&self) -> &'static str {
        let tag = self.type_tag();
        match tag.find('/') {
            Some(i) => &tag[..i],
            None => tag,
        }
    }

    #[inline(always)]
    pub fn signers(&self) -> Vec<Addr> {
        self.body().signers()
    }

    #[inline(always)]
    pub fn validate_basic(&self) -> Result<()> {
        self.body().validate_basic()
    }

    #[inline(always)]
    pub fn outflow(&self, addr: &Addr) -> Option<Coins> {
        self.body().outflow(addr)
    }

    #[inline(always)]
    pub fn inputs_carry_fee(&self) -> bool {
        self.body().inputs_carry_fee()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, RlpEncodable, RlpDecodable)]
pub struct Fee {
    pub amount: Coins,
    /// Gas limit; zero means unlimited.
    pub gas: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StdSignature {
    /// Only required on the first transaction of an account.
    pub pub_key: Option<PubKey>,
    pub signature: Bytes,
    pub sequence: u64,
}

impl rlp::Encodable for StdSignature {
    fn rlp_append(&self, s: &mut RlpStream) {
        s.begin_list(3);
        match &self.pub_key {
            Some(pk) => s.append(pk),
            None => s.append_empty_data(),
        };
        s.append(&self.signature).append(&self.sequence);
    }
}

impl rlp::Decodable for StdSignature {
    fn decode(rlp: &Rlp) -> std::result::Result<Self, rlp::DecoderError> {
        if rlp.item_count()? != 3 {
            return Err(rlp::DecoderError::RlpIncorrectListLen)
        }
        let pk = rlp.at(0)?;
        let pub_key = if pk.is_empty() { None } else { Some(pk.as_val()?) };
        Ok(Self {
            pub_key,
            signature: rlp.val_at(1)?,
            sequence: rlp.val_at(2)?,
        })
    }
}

/// The standard transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StdTx {
    pub msg: Msg,
    pub fee: Option<Fee>,
    pub chain_id: String,
    /// Last height at which the tx is valid; zero means it never expires.
    pub expires_at: u64,
    pub signatures: Vec<StdSignature>,
}

fn append_fee(s: &mut RlpStream, fee: Option<&Fee>) {
    match fee {
        Some(f) => {
            s.begin_list(1).append(f);
        }
        None => {
            s.begin_list(0);
        }
    }
}

fn decode_fee(rlp: &Rlp) -> std::result::Result<Option<Fee>, rlp::DecoderError> {
    match rlp.item_count()? {
        0 => Ok(None),
        1 => Ok(Some(rlp.val_at(0)?)),
        _ => Err(rlp::DecoderError::RlpIncorrectListLen),
    }
}

/// Canonical bytes every signer of a tx signs: chain layer, sequences, fee and message.
pub fn sign_bytes(
    chain_id: &str, expires_at: u64, sequences: &[u64], fee: Option<&Fee>,
    msg: &Msg,
) -> Vec<u8> {
    let mut s = RlpStream::new_list(6);
    s.append(&chain_id.to_string()).append(&expires_at);
    s.append_list::<u64, u64>(sequences);
    append_fee(&mut s, fee);
    s.append(&msg.type_tag().to_string())
        .append(&Bytes::from(msg.encode_body()));
    s.out().to_vec()
}

impl StdTx {
    /// The declared fee coins, empty when there is no fee.
    pub fn fee_amount(&self) -> Coins {
        self.fee.as_ref().map(|f| f.amount.clone()).unwrap_or_default()
    }

    /// Stateless checks of the whole envelope: the message, then the fee against it.
    pub fn validate_basic(&self) -> Result<()> {
        self.msg.validate_basic()?;
        let fee = self.fee_amount();
        if !fee.is_valid() {
            return Err(Error::InvalidCoins(format!("invalid fee {}", fee)))
        }
        self.msg.body().validate_fee(&fee)
    }

    pub fn sign_bytes(&self) -> Vec<u8> {
        let seqs: Vec<u64> = self.signatures.iter().map(|s| s.sequence).collect();
        sign_bytes(
            &self.chain_id,
            self.expires_at,
            &seqs,
            self.fee.as_ref(),
            &self.msg,
        )
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut s = RlpStream::new_list(6);
        s.append(&self.msg.type_tag().to_string())
            .append(&Bytes::from(self.msg.encode_body()));
        append_fee(&mut s, self.fee.as_ref());
        s.append(&self.chain_id).append(&self.expires_at);
        s.append_list::<StdSignature, StdSignature>(&self.signatures);
        s.out().to_vec()
    }

    /// Decode wire bytes; the message body is resolved through `registry` by its tag.
    pub fn decode(bytes: &[u8], registry: &MsgRegistry) -> Result<StdTx> {
        let rlp = Rlp::new(bytes);
        if !rlp.is_list() || rlp.item_count()? != 6 {
            return Err(Error::TxDecode("malformed tx envelope".into()))
        }
        let tag: String = rlp.val_at(0)?;
        let body: Bytes = rlp.val_at(1)?;
        let msg = registry.decode(&tag, &body)?;
        Ok(StdTx {
            msg,
            fee: decode_fee(&rlp.at(2)?)?,
            chain_id: rlp.val_at(3)?,
            expires_at: rlp.val_at(4)?,
            signatures: rlp.list_at(5)?,
        })
    }
}
