use std::collections::BTreeSet;

use rlp_derive::{RlpDecodable, RlpEncodable};
use serde::{Deserialize, Serialize};

use crate::coin::Coins;
use crate::common::Addr;
use crate::error::{Error, Result, CODESPACE_BANK};
use crate::tx::MsgBody;

pub const TAG_SEND: &str = "bank/send";
pub const TAG_ISSUE: &str = "bank/issue";

pub const CODE_INVALID_INPUT: u16 = 101;
pub const CODE_INVALID_OUTPUT: u16 = 102;
pub const CODE_NOT_ISSUER: u16 = 103;

#[derive(
    Clone, Debug, PartialEq, Eq, RlpEncodable, RlpDecodable, Serialize,
    Deserialize,
)]
pub struct Input {
    pub address: Addr,
    pub coins: Coins,
}

impl Input {
    pub fn new(address: Addr, coins: Coins) -> Self {
        Self { address, coins }
    }
}

#[derive(
    Clone, Debug, PartialEq, Eq, RlpEncodable, RlpDecodable, Serialize,
    Deserialize,
)]
pub struct Output {
    pub address: Addr,
    pub coins: Coins,
}

impl Output {
    pub fn new(address: Addr, coins: Coins) -> Self {
        Self { address, coins }
    }
}

fn check_entry(addr: &Addr, coins: &Coins, seen: &mut BTreeSet<Addr>) -> Result<()> {
    if addr.is_zero() {
        return Err(Error::InvalidAddress("empty address".into()))
    }
    if !seen.insert(*addr) {
        return Err(Error::InvalidAddress(format!("{} listed twice", addr)))
    }
    if coins.is_empty() || !coins.is_valid() {
        return Err(Error::InvalidCoins(format!("{} for {}", coins, addr)))
    }
    Ok(())
}

fn validate_outputs(outputs: &[Output]) -> Result<Coins> {
    if outputs.is_empty() {
        return Err(Error::module(
            CODESPACE_BANK,
            CODE_INVALID_OUTPUT,
            "no outputs".into(),
        ))
    }
    let mut seen = BTreeSet::new();
    let mut total = Coins::empty();
    for o in outputs {
        check_entry(&o.address, &o.coins, &mut seen)?;
        total = total
            .plus(&o.coins)
            .ok_or_else(|| Error::InvalidCoins("output total overflows".into()))?;
    }
    Ok(total)
}

/// Multi-input, multi-output transfer. Every input address signs.
#[derive(Clone, Debug, PartialEq, Eq, RlpEncodable, RlpDecodable)]
pub struct MsgSend {
    pub inputs: Vec<Input>,
    pub outputs: Vec<Output>,
}

impl MsgSend {
    pub fn new(inputs: Vec<Input>, outputs: Vec<Output>) -> Self {
        Self { inputs, outputs }
    }

    fn total_in(&self) -> Result<Coins> {
        let mut total = Coins::empty();
        for i in &self.inputs {
            total = total.plus(&i.coins).ok_or_else(|| {
                Error::InvalidCoins("input total overflows".into())
            })?;
        }
        Ok(total)
    }
}

impl MsgBody for MsgSend {
    fn tag(&self) -> &'static str {
        TAG_SEND
    }

    fn signers(&self) -> Vec<Addr> {
        self.inputs.iter().map(|i| i.address).collect()
    }

    fn validate_basic(&self) -> Result<()> {
        if self.inputs.is_empty() {
            return Err(Error::module(
                CODESPACE_BANK,
                CODE_INVALID_INPUT,
                "no inputs".into(),
            ))
        }
        let mut seen = BTreeSet::new();
        for i in &self.inputs {
            check_entry(&i.address, &i.coins, &mut seen)?;
        }
        self.total_in()?;
        validate_outputs(&self.outputs)?;
        Ok(())
    }

    /// Per denom, inputs must equal outputs plus the fee, and the fee comes out of the first
    /// input (its signer pays it).
    fn validate_fee(&self, fee: &Coins) -> Result<()> {
        let total_in = self.total_in()?;
        let total_out = validate_outputs(&self.outputs)?;
        let expected = total_out.plus(fee).ok_or_else(|| {
            Error::InvalidCoins("outputs plus fee overflow".into())
        })?;
        if total_in != expected {
            return Err(Error::InvalidCoins(format!(
                "inputs {} don't match outputs {} plus fee {}",
                total_in, total_out, fee
            )))
        }
        match self.inputs.first() {
            Some(first) if first.coins.is_gte(fee) => Ok(()),
            _ => Err(Error::InvalidCoins(format!(
                "fee {} is not covered by the first input",
                fee
            ))),
        }
    }

    fn inputs_carry_fee(&self) -> bool {
        true
    }

    fn outflow(&self, addr: &Addr) -> Option<Coins> {
        let mut out = Coins::empty();
        for i in self.inputs.iter().filter(|i| &i.address == addr) {
            out = out.plus(&i.coins)?;
        }
        Some(out)
    }
}

/// Mint new coins to `outputs`; `issuer` must be a registered issuer.
#[derive(Clone, Debug, PartialEq, Eq, RlpEncodable, RlpDecodable)]
pub struct MsgIssue {
    pub issuer: Addr,
    pub outputs: Vec<Output>,
}

impl MsgBody for MsgIssue {
    fn tag(&self) -> &'static str {
        TAG_ISSUE
    }

    fn signers(&self) -> Vec<Addr> {
        vec![self.issuer]
    }

    fn validate_basic(&self) -> Result<()> {
        if self.issuer.is_zero() {
            return Err(Error::InvalidAddress("empty issuer".into()))
        }
        validate_outputs(&self.outputs).map(|_| ())
    }
}
