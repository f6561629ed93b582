//! Transaction authentication ahead of message dispatch.

use crate::auth::account::Account;
use crate::auth::mapper::{add_to_fee_pool, get_account, set_account};
use crate::context::Context;
use crate::error::{Error, Result};
use crate::params::Gas;
use crate::store::MultiStore;
use crate::tx::StdTx;

/// What the ante stage hands on to dispatch.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AnteOutcome {
    /// Gas limit declared by the fee; zero means unlimited.
    pub gas_wanted: Gas,
}

/// Authenticate `tx` against the accounts in `store` and, on success, charge the fee and advance
/// every signer's sequence by one. The first failing check aborts; the caller discards `store`
/// changes in that case.
///
/// Checks, in order: chain id and expiry, signer count, then per signer the account exists
/// (`UnknownAddress`), the sequence matches (`InvalidSequence`), the key is known or bound here
/// (`InvalidPubKey`) and the signature verifies (`Unauthorized`), and finally that the first
/// signer can pay fee plus outflow together (`InsufficientFunds`). For a message whose inputs
/// carry the fee, the fee charged here is the part of the first input the handler leaves alone.
pub fn ante_handler(
    ctx: &Context, store: &mut dyn MultiStore, tx: &StdTx,
) -> Result<AnteOutcome> {
    if tx.chain_id != ctx.chain_id() {
        return Err(Error::Unauthorized(format!(
            "wrong chain id: {} (expected {})",
            tx.chain_id,
            ctx.chain_id()
        )))
    }
    if tx.expires_at != 0 && ctx.block_height() > tx.expires_at {
        return Err(Error::Unauthorized(format!(
            "tx expired at height {}",
            tx.expires_at
        )))
    }
    let signers = tx.msg.signers();
    if signers.is_empty() {
        return Err(Error::Unauthorized("no signers".into()))
    }
    if signers.len() != tx.signatures.len() {
        return Err(Error::Unauthorized(format!(
            "expected {} signatures, got {}",
            signers.len(),
            tx.signatures.len()
        )))
    }

    let sign_bytes = tx.sign_bytes();
    let mut accounts = Vec::with_capacity(signers.len());
    for (addr, sig) in signers.iter().zip(tx.signatures.iter()) {
        let mut acc = get_account(store, addr).ok_or_else(|| {
            Error::UnknownAddress(format!("no account for {}", addr))
        })?;
        if sig.sequence != acc.sequence() {
            return Err(Error::InvalidSequence(format!(
                "{}: expected {}, got {}",
                addr,
                acc.sequence(),
                sig.sequence
            )))
        }
        let pk = match (acc.pub_key(), &sig.pub_key) {
            (Some(known), Some(given)) if known != given => {
                return Err(Error::InvalidPubKey(
                    "cannot override BaseAccount pubkey".into(),
                ))
            }
            (Some(known), _) => known.clone(),
            (None, Some(given)) => {
                if &given.address() != addr {
                    return Err(Error::InvalidPubKey(format!(
                        "pubkey does not belong to {}",
                        addr
                    )))
                }
                given.clone()
            }
            (None, None) => {
                return Err(Error::InvalidPubKey(format!(
                    "no pubkey on record or in signature for {}",
                    addr
                )))
            }
        };
        if !pk.verify(&sign_bytes, &sig.signature) {
            return Err(Error::Unauthorized(format!(
                "signature verification failed for {}",
                addr
            )))
        }
        if acc.pub_key().is_none() {
            acc.set_pub_key(pk)?;
        }
        accounts.push(acc);
    }

    let mut gas_wanted = 0;
    if let Some(fee) = &tx.fee {
        gas_wanted = fee.gas;
        if !fee.amount.is_empty() {
            if !fee.amount.is_valid() {
                return Err(Error::InvalidCoins(format!(
                    "invalid fee {}",
                    fee.amount
                )))
            }
            let payer = &mut accounts[0];
            let outflow = tx.msg.outflow(payer.address()).ok_or_else(|| {
                Error::InvalidCoins("transfer amount overflows".into())
            })?;
            // a transfer whose inputs carry the fee already names the full debit
            let needed = if tx.msg.inputs_carry_fee() {
                outflow
            } else {
                outflow.plus(&fee.amount).ok_or_else(|| {
                    Error::InvalidCoins("fee plus transfer overflows".into())
                })?
            };
            if !payer.coins().is_gte(&needed) {
                return Err(Error::InsufficientFunds(format!(
                    "{} < {}",
                    payer.coins(),
                    needed
                )))
            }
            let left = payer.coins().minus(&fee.amount).ok_or_else(|| {
                Error::InsufficientFunds(format!(
                    "{} < {}",
                    payer.coins(),
                    fee.amount
                ))
            })?;
            payer.set_coins(left);
            add_to_fee_pool(store, &fee.amount)?;
        }
    }

    for mut acc in accounts {
        acc.set_sequence(acc.sequence() + 1);
        set_account(store, &acc);
    }
    ctx.logger().debug(format_args!(
        "ante ok: {} signer(s), sequence advanced",
        signers.len()
    ));
    Ok(AnteOutcome { gas_wanted })
}
