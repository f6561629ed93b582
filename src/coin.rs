//! Denominated amounts and the sorted multi-denomination collection [Coins].
//!
//! A valid [Coins] value is sorted by denom, has no duplicate denom and never holds a zero entry.
//! Arithmetic treats an absent denom as zero. `plus` fails on overflow and `minus` fails when any
//! denom would go negative; neither clamps.

use std::cmp::Ordering;
use std::fmt;

use rlp_derive::{RlpDecodable, RlpEncodable};
use serde::{Deserialize, Deserializer, Serialize};

use crate::common::Amount;

#[derive(
    Clone, PartialEq, Eq, Debug, RlpEncodable, RlpDecodable, Serialize,
    Deserialize,
)]
pub struct Coin {
    pub denom: String,
    pub amount: Amount,
}

impl Coin {
    pub fn new<A: Into<Amount>>(denom: &str, amount: A) -> Self {
        Self {
            denom: denom.to_string(),
            amount: amount.into(),
        }
    }

    fn valid_denom(denom: &str) -> bool {
        !denom.is_empty() &&
            denom.len() <= 64 &&
            denom.bytes().all(|b| b.is_ascii_alphanumeric())
    }
}

impl fmt::Display for Coin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.amount, self.denom)
    }
}

#[derive(Clone, PartialEq, Eq, Default, Debug, Serialize)]
#[serde(transparent)]
pub struct Coins(Vec<Coin>);

impl Coins {
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    /// Build a collection from coins in any order. Entries are sorted by denom; duplicates and
    /// zero amounts are kept so that [Coins::is_valid] can reject them.
    pub fn from_unsorted(mut coins: Vec<Coin>) -> Self {
        coins.sort_by(|a, b| a.denom.cmp(&b.denom));
        Self(coins)
    }

    pub fn single<A: Into<Amount>>(denom: &str, amount: A) -> Self {
        Self::from_unsorted(vec![Coin::new(denom, amount)])
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Coin> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Sorted by denom, no duplicates, every amount positive.
    pub fn is_valid(&self) -> bool {
        for (i, c) in self.0.iter().enumerate() {
            if !Coin::valid_denom(&c.denom) || c.amount.is_zero() {
                return false
            }
            if i > 0 && self.0[i - 1].denom >= c.denom {
                return false
            }
        }
        true
    }

    pub fn amount_of(&self, denom: &str) -> &Amount {
        match self.0.binary_search_by(|c| c.denom.as_str().cmp(denom)) {
            Ok(i) => &self.0[i].amount,
            Err(_) => Amount::zero(),
        }
    }

    /// Denom-wise sum. `None` when any denom overflows.
    pub fn plus(&self, other: &Coins) -> Option<Coins> {
        self.merge(other, |a, b| a.checked_add(b))
    }

    /// Denom-wise difference. `None` when any denom would become negative.
    pub fn minus(&self, other: &Coins) -> Option<Coins> {
        self.merge(other, |a, b| a.checked_sub(b))
    }

    /// True iff for every denom in `other`, `self` holds at least as much.
    pub fn is_gte(&self, other: &Coins) -> bool {
        other.iter().all(|c| self.amount_of(&c.denom) >= &c.amount)
    }

    fn merge<F>(&self, other: &Coins, op: F) -> Option<Coins>
    where
        F: Fn(&Amount, &Amount) -> Option<Amount>,
    {
        let (mut i, mut j) = (0, 0);
        let (a, b) = (&self.0, &other.0);
        let mut out = Vec::with_capacity(a.len() + b.len());
        let zero = Amount::zero();
        loop {
            let (denom, amount) = match (a.get(i), b.get(j)) {
                (None, None) => break,
                (Some(x), None) => {
                    i += 1;
                    (&x.denom, op(&x.amount, zero)?)
                }
                (None, Some(y)) => {
                    j += 1;
                    (&y.denom, op(zero, &y.amount)?)
                }
                (Some(x), Some(y)) => match x.denom.cmp(&y.denom) {
                    Ordering::Less => {
                        i += 1;
                        (&x.denom, op(&x.amount, zero)?)
                    }
                    Ordering::Greater => {
                        j += 1;
                        (&y.denom, op(zero, &y.amount)?)
                    }
                    Ordering::Equal => {
                        i += 1;
                        j += 1;
                        (&x.denom, op(&x.amount, &y.amount)?)
                    }
                },
            };
            // zero-amount denoms are pruned
            if !amount.is_zero() {
                out.push(Coin {
                    denom: denom.clone(),
                    amount,
                });
            }
        }
        Some(Coins(out))
    }
}

impl From<Vec<Coin>> for Coins {
    fn from(coins: Vec<Coin>) -> Self {
        Self::from_unsorted(coins)
    }
}

impl<'a> IntoIterator for &'a Coins {
    type Item = &'a Coin;
    type IntoIter = std::slice::Iter<'a, Coin>;
    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Display for Coins {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s: Vec<_> = self.0.iter().map(|c| c.to_string()).collect();
        write!(f, "{}", s.join(","))
    }
}

impl<'de> Deserialize<'de> for Coins {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Coins::from_unsorted(Vec::<Coin>::deserialize(deserializer)?))
    }
}

impl rlp::Encodable for Coins {
    fn rlp_append(&self, s: &mut rlp::RlpStream) {
        s.append_list::<Coin, Coin>(&self.0);
    }
}

impl rlp::Decodable for Coins {
    fn decode(rlp: &rlp::Rlp) -> Result<Self, rlp::DecoderError> {
        Ok(Coins(rlp.as_list()?))
    }
}
