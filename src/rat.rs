//! Exact non-negative rationals used for delegation shares, exchange rates and slash fractions.

use std::fmt;
use std::ops::{Add, Mul};
use std::str::FromStr;

use num_bigint::BigUint;
use num_integer::Integer;
use num_rational::Ratio;
use num_traits::{One, Zero};
use serde::{
    de::{self, Deserializer, Visitor},
    Deserialize, Serialize, Serializer,
};

use crate::common::{Amount, Bytes};

#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Rat(Ratio<BigUint>);

impl Rat {
    pub fn new(numer: u64, denom: u64) -> Self {
        assert!(denom != 0, "zero denominator");
        Self(Ratio::new(numer.into(), denom.into()))
    }

    pub fn zero() -> Self {
        Self(Ratio::zero())
    }

    pub fn one() -> Self {
        Self(Ratio::one())
    }

    pub fn from_amount(a: &Amount) -> Self {
        Self(Ratio::from_integer(BigUint::from_bytes_be(&a.to_big_endian())))
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn checked_sub(&self, other: &Rat) -> Option<Rat> {
        if other.0 > self.0 {
            return None
        }
        Some(Self(&self.0 - &other.0))
    }

    pub fn checked_div(&self, other: &Rat) -> Option<Rat> {
        if other.is_zero() {
            return None
        }
        Some(Self(&self.0 / &other.0))
    }

    pub fn floor(&self) -> BigUint {
        self.0.numer().div_floor(self.0.denom())
    }

    /// Integer part as an [Amount]; `None` if it does not fit.
    pub fn floor_amount(&self) -> Option<Amount> {
        let bytes = self.floor().to_bytes_be();
        if bytes.len() > 32 {
            return None
        }
        Some(Amount::from_big_endian(&bytes))
    }

    /// True iff the value lies in `[0, 1]`.
    pub fn is_fraction(&self) -> bool {
        self.0 <= Ratio::one()
    }
}

impl<'a> Add<&'a Rat> for &'a Rat {
    type Output = Rat;
    fn add(self, other: &Rat) -> Rat {
        Rat(&self.0 + &other.0)
    }
}

impl<'a> Mul<&'a Rat> for &'a Rat {
    type Output = Rat;
    fn mul(self, other: &Rat) -> Rat {
        Rat(&self.0 * &other.0)
    }
}

impl fmt::Display for Rat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.denom().is_one() {
            write!(f, "{}", self.0.numer())
        } else {
            write!(f, "{}/{}", self.0.numer(), self.0.denom())
        }
    }
}

impl FromStr for Rat {
    type Err = ();
    /// Accepts `n`, `n/d` or a decimal `i.f`.
    fn from_str(s: &str) -> Result<Self, ()> {
        let parse = |x: &str| BigUint::from_str(x).map_err(|_| ());
        if let Some((n, d)) = s.split_once('/') {
            let d = parse(d)?;
            if d.is_zero() {
                return Err(())
            }
            return Ok(Self(Ratio::new(parse(n)?, d)))
        }
        if let Some((i, frac)) = s.split_once('.') {
            let scale = BigUint::from(10u32).pow(frac.len() as u32);
            let numer = parse(i)? * &scale + parse(frac)?;
            return Ok(Self(Ratio::new(numer, scale)))
        }
        Ok(Self(Ratio::from_integer(parse(s)?)))
    }
}

impl Serialize for Rat {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

struct RatVisitor;

impl<'de> Visitor<'de> for RatVisitor {
    type Value = Rat;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a rational as `n`, `n/d` or a decimal string")
    }

    fn visit_u64<E>(self, value: u64) -> Result<Rat, E>
    where
        E: de::Error,
    {
        Ok(Rat::new(value, 1))
    }

    fn visit_str<E>(self, value: &str) -> Result<Rat, E>
    where
        E: de::Error,
    {
        Rat::from_str(value).map_err(|_| {
            de::Error::invalid_value(de::Unexpected::Str(value), &self)
        })
    }
}

impl<'de> Deserialize<'de> for Rat {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(RatVisitor)
    }
}

impl rlp::Encodable for Rat {
    fn rlp_append(&self, s: &mut rlp::RlpStream) {
        s.begin_list(2)
            .append(&Bytes::from(self.0.numer().to_bytes_be()))
            .append(&Bytes::from(self.0.denom().to_bytes_be()));
    }
}

impl rlp::Decodable for Rat {
    fn decode(rlp: &rlp::Rlp) -> Result<Self, rlp::DecoderError> {
        let numer: Bytes = rlp.val_at(0)?;
        let denom = BigUint::from_bytes_be(&rlp.val_at::<Bytes>(1)?);
        if denom.is_zero() {
            return Err(rlp::DecoderError::Custom("zero denominator"))
        }
        Ok(Self(Ratio::new(BigUint::from_bytes_be(&numer), denom)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        assert_eq!(Rat::from_str("1/2").unwrap(), Rat::new(1, 2));
        assert_eq!(Rat::from_str("0.05").unwrap(), Rat::new(1, 20));
        assert_eq!(Rat::from_str("3").unwrap(), Rat::new(3, 1));
        assert!(Rat::from_str("1/0").is_err());
    }

    #[test]
    fn test_arith() {
        let a = Rat::new(3, 4);
        let b = Rat::new(1, 4);
        assert_eq!(&a + &b, Rat::one());
        assert_eq!(a.checked_sub(&b).unwrap(), Rat::new(1, 2));
        assert!(b.checked_sub(&a).is_none());
        assert_eq!((&a * &Rat::new(4, 1)).floor_amount(), Some(3.into()));
        assert_eq!(Rat::new(7, 2).floor_amount(), Some(3.into()));
        assert!(a.checked_div(&Rat::zero()).is_none());
    }

    #[test]
    fn test_rlp() {
        let r = Rat::new(10, 3);
        let back: Rat = rlp::decode(&rlp::encode(&r)).unwrap();
        assert_eq!(back, r);
    }
}
