//! [`Money`]-related definitions.

use std::{fmt, str::FromStr};

use rust_decimal::{prelude::ToPrimitive as _, Decimal};

use crate::define_kind;

/// Amount of money in some [`Currency`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Money {
    /// Amount of this [`Money`].
    pub amount: Decimal,

    /// [`Currency`] of this amount.
    pub currency: Currency,
}

impl Money {
    /// Creates a new zero [`Money`] amount in the provided [`Currency`].
    #[must_use]
    pub const fn zero(currency: Currency) -> Self {
        Self {
            amount: Decimal::ZERO,
            currency,
        }
    }

    /// Indicates whether this [`Money`] amount is zero.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.amount.is_zero()
    }

    /// Indicates whether this [`Money`] amount is strictly positive.
    #[must_use]
    pub fn is_positive(&self) -> bool {
        self.amount > Decimal::ZERO
    }

    /// Adds the provided [`Money`] to this one.
    ///
    /// [`None`] is returned on a [`Currency`] mismatch.
    #[must_use]
    pub fn checked_add(self, rhs: Self) -> Option<Self> {
        (self.currency == rhs.currency).then(|| Self {
            amount: self.amount + rhs.amount,
            currency: self.currency,
        })
    }

    /// Subtracts the provided [`Money`] from this one, clamping the result at
    /// zero.
    ///
    /// [`None`] is returned on a [`Currency`] mismatch.
    #[must_use]
    pub fn saturating_sub(self, rhs: Self) -> Option<Self> {
        (self.currency == rhs.currency).then(|| Self {
            amount: (self.amount - rhs.amount).max(Decimal::ZERO),
            currency: self.currency,
        })
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self { amount, currency } = self;
        if amount.is_integer() {
            write!(f, "{}{currency}", amount.to_i128().expect("integer"))
        } else {
            write!(f, "{amount}{currency}")
        }
    }
}

impl FromStr for Money {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() < 4 {
            return Err("too short");
        }

        let (amount, currency) = s.split_at(s.len() - 3);
        let amount = Decimal::from_str(amount).map_err(|_| "invalid amount")?;
        let currency =
            Currency::from_str(currency).map_err(|_| "invalid currency")?;

        Ok(Self { amount, currency })
    }
}

define_kind! {
    #[doc = "Currency of a [`Money`] amount."]
    enum Currency {
        #[doc = "Nigerian Naira."]
        Ngn = 1,

        #[doc = "US Dollar."]
        Usd = 2,

        #[doc = "Euro."]
        Eur = 3,
    }
}

#[cfg(feature = "serde")]
mod serde_impl {
    //! Module providing integration with [`serde`] crate.
    //!
    //! [`Money`] is represented as a `{major}.{minor}{currency}` string,
    //! where:
    //! - `major` is an integer;
    //! - `minor` is an optional integer;
    //! - `currency` is a three-letter currency code.

    use std::str::FromStr as _;

    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

    use super::Money;

    impl serde::Serialize for Money {
        fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            serializer.serialize_str(&self.to_string())
        }
    }

    impl<'de> Deserialize<'de> for Money {
        fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
        where
            D: Deserializer<'de>,
        {
            let s = String::deserialize(deserializer)?;
            Self::from_str(&s).map_err(|e| {
                D::Error::custom(format!("cannot parse `Money`: {e}"))
            })
        }
    }
}

#[cfg(test)]
mod spec {
    use std::str::FromStr as _;

    use rust_decimal::Decimal;

    use super::{Currency, Money};

    fn decimal(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn ngn(s: &str) -> Money {
        Money {
            amount: decimal(s),
            currency: Currency::Ngn,
        }
    }

    #[test]
    fn from_str() {
        assert_eq!(
            Money::from_str("123.45NGN").unwrap(),
            Money {
                amount: decimal("123.45"),
                currency: Currency::Ngn,
            },
        );

        assert_eq!(
            Money::from_str("123.45USD").unwrap(),
            Money {
                amount: decimal("123.45"),
                currency: Currency::Usd,
            },
        );

        assert_eq!(
            Money::from_str("123.45EUR").unwrap(),
            Money {
                amount: decimal("123.45"),
                currency: Currency::Eur,
            },
        );

        assert!(Money::from_str("123.45").is_err());
        assert!(Money::from_str("123.45Ng").is_err());
        assert!(Money::from_str("123.45Nigerian").is_err());

        assert!(Money::from_str("123.00NGN").is_ok());
        assert!(Money::from_str("123.0NGN").is_ok());
        assert!(Money::from_str("123NGN").is_ok());
    }

    #[test]
    fn to_string() {
        assert_eq!(ngn("123.45").to_string(), "123.45NGN");
        assert_eq!(
            Money {
                amount: decimal("123.45"),
                currency: Currency::Usd,
            }
            .to_string(),
            "123.45USD",
        );

        assert_eq!(ngn("123.00").to_string(), "123NGN");
        assert_eq!(ngn("123.0").to_string(), "123NGN");
        assert_eq!(ngn("123").to_string(), "123NGN");
    }

    #[test]
    fn checked_add() {
        assert_eq!(
            ngn("100").checked_add(ngn("23.45")).unwrap(),
            ngn("123.45"),
        );
        assert_eq!(
            ngn("100").checked_add(Money {
                amount: decimal("1"),
                currency: Currency::Usd,
            }),
            None,
        );
    }

    #[test]
    fn saturating_sub_clamps_at_zero() {
        assert_eq!(ngn("100").saturating_sub(ngn("40")).unwrap(), ngn("60"));
        assert_eq!(ngn("100").saturating_sub(ngn("100")).unwrap(), ngn("0"));
        assert_eq!(ngn("100").saturating_sub(ngn("500")).unwrap(), ngn("0"));
        assert_eq!(
            ngn("100").saturating_sub(Money {
                amount: decimal("1"),
                currency: Currency::Eur,
            }),
            None,
        );
    }
}
