//! Fixed-point money tagged with an ISO-4217 currency.
//!
//! Amounts are integer counts of the currency's minor unit (cents for USD),
//! never binary floating point. Per-unit costs carry
//! [`UNIT_COST_EXTRA_DIGITS`] additional digits so that weighted averages such
//! as `350.00 / 150 = 2.3333…` are not truncated to the cent before they are
//! multiplied back by a stock quantity.
//!
//! Every division rounds exactly once, half-to-even (banker's rounding).

use core::fmt;
use core::str::FromStr;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::value_object::ValueObject;

/// Digits of precision a [`UnitCost`] carries beyond the currency minor unit.
pub const UNIT_COST_EXTRA_DIGITS: u32 = 4;

const UNIT_COST_FACTOR: i128 = 10_000;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MoneyError {
    #[error("currency mismatch: {left} vs {right}")]
    CurrencyMismatch { left: Currency, right: Currency },

    #[error("monetary overflow")]
    Overflow,

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("invalid currency code: {0}")]
    InvalidCurrency(String),
}

/// ISO-4217 currency code.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Currency {
    code: [u8; 3],
}

impl Currency {
    pub const USD: Currency = Currency { code: *b"USD" };
    pub const EUR: Currency = Currency { code: *b"EUR" };
    pub const PEN: Currency = Currency { code: *b"PEN" };
    pub const JPY: Currency = Currency { code: *b"JPY" };

    /// Parse a three-letter uppercase code.
    pub fn new(code: &str) -> Result<Self, MoneyError> {
        let bytes = code.as_bytes();
        if bytes.len() != 3 || !bytes.iter().all(u8::is_ascii_uppercase) {
            return Err(MoneyError::InvalidCurrency(code.to_string()));
        }
        Ok(Self {
            code: [bytes[0], bytes[1], bytes[2]],
        })
    }

    pub fn code(&self) -> &str {
        // Constructed from ASCII uppercase only.
        core::str::from_utf8(&self.code).unwrap_or("XXX")
    }

    /// Number of decimal digits in the minor unit.
    pub fn minor_exponent(&self) -> u32 {
        match &self.code {
            b"JPY" | b"KRW" | b"CLP" | b"PYG" | b"VND" | b"ISK" | b"UGX" => 0,
            b"BHD" | b"KWD" | b"OMR" | b"JOD" | b"TND" | b"LYD" | b"IQD" => 3,
            _ => 2,
        }
    }
}

impl fmt::Debug for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Currency({})", self.code())
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Currency {
    type Err = MoneyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for Currency {
    type Error = MoneyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<Currency> for String {
    fn from(value: Currency) -> Self {
        value.code().to_string()
    }
}

impl ValueObject for Currency {}

/// Monetary amount in minor units.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Money {
    minor: i64,
    currency: Currency,
}

impl Money {
    pub const fn new(minor: i64, currency: Currency) -> Self {
        Self { minor, currency }
    }

    pub const fn zero(currency: Currency) -> Self {
        Self { minor: 0, currency }
    }

    /// Parse a decimal amount in major units (`"2.50"`), exactly.
    ///
    /// Amounts with more fractional digits than the currency allows are
    /// rejected rather than rounded.
    pub fn from_major_str(amount: &str, currency: Currency) -> Result<Self, MoneyError> {
        let parsed = Decimal::from_str(amount.trim())
            .map_err(|e| MoneyError::InvalidAmount(format!("{amount}: {e}")))?
            .normalize();
        let exponent = currency.minor_exponent();
        if parsed.scale() > exponent {
            return Err(MoneyError::InvalidAmount(format!(
                "{amount}: more than {exponent} decimal places for {currency}"
            )));
        }
        let factor = 10i128.pow(exponent - parsed.scale());
        let minor = parsed
            .mantissa()
            .checked_mul(factor)
            .and_then(|m| i64::try_from(m).ok())
            .ok_or(MoneyError::Overflow)?;
        Ok(Self { minor, currency })
    }

    pub fn minor(&self) -> i64 {
        self.minor
    }

    pub fn currency(&self) -> Currency {
        self.currency
    }

    pub fn is_negative(&self) -> bool {
        self.minor < 0
    }

    /// Amount in major units, for display and reporting.
    pub fn to_decimal(&self) -> Decimal {
        Decimal::new(self.minor, self.currency.minor_exponent())
    }

    fn same_currency(&self, other: &Money) -> Result<(), MoneyError> {
        if self.currency != other.currency {
            return Err(MoneyError::CurrencyMismatch {
                left: self.currency,
                right: other.currency,
            });
        }
        Ok(())
    }

    pub fn checked_add(&self, other: &Money) -> Result<Money, MoneyError> {
        self.same_currency(other)?;
        let minor = self.minor.checked_add(other.minor).ok_or(MoneyError::Overflow)?;
        Ok(Money::new(minor, self.currency))
    }

    pub fn checked_sub(&self, other: &Money) -> Result<Money, MoneyError> {
        self.same_currency(other)?;
        let minor = self.minor.checked_sub(other.minor).ok_or(MoneyError::Overflow)?;
        Ok(Money::new(minor, self.currency))
    }

    pub fn multiply_by_quantity(&self, quantity: i64) -> Result<Money, MoneyError> {
        let minor = self.minor.checked_mul(quantity).ok_or(MoneyError::Overflow)?;
        Ok(Money::new(minor, self.currency))
    }

    /// This amount on the `quantity × UnitCost::scaled` scale, for mixing
    /// with [`UnitCost::weighted`] sums without rounding.
    pub fn weighted(&self) -> i128 {
        i128::from(self.minor) * UNIT_COST_FACTOR
    }

    /// Round a sum of `quantity × UnitCost::scaled` products to the minor unit.
    pub fn from_weighted_sum(weighted_sum: i128, currency: Currency) -> Result<Money, MoneyError> {
        let minor = div_round_half_even(weighted_sum, UNIT_COST_FACTOR)?;
        Ok(Money::new(minor, currency))
    }

    /// Stock-weighted average price of `(price, quantity)` pairs.
    ///
    /// Returns a zero cost when the total quantity is zero.
    pub fn average(parts: &[(Money, i64)]) -> Result<UnitCost, MoneyError> {
        let Some((first, _)) = parts.first() else {
            return Err(MoneyError::InvalidAmount("average of nothing".to_string()));
        };
        let currency = first.currency;
        let mut weighted: i128 = 0;
        let mut quantity: i128 = 0;
        for (price, qty) in parts {
            first.same_currency(price)?;
            weighted += i128::from(price.minor) * i128::from(*qty) * UNIT_COST_FACTOR;
            quantity += i128::from(*qty);
        }
        if quantity == 0 {
            return Ok(UnitCost::zero(currency));
        }
        Ok(UnitCost::new(div_round_half_even(weighted, quantity)?, currency))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.to_decimal(), self.currency)
    }
}

impl ValueObject for Money {}

/// Cost of one unit of stock, with extra precision beyond the minor unit.
///
/// `scaled` counts units of `10^-(minor_exponent + UNIT_COST_EXTRA_DIGITS)`
/// of the major currency unit: 2.333333 USD is `2_333_333`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UnitCost {
    scaled: i64,
    currency: Currency,
}

impl UnitCost {
    pub const fn new(scaled: i64, currency: Currency) -> Self {
        Self { scaled, currency }
    }

    pub const fn zero(currency: Currency) -> Self {
        Self { scaled: 0, currency }
    }

    /// Exact unit cost of a price quoted in minor units.
    pub fn from_price(price: Money) -> Result<Self, MoneyError> {
        let scaled = i128::from(price.minor) * UNIT_COST_FACTOR;
        let scaled = i64::try_from(scaled).map_err(|_| MoneyError::Overflow)?;
        Ok(Self::new(scaled, price.currency))
    }

    /// `weighted_sum / quantity` where `weighted_sum` is a sum of
    /// `quantity × scaled` products. Zero quantity yields a zero cost.
    pub fn from_weighted_sum(
        weighted_sum: i128,
        quantity: i64,
        currency: Currency,
    ) -> Result<Self, MoneyError> {
        if quantity == 0 {
            return Ok(Self::zero(currency));
        }
        let scaled = div_round_half_even(weighted_sum, i128::from(quantity))?;
        Ok(Self::new(scaled, currency))
    }

    pub fn scaled(&self) -> i64 {
        self.scaled
    }

    pub fn currency(&self) -> Currency {
        self.currency
    }

    pub fn is_negative(&self) -> bool {
        self.scaled < 0
    }

    /// `quantity × self` as an unrounded weighted sum (see [`from_weighted_sum`]).
    ///
    /// [`from_weighted_sum`]: UnitCost::from_weighted_sum
    pub fn weighted(&self, quantity: i64) -> i128 {
        i128::from(self.scaled) * i128::from(quantity)
    }

    /// Value of `quantity` units, rounded once to the minor unit.
    pub fn extend(&self, quantity: i64) -> Result<Money, MoneyError> {
        Money::from_weighted_sum(self.weighted(quantity), self.currency)
    }

    /// Unit cost in major units, for display and reporting.
    pub fn to_decimal(&self) -> Decimal {
        Decimal::new(
            self.scaled,
            self.currency.minor_exponent() + UNIT_COST_EXTRA_DIGITS,
        )
    }

    /// Unit cost rounded to the currency minor unit.
    pub fn to_money(&self) -> Result<Money, MoneyError> {
        self.extend(1)
    }
}

impl fmt::Display for UnitCost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.to_decimal().normalize(), self.currency)
    }
}

impl ValueObject for UnitCost {}

/// `numerator / denominator` rounded half-to-even to an integer.
fn div_round_half_even(numerator: i128, denominator: i128) -> Result<i64, MoneyError> {
    let n = Decimal::try_from_i128_with_scale(numerator, 0).map_err(|_| MoneyError::Overflow)?;
    let d = Decimal::try_from_i128_with_scale(denominator, 0).map_err(|_| MoneyError::Overflow)?;
    n.checked_div(d)
        .ok_or(MoneyError::Overflow)?
        .round_dp_with_strategy(0, RoundingStrategy::MidpointNearestEven)
        .to_i64()
        .ok_or(MoneyError::Overflow)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn usd(minor: i64) -> Money {
        Money::new(minor, Currency::USD)
    }

    #[test]
    fn parses_major_amounts_exactly() {
        assert_eq!(Money::from_major_str("2.00", Currency::USD).unwrap(), usd(200));
        assert_eq!(Money::from_major_str("3.5", Currency::USD).unwrap(), usd(350));
        assert_eq!(Money::from_major_str("1200", Currency::JPY).unwrap().minor(), 1200);
        assert_eq!(Money::from_major_str("4.100", Currency::USD).unwrap(), usd(410));
    }

    #[test]
    fn rejects_sub_minor_precision() {
        let err = Money::from_major_str("1.005", Currency::USD).unwrap_err();
        assert!(matches!(err, MoneyError::InvalidAmount(_)));
        assert!(Money::from_major_str("abc", Currency::USD).is_err());
    }

    #[test]
    fn currency_codes_are_validated() {
        assert!(Currency::new("usd").is_err());
        assert!(Currency::new("US").is_err());
        assert_eq!(Currency::new("KWD").unwrap().minor_exponent(), 3);
        assert_eq!(Currency::JPY.minor_exponent(), 0);
    }

    #[test]
    fn cross_currency_arithmetic_is_rejected() {
        let eur = Money::new(100, Currency::EUR);
        let err = usd(100).checked_add(&eur).unwrap_err();
        assert_eq!(
            err,
            MoneyError::CurrencyMismatch {
                left: Currency::USD,
                right: Currency::EUR
            }
        );
        assert!(usd(100).checked_sub(&eur).is_err());
    }

    #[test]
    fn weighted_average_keeps_extra_digits() {
        let avg = Money::average(&[(usd(200), 100), (usd(300), 50)]).unwrap();
        assert_eq!(avg.scaled(), 2_333_333);
        assert_eq!(avg.extend(150).unwrap(), usd(35_000));
        assert_eq!(avg.extend(30).unwrap(), usd(7_000));
        assert_eq!(avg.to_money().unwrap(), usd(233));
    }

    #[test]
    fn average_of_equal_lots_is_exact() {
        let avg = Money::average(&[(usd(500), 10), (usd(700), 10)]).unwrap();
        assert_eq!(avg, UnitCost::from_price(usd(600)).unwrap());
    }

    #[test]
    fn rounding_is_half_to_even() {
        // 0.5 minor units rounds to 0, 1.5 rounds to 2, 2.5 rounds to 2.
        let half = UnitCost::new(5_000, Currency::USD);
        assert_eq!(half.extend(1).unwrap(), usd(0));
        assert_eq!(half.extend(3).unwrap(), usd(2));
        assert_eq!(half.extend(5).unwrap(), usd(2));
    }

    #[test]
    fn serializes_as_integers_and_code() {
        let json = serde_json::to_value(usd(7_000)).unwrap();
        assert_eq!(json, serde_json::json!({"minor": 7000, "currency": "USD"}));
        let back: Money = serde_json::from_value(json).unwrap();
        assert_eq!(back, usd(7_000));
        assert!(serde_json::from_value::<Currency>(serde_json::json!("us")).is_err());
    }

    #[test]
    fn display_uses_major_units() {
        assert_eq!(usd(7_000).to_string(), "70.00 USD");
        assert_eq!(UnitCost::new(2_333_333, Currency::USD).to_string(), "2.333333 USD");
    }

    proptest! {
        #[test]
        fn extend_stays_within_one_minor_unit(
            scaled in 0i64..100_000_000i64,
            qty in 0i64..1_000_000i64,
        ) {
            let cost = UnitCost::new(scaled, Currency::USD);
            let total = cost.extend(qty).unwrap();
            let exact = i128::from(scaled) * i128::from(qty);
            let diff = (i128::from(total.minor()) * UNIT_COST_FACTOR - exact).abs();
            prop_assert!(diff <= UNIT_COST_FACTOR / 2);
        }
    }
}
