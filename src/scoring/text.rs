// src/scoring/text.rs
use rust_decimal::{Decimal, RoundingStrategy};

/// `a`, `a and b`, `a, b and c`.
pub fn join_words<S: AsRef<str>>(words: &[S]) -> String {
    match words {
        [] => String::new(),
        [only] => only.as_ref().to_string(),
        [head @ .., last] => {
            let head: Vec<&str> = head.iter().map(|w| w.as_ref()).collect();
            format!("{} and {}", head.join(", "), last.as_ref())
        }
    }
}

/// Plural only for names ending in "token" with more than one unit.
pub fn pluralize(currency: &str, quantity: Decimal) -> String {
    if currency.to_lowercase().ends_with("token") && quantity.abs() > Decimal::ONE {
        format!("{currency}s")
    } else {
        currency.to_string()
    }
}

pub fn amount(value: Decimal) -> String {
    value.normalize().to_string()
}

/// `"{amount} {currency}"`, pluralized.
pub fn quantity(currency: &str, value: Decimal) -> String {
    format!("{} {}", amount(value), pluralize(currency, value))
}

/// Keeps at most six fractional digits.
pub fn truncated(value: Decimal) -> String {
    amount(value.round_dp_with_strategy(6, RoundingStrategy::ToZero))
}

/// `MIN/ADA` → `MIN-ADA`.
pub fn pair_name(name: &str) -> String {
    name.replace('/', "-")
}
