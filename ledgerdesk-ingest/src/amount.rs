//! Amount tokens as printed on statements.
//!
//! Statements use `,` and `.` interchangeably for grouping, so a token is
//! never parsed locale-aware. Every separator is stripped except a final one
//! followed by exactly one or two digits, which is the decimal point:
//!
//!   1,234        -> 1234
//!   1.234.567    -> 1234567
//!   250,000.00   -> 250000.00
//!   1.234,56     -> 1234.56

use rust_decimal::Decimal;
use std::str::FromStr;

fn is_separator(c: char) -> bool {
    c == '.' || c == ','
}

/// Digits with grouping/decimal punctuation only, starting and ending on a digit.
pub fn is_numeric_token(token: &str) -> bool {
    let (Some(first), Some(last)) = (token.chars().next(), token.chars().last()) else {
        return false;
    };
    first.is_ascii_digit()
        && last.is_ascii_digit()
        && token.chars().all(|c| c.is_ascii_digit() || is_separator(c))
}

/// A standalone four-digit token (branch code).
pub fn is_branch_code(token: &str) -> bool {
    token.len() == 4 && token.chars().all(|c| c.is_ascii_digit())
}

/// Parse a numeric token into a decimal. `None` when the token is not numeric
/// or does not fit a `Decimal`.
pub fn parse_amount(token: &str) -> Option<Decimal> {
    let token = token.trim();
    if !is_numeric_token(token) {
        return None;
    }

    let (int_part, frac_part) = match token.rfind(is_separator) {
        Some(idx) => {
            let tail = &token[idx + 1..];
            if (1..=2).contains(&tail.len()) {
                (&token[..idx], tail)
            } else {
                (token, "")
            }
        }
        None => (token, ""),
    };

    let digits: String = int_part.chars().filter(|c| c.is_ascii_digit()).collect();
    let normalized = if frac_part.is_empty() {
        digits
    } else {
        format!("{digits}.{frac_part}")
    };
    Decimal::from_str(&normalized).ok()
}
