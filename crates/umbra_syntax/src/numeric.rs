//! Fixed-width numeric-literal parsing.
//!
//! Integer literals are decimal by default and may carry an explicit base
//! through the `x` infix: `16x1A` is 26, `2x1011` is 11. Underscores group
//! digits and are ignored. Arbitrary-precision literals are not supported;
//! anything outside the `u64` range is an overflow outcome.

/// The outcome of parsing an integer literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericOutcome {
    Ok(u64),
    /// explicit base evaluated to zero, e.g. `0x5`
    ZeroBase,
    /// explicit base larger than 36
    BaseTooLarge,
    /// a digit is not valid in the effective base
    InvalidDigit,
    /// no digits after the base infix
    MissingDigits,
    /// value does not fit a 64-bit word
    Overflow,
}

impl NumericOutcome {
    pub fn is_ok(&self) -> bool {
        matches!(self, NumericOutcome::Ok(_))
    }

    /// A diagnostic-ready description of a failed outcome.
    pub fn describe(&self) -> &'static str {
        match self {
            NumericOutcome::Ok(_) => "ok",
            NumericOutcome::ZeroBase => "integer literal has base zero",
            NumericOutcome::BaseTooLarge => "integer literal base is larger than 36",
            NumericOutcome::InvalidDigit => "digit is not valid in the literal's base",
            NumericOutcome::MissingDigits => "integer literal has no digits after its base",
            NumericOutcome::Overflow => "integer literal does not fit a 64-bit word",
        }
    }
}

/// Parses an integer literal, honoring the `x` base infix and underscores.
pub fn parse_numeric(text: &str) -> NumericOutcome {
    match text.split_once('x') {
        None => parse_digits(text, 10),
        Some((base_text, digits)) => {
            let base = match parse_digits(base_text, 10) {
                NumericOutcome::Ok(base) => base,
                error => return error,
            };
            if base == 0 {
                return NumericOutcome::ZeroBase;
            }
            if base > 36 {
                return NumericOutcome::BaseTooLarge;
            }
            parse_digits(digits, base as u32)
        }
    }
}

fn parse_digits(text: &str, base: u32) -> NumericOutcome {
    let mut value: u64 = 0;
    let mut seen = false;
    for c in text.chars() {
        if c == '_' {
            continue;
        }
        let digit = match c.to_digit(36) {
            Some(digit) if digit < base => digit,
            _ => return NumericOutcome::InvalidDigit,
        };
        seen = true;
        value = match value
            .checked_mul(base as u64)
            .and_then(|v| v.checked_add(digit as u64))
        {
            Some(value) => value,
            None => return NumericOutcome::Overflow,
        };
    }
    if !seen {
        return NumericOutcome::MissingDigits;
    }
    NumericOutcome::Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_infix() {
        assert_eq!(parse_numeric("16x1A"), NumericOutcome::Ok(26));
    }

    #[test]
    fn test_zero_base() {
        assert_eq!(parse_numeric("0x5"), NumericOutcome::ZeroBase);
    }

    #[test]
    fn test_decimal_with_underscores() {
        assert_eq!(parse_numeric("1_000_000"), NumericOutcome::Ok(1_000_000));
    }

    #[test]
    fn test_binary() {
        assert_eq!(parse_numeric("2x1011"), NumericOutcome::Ok(11));
    }

    #[test]
    fn test_invalid_digit_for_base() {
        assert_eq!(parse_numeric("8x9"), NumericOutcome::InvalidDigit);
        assert_eq!(parse_numeric("10xZ"), NumericOutcome::InvalidDigit);
    }

    #[test]
    fn test_missing_digits() {
        assert_eq!(parse_numeric("16x"), NumericOutcome::MissingDigits);
    }

    #[test]
    fn test_overflow() {
        assert_eq!(parse_numeric("99999999999999999999999"), NumericOutcome::Overflow);
    }

    #[test]
    fn test_base_too_large() {
        assert_eq!(parse_numeric("99x1"), NumericOutcome::BaseTooLarge);
    }
}
