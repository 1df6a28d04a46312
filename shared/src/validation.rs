//! Pure validation rules for ledger inputs
//!
//! These checks have no storage access; the ledger services map failures to
//! their specific error kinds.

use rust_decimal::Decimal;

/// Maximum fractional digits a ledger quantity may carry. Balances are
/// stored as `NUMERIC(14, 3)`; anything finer would be silently rounded by
/// the database, so it is rejected up front.
pub const QUANTITY_SCALE: u32 = 3;

/// Upper bound for free-text movement notes.
pub const MAX_NOTE_LEN: usize = 2000;

pub fn quantity_is_positive(quantity: Decimal) -> bool {
    quantity > Decimal::ZERO
}

/// True if the quantity fits the ledger scale. Trailing zeros do not count
/// against the scale (`10.1230` is fine, `10.1234` is not).
pub fn quantity_fits_scale(quantity: Decimal) -> bool {
    quantity.normalize().scale() <= QUANTITY_SCALE
}

pub fn validate_note(note: &str) -> Result<(), &'static str> {
    if note.len() > MAX_NOTE_LEN {
        return Err("note is too long");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn zero_and_negative_quantities_are_not_positive() {
        assert!(!quantity_is_positive(Decimal::ZERO));
        assert!(!quantity_is_positive(dec("-0.001")));
        assert!(quantity_is_positive(dec("0.001")));
    }

    #[test]
    fn scale_counts_significant_fraction_digits() {
        assert!(quantity_fits_scale(dec("10")));
        assert!(quantity_fits_scale(dec("10.123")));
        assert!(quantity_fits_scale(dec("10.1230")));
        assert!(!quantity_fits_scale(dec("10.1234")));
        assert!(!quantity_fits_scale(dec("0.0001")));
    }

    #[test]
    fn oversized_note_is_rejected() {
        assert!(validate_note("received from supplier").is_ok());
        assert!(validate_note(&"x".repeat(MAX_NOTE_LEN + 1)).is_err());
    }
}
