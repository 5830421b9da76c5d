//! Validation utilities for ledger inputs

use rust_decimal::Decimal;

/// Decimal places kept by every stored stock quantity
pub const QUANTITY_SCALE: u32 = 3;

/// Validate that a stock quantity is strictly positive
pub fn validate_quantity(quantity: Decimal) -> Result<(), &'static str> {
    if quantity <= Decimal::ZERO {
        return Err("Quantity must be positive");
    }
    // NUMERIC(14,3) columns
    if quantity.normalize().scale() > QUANTITY_SCALE {
        return Err("Quantity supports at most 3 decimal places");
    }
    Ok(())
}

/// Validate that a monetary amount is strictly positive
pub fn validate_amount(amount: Decimal) -> Result<(), &'static str> {
    if amount <= Decimal::ZERO {
        return Err("Amount must be positive");
    }
    if amount.normalize().scale() > 2 {
        return Err("Amount supports at most 2 decimal places");
    }
    Ok(())
}

/// Validate that a price is zero or positive
pub fn validate_price(price: Decimal) -> Result<(), &'static str> {
    if price < Decimal::ZERO {
        return Err("Price cannot be negative");
    }
    Ok(())
}

/// Validate a unit of measure such as "kg", "pcs" or "m"
pub fn validate_unit(unit: &str) -> Result<(), &'static str> {
    let unit = unit.trim();
    if unit.is_empty() {
        return Err("Unit is required");
    }
    if unit.len() > 20 {
        return Err("Unit must be at most 20 characters");
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
    fn test_validate_quantity() {
        assert!(validate_quantity(dec("0.001")).is_ok());
        assert!(validate_quantity(dec("30")).is_ok());
        assert!(validate_quantity(Decimal::ZERO).is_err());
        assert!(validate_quantity(dec("-1")).is_err());
        assert!(validate_quantity(dec("1.0005")).is_err());
    }

    #[test]
    fn test_validate_amount() {
        assert!(validate_amount(dec("10.50")).is_ok());
        assert!(validate_amount(dec("0")).is_err());
        assert!(validate_amount(dec("1.005")).is_err());
    }

    #[test]
    fn test_validate_price() {
        assert!(validate_price(Decimal::ZERO).is_ok());
        assert!(validate_price(dec("-0.01")).is_err());
    }

    #[test]
    fn test_validate_unit() {
        assert!(validate_unit("kg").is_ok());
        assert!(validate_unit("   ").is_err());
        assert!(validate_unit("a-very-long-unit-name-indeed").is_err());
    }
}
