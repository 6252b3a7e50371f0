//! Validation utilities for ledger input
//!
//! The plain `validate_*` functions return a static English message; the
//! `check_*` adapters wrap them for `#[derive(Validate)]` and attach the
//! Chinese message shown to the vendor.

use std::borrow::Cow;

use rust_decimal::Decimal;
use validator::ValidationError;

/// Longest product or market name accepted
pub const MAX_LABEL_CHARS: usize = 40;

// ============================================================================
// Plain Validations
// ============================================================================

/// Validate a product (fruit) name
pub fn validate_product_name(name: &str) -> Result<(), &'static str> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err("Product name is required");
    }
    if trimmed.chars().count() > MAX_LABEL_CHARS {
        return Err("Product name is too long");
    }
    Ok(())
}

/// Validate a market / location label
pub fn validate_location(location: &str) -> Result<(), &'static str> {
    let trimmed = location.trim();
    if trimmed.is_empty() {
        return Err("Location is required");
    }
    if trimmed.chars().count() > MAX_LABEL_CHARS {
        return Err("Location is too long");
    }
    Ok(())
}

/// Validate a box count (must be strictly positive)
pub fn validate_quantity(quantity: Decimal) -> Result<(), &'static str> {
    if quantity <= Decimal::ZERO {
        return Err("Quantity must be positive");
    }
    Ok(())
}

/// Validate a money amount (price or payment channel)
pub fn validate_amount(amount: Decimal) -> Result<(), &'static str> {
    if amount < Decimal::ZERO {
        return Err("Amount cannot be negative");
    }
    Ok(())
}

// ============================================================================
// Derive Adapters
// ============================================================================

fn to_validation_error(
    code: &'static str,
    result: Result<(), &'static str>,
    message_zh: &'static str,
) -> Result<(), ValidationError> {
    result.map_err(|message| {
        let mut err = ValidationError::new(code);
        err.message = Some(Cow::Borrowed(message));
        err.add_param(Cow::Borrowed("message_zh"), &message_zh);
        err
    })
}

pub fn check_product_name(name: &str) -> Result<(), ValidationError> {
    to_validation_error("product_name", validate_product_name(name), "请填写水果名称（不超过40字）")
}

pub fn check_location(location: &str) -> Result<(), ValidationError> {
    to_validation_error("location", validate_location(location), "请填写摆摊地点（不超过40字）")
}

pub fn check_quantity(quantity: &Decimal) -> Result<(), ValidationError> {
    to_validation_error("quantity", validate_quantity(*quantity), "框数必须大于0")
}

pub fn check_amount(amount: &Decimal) -> Result<(), ValidationError> {
    to_validation_error("amount", validate_amount(*amount), "金额不能为负数")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_product_name() {
        assert!(validate_product_name("梨").is_ok());
        assert!(validate_product_name("  苹果 ").is_ok());
        assert!(validate_product_name("").is_err());
        assert!(validate_product_name("   ").is_err());
        assert!(validate_product_name(&"桃".repeat(41)).is_err());
    }

    #[test]
    fn test_validate_location() {
        assert!(validate_location("西坡").is_ok());
        assert!(validate_location("").is_err());
    }

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(Decimal::from(1)).is_ok());
        assert!(validate_quantity(Decimal::new(5, 1)).is_ok()); // half a box
        assert!(validate_quantity(Decimal::ZERO).is_err());
        assert!(validate_quantity(Decimal::from(-3)).is_err());
    }

    #[test]
    fn test_validate_amount() {
        assert!(validate_amount(Decimal::ZERO).is_ok());
        assert!(validate_amount(Decimal::new(1250, 2)).is_ok());
        assert!(validate_amount(Decimal::new(-1, 2)).is_err());
    }

    #[test]
    fn test_check_adapter_carries_chinese_message() {
        let err = check_quantity(&Decimal::ZERO).unwrap_err();
        assert_eq!(err.code, "quantity");
        assert_eq!(err.message.as_deref(), Some("Quantity must be positive"));
        assert_eq!(
            err.params.get("message_zh").and_then(|v| v.as_str()),
            Some("框数必须大于0")
        );
    }
}
