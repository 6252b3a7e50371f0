//! Error handling for the stall ledger
//!
//! Domain errors are recoverable and reported to the vendor with a stable
//! code plus English and Chinese messages.

use rust_decimal::Decimal;
use serde::Serialize;
use shared::{AmountOverflow, LotId, SaleId};
use thiserror::Error;

/// Ledger error types
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LedgerError {
    // Validation errors
    #[error("Validation error: {message}")]
    Validation {
        field: String,
        message: String,
        message_zh: String,
    },

    #[error("Inventory lot not found: {0}")]
    LotNotFound(LotId),

    #[error("Sale record not found: {0}")]
    SaleNotFound(SaleId),

    // Business rule errors
    #[error("Inventory lot {0} is finished")]
    LotFinished(LotId),

    #[error("Insufficient stock in lot {lot_id}: requested {requested}, available {available}")]
    InsufficientStock {
        lot_id: LotId,
        requested: Decimal,
        available: Decimal,
    },

    #[error("Lot {lot_id} cannot shrink to {requested} boxes, {sold} already sold")]
    InvalidBounds {
        lot_id: LotId,
        requested: Decimal,
        sold: Decimal,
    },

    #[error("Inventory lot {lot_id} has {count} dependent sales")]
    HasDependentSales { lot_id: LotId, count: usize },

    #[error("Export error: {0}")]
    Export(String),
}

/// Error body handed to presentation adapters
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message_en: String,
    pub message_zh: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl LedgerError {
    pub fn code(&self) -> &'static str {
        match self {
            LedgerError::Validation { .. } => "VALIDATION_ERROR",
            LedgerError::LotNotFound(_) => "LOT_NOT_FOUND",
            LedgerError::SaleNotFound(_) => "SALE_NOT_FOUND",
            LedgerError::LotFinished(_) => "LOT_FINISHED",
            LedgerError::InsufficientStock { .. } => "INSUFFICIENT_STOCK",
            LedgerError::InvalidBounds { .. } => "INVALID_BOUNDS",
            LedgerError::HasDependentSales { .. } => "HAS_DEPENDENT_SALES",
            LedgerError::Export(_) => "EXPORT_ERROR",
        }
    }

    pub fn field(&self) -> Option<&str> {
        match self {
            LedgerError::Validation { field, .. } => Some(field),
            LedgerError::InsufficientStock { .. } => Some("sellBoxes"),
            LedgerError::InvalidBounds { .. } => Some("boxes"),
            _ => None,
        }
    }

    pub fn message_zh(&self) -> String {
        match self {
            LedgerError::Validation { message_zh, .. } => message_zh.clone(),
            LedgerError::LotNotFound(_) => "找不到这批进货记录".to_string(),
            LedgerError::SaleNotFound(_) => "找不到这条销售记录".to_string(),
            LedgerError::LotFinished(_) => "这批货已经卖完了".to_string(),
            LedgerError::InsufficientStock { available, .. } => {
                format!("最多只能卖 {} 框（库存不足）", available.normalize())
            }
            LedgerError::InvalidBounds { sold, .. } => {
                format!("总框数不能少于已售出的 {} 框", sold.normalize())
            }
            LedgerError::HasDependentSales { count, .. } => {
                format!("这批货还有 {} 条销售记录，请先删除销售记录", count)
            }
            LedgerError::Export(msg) => format!("导出失败：{}", msg),
        }
    }

    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            success: false,
            error: ErrorDetail {
                code: self.code().to_string(),
                message_en: self.to_string(),
                message_zh: self.message_zh(),
                field: self.field().map(str::to_string),
            },
        }
    }
}

impl From<AmountOverflow> for LedgerError {
    fn from(overflow: AmountOverflow) -> Self {
        LedgerError::Validation {
            field: overflow.field.to_string(),
            message: overflow.to_string(),
            message_zh: "数值过大，无法计算".to_string(),
        }
    }
}

impl From<validator::ValidationErrors> for LedgerError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
        fields.sort_by_key(|(field, _)| *field);

        let first = fields
            .into_iter()
            .find_map(|(field, errs)| errs.first().map(|err| (field, err.clone())));

        match first {
            Some((field, err)) => LedgerError::Validation {
                field: field.to_string(),
                message: err
                    .message
                    .as_deref()
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("{} is invalid", field)),
                message_zh: err
                    .params
                    .get("message_zh")
                    .and_then(|v| v.as_str())
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("{} 填写有误", field)),
            },
            None => LedgerError::Validation {
                field: String::new(),
                message: "Invalid input".to_string(),
                message_zh: "输入有误".to_string(),
            },
        }
    }
}

/// Result type alias for ledger operations
pub type LedgerResult<T> = Result<T, LedgerError>;

#[cfg(test)]
mod tests {
    use super::*;
    use shared::NewInventoryLot;
    use validator::Validate;

    #[test]
    fn test_validation_errors_convert() {
        let input = NewInventoryLot {
            date: chrono::NaiveDate::from_ymd_opt(2024, 11, 2).unwrap(),
            fruit: "梨".to_string(),
            boxes: Decimal::ZERO,
            price_per_box: Decimal::from(80),
        };
        let err: LedgerError = input.validate().unwrap_err().into();

        assert_eq!(err.code(), "VALIDATION_ERROR");
        assert_eq!(err.field(), Some("boxes"));
        assert_eq!(err.message_zh(), "框数必须大于0");
    }

    #[test]
    fn test_error_response_shape() {
        let err = LedgerError::HasDependentSales {
            lot_id: LotId::new("lot-1"),
            count: 2,
        };
        let body = serde_json::to_value(err.to_response()).unwrap();

        assert_eq!(body["success"], false);
        assert_eq!(body["error"]["code"], "HAS_DEPENDENT_SALES");
        assert!(body["error"].get("field").is_none());
        assert!(body["error"]["message_zh"].as_str().unwrap().contains('2'));
    }

    #[test]
    fn test_bounds_message_uses_plain_numbers() {
        let err = LedgerError::InvalidBounds {
            lot_id: LotId::new("lot-1"),
            requested: Decimal::from(10),
            sold: Decimal::new(400, 1),
        };
        assert_eq!(err.message_zh(), "总框数不能少于已售出的 40 框");
    }
}
