//! Inventory lot models

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::types::{null_as_default, AmountOverflow, LotId};

/// One purchase batch of a single product
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryLot {
    pub id: LotId,
    /// Purchase date
    pub date: NaiveDate,
    #[serde(default, deserialize_with = "null_as_default")]
    pub fruit: String,
    /// Original lot size; only changed by an explicit edit
    #[serde(default, deserialize_with = "null_as_default")]
    pub boxes: Decimal,
    #[serde(default, deserialize_with = "null_as_default")]
    pub price_per_box: Decimal,
    #[serde(default, deserialize_with = "null_as_default")]
    pub total_cost: Decimal,
    /// Boxes not yet sold, `0 <= remain_boxes <= boxes`
    #[serde(default, deserialize_with = "null_as_default")]
    pub remain_boxes: Decimal,
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: LotStatus,
    #[serde(default, deserialize_with = "null_as_default")]
    pub created_at: DateTime<Utc>,
}

/// Whether a lot still has stock to sell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LotStatus {
    #[default]
    Active,
    Finished,
}

impl LotStatus {
    /// `Finished` iff nothing remains
    pub fn from_remaining(remain_boxes: Decimal) -> Self {
        if remain_boxes <= Decimal::ZERO {
            LotStatus::Finished
        } else {
            LotStatus::Active
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LotStatus::Active => "active",
            LotStatus::Finished => "finished",
        }
    }
}

impl std::fmt::Display for LotStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LotStatus::Active => write!(f, "Active"),
            LotStatus::Finished => write!(f, "Finished"),
        }
    }
}

impl InventoryLot {
    /// Create a fresh lot with its whole size still in stock
    pub fn new(
        id: LotId,
        input: NewInventoryLot,
        created_at: DateTime<Utc>,
    ) -> Result<Self, AmountOverflow> {
        let mut lot = Self {
            id,
            date: input.date,
            fruit: input.fruit.trim().to_string(),
            boxes: input.boxes,
            price_per_box: input.price_per_box,
            total_cost: Decimal::ZERO,
            remain_boxes: input.boxes,
            status: LotStatus::Active,
            created_at,
        };
        lot.recompute()?;
        Ok(lot)
    }

    /// Boxes already sold out of this lot
    pub fn sold_boxes(&self) -> Decimal {
        self.boxes - self.remain_boxes
    }

    /// Active with stock left
    pub fn is_sellable(&self) -> bool {
        self.status == LotStatus::Active && self.remain_boxes > Decimal::ZERO
    }

    /// Recompute `total_cost` and `status` from the stored quantities.
    /// Leaves the lot untouched when the cost does not fit in a decimal.
    pub fn recompute(&mut self) -> Result<(), AmountOverflow> {
        self.total_cost = self
            .boxes
            .checked_mul(self.price_per_box)
            .ok_or(AmountOverflow::new("totalCost"))?;
        self.refresh_status();
        Ok(())
    }

    /// Derive `status` from `remain_boxes`
    pub fn refresh_status(&mut self) {
        self.status = LotStatus::from_remaining(self.remain_boxes);
    }
}

/// Input for recording a purchase
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewInventoryLot {
    pub date: NaiveDate,
    #[validate(custom = "crate::validation::check_product_name")]
    pub fruit: String,
    #[validate(custom = "crate::validation::check_quantity")]
    pub boxes: Decimal,
    #[validate(custom = "crate::validation::check_amount")]
    pub price_per_box: Decimal,
}

/// Input for editing a lot; absent fields are left as they are
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct InventoryUpdate {
    #[validate(custom = "crate::validation::check_product_name")]
    pub fruit: Option<String>,
    #[validate(custom = "crate::validation::check_quantity")]
    pub boxes: Option<Decimal>,
    #[validate(custom = "crate::validation::check_amount")]
    pub price_per_box: Option<Decimal>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pears() -> InventoryLot {
        InventoryLot::new(
            LotId::new("lot-1"),
            NewInventoryLot {
                date: NaiveDate::from_ymd_opt(2024, 11, 2).unwrap(),
                fruit: " 梨 ".to_string(),
                boxes: Decimal::from(50),
                price_per_box: Decimal::from(80),
            },
            DateTime::<Utc>::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_new_lot_is_fully_stocked() {
        let lot = pears();
        assert_eq!(lot.fruit, "梨");
        assert_eq!(lot.total_cost, Decimal::from(4000));
        assert_eq!(lot.remain_boxes, Decimal::from(50));
        assert_eq!(lot.status, LotStatus::Active);
        assert_eq!(lot.sold_boxes(), Decimal::ZERO);
        assert!(lot.is_sellable());
    }

    #[test]
    fn test_status_follows_remaining() {
        assert_eq!(LotStatus::from_remaining(Decimal::ZERO), LotStatus::Finished);
        assert_eq!(LotStatus::from_remaining(Decimal::from(-1)), LotStatus::Finished);
        assert_eq!(LotStatus::from_remaining(Decimal::new(5, 1)), LotStatus::Active);
    }

    #[test]
    fn test_lot_wire_format() {
        let json = serde_json::to_value(pears()).unwrap();
        assert_eq!(json["pricePerBox"], "80");
        assert_eq!(json["remainBoxes"], "50");
        assert_eq!(json["status"], "active");
        assert_eq!(json["date"], "2024-11-02");
    }

    #[test]
    fn test_lot_accepts_numeric_fields() {
        let lot: InventoryLot = serde_json::from_str(
            r#"{"id":"1712","date":"2024-11-02","fruit":"梨","boxes":50,"pricePerBox":80.5,
                "totalCost":4025,"remainBoxes":30,"status":"active","createdAt":"2024-11-02T01:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(lot.price_per_box, Decimal::new(805, 1));
        assert_eq!(lot.sold_boxes(), Decimal::from(20));
    }

    #[test]
    fn test_cost_overflow_is_an_error() {
        let huge = Decimal::from_i128_with_scale(100_000_000_000_000_000_000, 0);
        let err = InventoryLot::new(
            LotId::new("lot-2"),
            NewInventoryLot {
                date: NaiveDate::from_ymd_opt(2024, 11, 2).unwrap(),
                fruit: "梨".to_string(),
                boxes: huge,
                price_per_box: huge,
            },
            DateTime::<Utc>::default(),
        )
        .unwrap_err();
        assert_eq!(err.field, "totalCost");
    }

    #[test]
    fn test_null_fields_read_as_zero() {
        let lot: InventoryLot = serde_json::from_str(
            r#"{"id":"1712","date":"2024-11-02","fruit":"梨","boxes":50,"pricePerBox":80,
                "totalCost":null,"remainBoxes":null,"status":"active","createdAt":null}"#,
        )
        .unwrap();
        assert_eq!(lot.remain_boxes, Decimal::ZERO);
        assert_eq!(lot.total_cost, Decimal::ZERO);
        assert_eq!(lot.created_at, DateTime::<Utc>::default());
    }
}
