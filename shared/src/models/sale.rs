//! Sale record models

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::InventoryLot;
use crate::types::{null_as_default, AmountOverflow, LotId, SaleId};

/// One market-day sale drawn from a single lot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleRecord {
    pub id: SaleId,
    pub date: NaiveDate,
    #[serde(default, deserialize_with = "null_as_default")]
    pub location: String,
    pub inventory_id: LotId,
    /// Product name copied from the lot when the sale was recorded
    #[serde(default, deserialize_with = "null_as_default")]
    pub fruit: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub sell_boxes: Decimal,
    #[serde(default, deserialize_with = "null_as_default")]
    pub cash: Decimal,
    #[serde(default, deserialize_with = "null_as_default")]
    pub alipay: Decimal,
    #[serde(default, deserialize_with = "null_as_default")]
    pub wechat: Decimal,
    #[serde(default, deserialize_with = "null_as_default")]
    pub total_income: Decimal,
    /// Lot purchase price frozen at sale time; later lot edits do not touch it
    #[serde(default, deserialize_with = "null_as_default")]
    pub cost_per_box: Decimal,
    #[serde(default, deserialize_with = "null_as_default")]
    pub cost: Decimal,
    #[serde(default, deserialize_with = "null_as_default")]
    pub profit: Decimal,
    #[serde(default, deserialize_with = "null_as_default")]
    pub created_at: DateTime<Utc>,
}

impl SaleRecord {
    /// Record a sale against `lot`, freezing its name and unit cost
    pub fn against_lot(
        id: SaleId,
        input: NewSaleRecord,
        lot: &InventoryLot,
        created_at: DateTime<Utc>,
    ) -> Result<Self, AmountOverflow> {
        let mut sale = Self {
            id,
            date: input.date,
            location: input.location.trim().to_string(),
            inventory_id: lot.id.clone(),
            fruit: lot.fruit.clone(),
            sell_boxes: input.sell_boxes,
            cash: input.cash,
            alipay: input.alipay,
            wechat: input.wechat,
            total_income: Decimal::ZERO,
            cost_per_box: lot.price_per_box,
            cost: Decimal::ZERO,
            profit: Decimal::ZERO,
            created_at,
        };
        sale.recompute()?;
        Ok(sale)
    }

    /// Recompute income, cost and profit from the stored fields.
    /// Leaves the record untouched when any of them does not fit in a decimal.
    pub fn recompute(&mut self) -> Result<(), AmountOverflow> {
        let total_income = self
            .cash
            .checked_add(self.alipay)
            .and_then(|sum| sum.checked_add(self.wechat))
            .ok_or(AmountOverflow::new("totalIncome"))?;
        let cost = self
            .sell_boxes
            .checked_mul(self.cost_per_box)
            .ok_or(AmountOverflow::new("cost"))?;
        let profit = total_income
            .checked_sub(cost)
            .ok_or(AmountOverflow::new("profit"))?;

        self.total_income = total_income;
        self.cost = cost;
        self.profit = profit;
        Ok(())
    }
}

/// Input for recording a sale
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewSaleRecord {
    pub date: NaiveDate,
    #[validate(custom = "crate::validation::check_location")]
    pub location: String,
    pub inventory_id: LotId,
    #[validate(custom = "crate::validation::check_quantity")]
    pub sell_boxes: Decimal,
    #[serde(default)]
    #[validate(custom = "crate::validation::check_amount")]
    pub cash: Decimal,
    #[serde(default)]
    #[validate(custom = "crate::validation::check_amount")]
    pub alipay: Decimal,
    #[serde(default)]
    #[validate(custom = "crate::validation::check_amount")]
    pub wechat: Decimal,
}

/// Input for editing a sale; absent fields are left as they are
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SaleUpdate {
    #[validate(custom = "crate::validation::check_location")]
    pub location: Option<String>,
    #[validate(custom = "crate::validation::check_quantity")]
    pub sell_boxes: Option<Decimal>,
    #[validate(custom = "crate::validation::check_amount")]
    pub cash: Option<Decimal>,
    #[validate(custom = "crate::validation::check_amount")]
    pub alipay: Option<Decimal>,
    #[validate(custom = "crate::validation::check_amount")]
    pub wechat: Option<Decimal>,
}

impl SaleUpdate {
    pub fn is_empty(&self) -> bool {
        self.location.is_none()
            && self.sell_boxes.is_none()
            && self.cash.is_none()
            && self.alipay.is_none()
            && self.wechat.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewInventoryLot;

    fn lot() -> InventoryLot {
        InventoryLot::new(
            LotId::new("lot-1"),
            NewInventoryLot {
                date: NaiveDate::from_ymd_opt(2024, 11, 2).unwrap(),
                fruit: "梨".to_string(),
                boxes: Decimal::from(50),
                price_per_box: Decimal::from(80),
            },
            DateTime::<Utc>::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_sale_freezes_lot_fields() {
        let lot = lot();
        let sale = SaleRecord::against_lot(
            SaleId::new("sale-1"),
            NewSaleRecord {
                date: NaiveDate::from_ymd_opt(2024, 11, 3).unwrap(),
                location: "西坡".to_string(),
                inventory_id: lot.id.clone(),
                sell_boxes: Decimal::from(20),
                cash: Decimal::from(150),
                alipay: Decimal::from(50),
                wechat: Decimal::from(200),
            },
            &lot,
            DateTime::<Utc>::default(),
        )
        .unwrap();

        assert_eq!(sale.fruit, "梨");
        assert_eq!(sale.cost_per_box, Decimal::from(80));
        assert_eq!(sale.total_income, Decimal::from(400));
        assert_eq!(sale.cost, Decimal::from(1600));
        assert_eq!(sale.profit, Decimal::from(-1200));
    }

    #[test]
    fn test_payment_channels_default_to_zero() {
        let input: NewSaleRecord = serde_json::from_str(
            r#"{"date":"2024-11-03","location":"西坡","inventoryId":"lot-1","sellBoxes":"2","wechat":"60"}"#,
        )
        .unwrap();
        assert_eq!(input.cash, Decimal::ZERO);
        assert_eq!(input.alipay, Decimal::ZERO);
        assert_eq!(input.wechat, Decimal::from(60));
    }

    #[test]
    fn test_update_rejects_negative_payment() {
        let update = SaleUpdate {
            cash: Some(Decimal::from(-5)),
            ..Default::default()
        };
        assert!(update.validate().is_err());
        assert!(SaleUpdate::default().validate().is_ok());
        assert!(SaleUpdate::default().is_empty());
    }

    #[test]
    fn test_income_overflow_leaves_sale_unchanged() {
        let lot = lot();
        let mut sale = SaleRecord::against_lot(
            SaleId::new("sale-2"),
            NewSaleRecord {
                date: NaiveDate::from_ymd_opt(2024, 11, 3).unwrap(),
                location: "西坡".to_string(),
                inventory_id: lot.id.clone(),
                sell_boxes: Decimal::from(1),
                cash: Decimal::from(100),
                alipay: Decimal::ZERO,
                wechat: Decimal::ZERO,
            },
            &lot,
            DateTime::<Utc>::default(),
        )
        .unwrap();

        sale.cash = Decimal::MAX;
        sale.alipay = Decimal::MAX;
        assert_eq!(sale.recompute().unwrap_err().field, "totalIncome");
        assert_eq!(sale.total_income, Decimal::from(100));
    }
}
