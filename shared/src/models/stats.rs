//! Aggregate views over sales and stock

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::LotId;

/// Totals over a trailing window of days
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesStats {
    pub since: Option<NaiveDate>,
    pub total_income: Decimal,
    pub total_profit: Decimal,
    pub total_cost: Decimal,
    pub total_boxes: Decimal,
    pub sale_count: usize,
}

/// Sales grouped by market location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationSummary {
    pub location: String,
    pub count: usize,
    pub income: Decimal,
    pub profit: Decimal,
    pub boxes: Decimal,
}

/// Sales grouped by calendar date
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailySummary {
    pub date: NaiveDate,
    pub income: Decimal,
    pub profit: Decimal,
    pub boxes: Decimal,
}

/// How fast stock is moving, counted in market days actually attended
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesPace {
    pub since: NaiveDate,
    /// Distinct dates with at least one sale
    pub sale_days: usize,
    /// Rest days marked inside the window
    pub rest_days: usize,
    pub total_boxes: Decimal,
    pub avg_boxes_per_sale_day: Decimal,
    pub remaining_stock: Decimal,
    /// Market days needed to clear remaining stock at the current pace
    pub estimated_sale_days_left: Option<Decimal>,
}

/// Sell-through of one active lot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LotProgress {
    pub lot_id: LotId,
    pub fruit: String,
    pub boxes: Decimal,
    pub sold_boxes: Decimal,
    pub remain_boxes: Decimal,
    /// Rounded to a whole percent
    pub sold_percent: Decimal,
    pub days_since_purchase: i64,
    pub price_per_box: Decimal,
}
