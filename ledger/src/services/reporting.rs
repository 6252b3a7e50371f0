//! Reporting views over a ledger snapshot
//! Sales windows, per-location and per-day summaries, sell-through pace and CSV export

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{Duration, NaiveDate};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use shared::{
    DailySummary, LedgerSnapshot, LocationSummary, LotProgress, LotStatus, SaleRecord, SalesPace,
    SalesStats,
};

use crate::error::{LedgerError, LedgerResult};

/// Reporting service
#[derive(Debug, Clone, Copy)]
pub struct ReportingService<'a> {
    snapshot: &'a LedgerSnapshot,
    today: NaiveDate,
}

impl<'a> ReportingService<'a> {
    pub fn new(snapshot: &'a LedgerSnapshot, today: NaiveDate) -> Self {
        Self { snapshot, today }
    }

    /// First day inside a window of `days` days ending today. A window reaching
    /// past the earliest representable date starts there.
    pub fn window_start(&self, days: u32) -> NaiveDate {
        self.today
            .checked_sub_signed(Duration::days(i64::from(days)))
            .unwrap_or(NaiveDate::MIN)
    }

    fn sales_since(&self, since: NaiveDate) -> impl Iterator<Item = &'a SaleRecord> + 'a {
        self.snapshot.sales.iter().filter(move |sale| sale.date >= since)
    }

    /// Totals over sales dated within the last `days` days
    pub fn window_stats(&self, days: u32) -> SalesStats {
        let since = self.window_start(days);
        let mut stats = SalesStats {
            since: Some(since),
            ..SalesStats::default()
        };

        for sale in self.sales_since(since) {
            stats.total_income = stats.total_income.saturating_add(sale.total_income);
            stats.total_profit = stats.total_profit.saturating_add(sale.profit);
            stats.total_cost = stats.total_cost.saturating_add(sale.cost);
            stats.total_boxes = stats.total_boxes.saturating_add(sale.sell_boxes);
            stats.sale_count += 1;
        }
        stats
    }

    /// Per-location totals, most profitable first
    pub fn sales_by_location(&self, days: u32) -> Vec<LocationSummary> {
        let mut by_location: HashMap<&str, LocationSummary> = HashMap::new();

        for sale in self.sales_since(self.window_start(days)) {
            let entry = by_location
                .entry(sale.location.as_str())
                .or_insert_with(|| LocationSummary {
                    location: sale.location.clone(),
                    count: 0,
                    income: Decimal::ZERO,
                    profit: Decimal::ZERO,
                    boxes: Decimal::ZERO,
                });
            entry.count += 1;
            entry.income = entry.income.saturating_add(sale.total_income);
            entry.profit = entry.profit.saturating_add(sale.profit);
            entry.boxes = entry.boxes.saturating_add(sale.sell_boxes);
        }

        let mut summaries: Vec<_> = by_location.into_values().collect();
        summaries.sort_by(|a, b| {
            b.profit
                .cmp(&a.profit)
                .then_with(|| a.location.cmp(&b.location))
        });
        summaries
    }

    /// Per-day totals, newest day first
    pub fn sales_by_date(&self, days: u32) -> Vec<DailySummary> {
        let mut by_date: BTreeMap<NaiveDate, DailySummary> = BTreeMap::new();

        for sale in self.sales_since(self.window_start(days)) {
            let entry = by_date.entry(sale.date).or_insert_with(|| DailySummary {
                date: sale.date,
                income: Decimal::ZERO,
                profit: Decimal::ZERO,
                boxes: Decimal::ZERO,
            });
            entry.income = entry.income.saturating_add(sale.total_income);
            entry.profit = entry.profit.saturating_add(sale.profit);
            entry.boxes = entry.boxes.saturating_add(sale.sell_boxes);
        }

        by_date.into_values().rev().collect()
    }

    /// Boxes moved per market day actually worked, and how long current stock lasts at that rate
    pub fn sales_pace(&self, days: u32) -> SalesPace {
        let since = self.window_start(days);

        let mut sale_days = BTreeSet::new();
        let mut total_boxes = Decimal::ZERO;
        for sale in self.sales_since(since) {
            sale_days.insert(sale.date);
            total_boxes = total_boxes.saturating_add(sale.sell_boxes);
        }

        let rest_days = self
            .snapshot
            .rest_days
            .iter()
            .filter(|day| **day >= since && **day <= self.today)
            .count();

        let remaining_stock: Decimal = self
            .snapshot
            .inventory
            .iter()
            .filter(|lot| lot.status == LotStatus::Active)
            .fold(Decimal::ZERO, |sum, lot| sum.saturating_add(lot.remain_boxes));

        let avg_boxes_per_sale_day = if sale_days.is_empty() {
            Decimal::ZERO
        } else {
            (total_boxes / Decimal::from(sale_days.len()))
                .round_dp_with_strategy(1, RoundingStrategy::MidpointAwayFromZero)
        };

        let estimated_sale_days_left = remaining_stock
            .checked_div(avg_boxes_per_sale_day)
            .map(|days| days.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero));

        SalesPace {
            since,
            sale_days: sale_days.len(),
            rest_days,
            total_boxes,
            avg_boxes_per_sale_day,
            remaining_stock,
            estimated_sale_days_left,
        }
    }

    /// Sell-through for each active lot, in ledger order
    pub fn lot_progress(&self) -> Vec<LotProgress> {
        self.snapshot
            .inventory
            .iter()
            .filter(|lot| lot.status == LotStatus::Active)
            .map(|lot| {
                let sold_boxes = lot.sold_boxes();
                let sold_percent = sold_boxes
                    .checked_div(lot.boxes)
                    .and_then(|share| share.checked_mul(Decimal::ONE_HUNDRED))
                    .map_or(Decimal::ZERO, |percent| {
                        percent.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
                    });
                LotProgress {
                    lot_id: lot.id.clone(),
                    fruit: lot.fruit.clone(),
                    boxes: lot.boxes,
                    sold_boxes,
                    remain_boxes: lot.remain_boxes,
                    sold_percent,
                    days_since_purchase: (self.today - lot.date).num_days(),
                    price_per_box: lot.price_per_box,
                }
            })
            .collect()
    }

    /// All sale records as CSV with a header row
    pub fn export_sales_csv(&self) -> LedgerResult<String> {
        export_to_csv(&self.snapshot.sales)
    }
}

/// Render rows as CSV; the header comes from the serialized field names
pub fn export_to_csv<T: Serialize>(data: &[T]) -> LedgerResult<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    for record in data {
        wtr.serialize(record)
            .map_err(|e| LedgerError::Export(format!("CSV serialization error: {}", e)))?;
    }
    let csv_data = String::from_utf8(
        wtr.into_inner()
            .map_err(|e| LedgerError::Export(format!("CSV writer error: {}", e)))?,
    )
    .map_err(|e| LedgerError::Export(format!("UTF-8 conversion error: {}", e)))?;
    Ok(csv_data)
}
