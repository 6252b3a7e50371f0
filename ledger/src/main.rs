//! Stall ledger CLI - inventory, sales and backups from the terminal.
//!
//! # Usage
//!
//! ```bash
//! # Record a purchase of 50 boxes at 80 each
//! stall-ledger add-lot --fruit 梨 --boxes 50 --price 80
//!
//! # Sell 20 boxes from that lot
//! stall-ledger sell --lot <LOT_ID> --boxes 20 --location 东门 --cash 400
//!
//! # Check stock and slot health
//! stall-ledger stock
//! stall-ledger doctor
//! ```
//!
//! Every command prints JSON on stdout. Logs go to stderr.

#![cfg_attr(not(test), forbid(unsafe_code))]

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::json;
use shared::{InventoryUpdate, LotId, NewInventoryLot, NewSaleRecord, SaleId, SaleUpdate};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use stall_ledger::{
    Committed, FileStorage, LedgerConfig, LedgerResult, LedgerService, LedgerStore, SlotLayout,
};

#[derive(Parser)]
#[command(name = "stall-ledger")]
#[command(author, version, about = "Offline ledger for a fruit stall")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record a purchased lot
    AddLot {
        /// Purchase date, defaults to today
        #[arg(long)]
        date: Option<NaiveDate>,

        #[arg(short, long)]
        fruit: String,

        #[arg(short, long)]
        boxes: Decimal,

        /// Price per box
        #[arg(short, long)]
        price: Decimal,
    },
    /// Edit a lot's name, size or price
    EditLot {
        id: LotId,

        #[arg(short, long)]
        fruit: Option<String>,

        #[arg(short, long)]
        boxes: Option<Decimal>,

        #[arg(short, long)]
        price: Option<Decimal>,
    },
    /// Delete a lot that has no sales
    DeleteLot { id: LotId },
    /// Record a sale from a lot
    Sell {
        /// Sale date, defaults to today
        #[arg(long)]
        date: Option<NaiveDate>,

        #[arg(short = 'i', long = "lot")]
        lot: LotId,

        #[arg(short, long)]
        boxes: Decimal,

        #[arg(short, long)]
        location: String,

        #[arg(long, default_value = "0")]
        cash: Decimal,

        #[arg(long, default_value = "0")]
        alipay: Decimal,

        #[arg(long, default_value = "0")]
        wechat: Decimal,
    },
    /// Edit a sale; only the given fields change
    EditSale {
        id: SaleId,

        #[arg(short, long)]
        boxes: Option<Decimal>,

        #[arg(short, long)]
        location: Option<String>,

        #[arg(long)]
        cash: Option<Decimal>,

        #[arg(long)]
        alipay: Option<Decimal>,

        #[arg(long)]
        wechat: Option<Decimal>,
    },
    /// Delete a sale and return its boxes to the lot
    DeleteSale { id: SaleId },
    /// Mark or unmark days off the market
    RestDay {
        #[command(subcommand)]
        action: RestDayAction,
    },
    /// Active lots and total boxes in stock
    Stock,
    /// Income, cost and profit over a trailing window
    Stats {
        #[arg(short, long)]
        days: Option<u32>,
    },
    /// Sales grouped by location
    ByLocation {
        #[arg(short, long)]
        days: Option<u32>,
    },
    /// Sales grouped by day
    ByDate {
        #[arg(short, long)]
        days: Option<u32>,
    },
    /// Boxes per market day and days of stock left
    Pace {
        #[arg(short, long)]
        days: Option<u32>,
    },
    /// Write all sales as CSV
    ExportCsv {
        /// Output file, stdout when omitted
        #[arg(short, long)]
        output: Option<std::path::PathBuf>,
    },
    /// Show the state of every storage slot
    Doctor,
    /// Copy the current ledger into the emergency slot
    EmergencyBackup,
}

#[derive(Subcommand)]
enum RestDayAction {
    Add { date: NaiveDate },
    Remove { date: NaiveDate },
}

fn main() {
    dotenvy::dotenv().ok();

    let config = match LedgerConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(2);
        }
    };
    init_tracing(&config);

    let cli = Cli::parse();

    if let Err(e) = run(cli, &config) {
        tracing::error!("Command failed: {e:#}");
        std::process::exit(1);
    }
}

fn init_tracing(config: &LedgerConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| config.logging.filter.as_str().into());
    let registry = tracing_subscriber::registry().with(filter);

    if config.logging.json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn run(cli: Cli, config: &LedgerConfig) -> anyhow::Result<()> {
    let storage = FileStorage::open(config.storage.data_dir.clone()).with_context(|| {
        format!("opening data directory {}", config.storage.data_dir.display())
    })?;
    let store = LedgerStore::new(storage).with_layout(SlotLayout::new(&config.storage.base_key));
    let mut ledger = LedgerService::open(store);

    tracing::debug!(
        environment = %config.environment,
        source = ?ledger.recovered_from(),
        repaired = ledger.was_repaired(),
        "ledger opened"
    );

    let today = ledger.store().clock().today();
    let window = |days: Option<u32>| days.unwrap_or(config.reporting.default_window_days);

    match cli.command {
        Commands::AddLot {
            date,
            fruit,
            boxes,
            price,
        } => respond(ledger.add_inventory(NewInventoryLot {
            date: date.unwrap_or(today),
            fruit,
            boxes,
            price_per_box: price,
        }))?,
        Commands::EditLot {
            id,
            fruit,
            boxes,
            price,
        } => respond(ledger.update_inventory(
            &id,
            InventoryUpdate {
                fruit,
                boxes,
                price_per_box: price,
            },
        ))?,
        Commands::DeleteLot { id } => respond(ledger.delete_inventory(&id))?,
        Commands::Sell {
            date,
            lot,
            boxes,
            location,
            cash,
            alipay,
            wechat,
        } => respond(ledger.add_sale(NewSaleRecord {
            date: date.unwrap_or(today),
            location,
            inventory_id: lot,
            sell_boxes: boxes,
            cash,
            alipay,
            wechat,
        }))?,
        Commands::EditSale {
            id,
            boxes,
            location,
            cash,
            alipay,
            wechat,
        } => {
            let update = SaleUpdate {
                location,
                sell_boxes: boxes,
                cash,
                alipay,
                wechat,
            };
            if update.is_empty() {
                anyhow::bail!("edit-sale needs at least one field to change");
            }
            respond(ledger.update_sale(&id, update))?
        }
        Commands::DeleteSale { id } => respond(ledger.delete_sale(&id))?,
        Commands::RestDay { action } => {
            let committed = match action {
                RestDayAction::Add { date } => ledger.add_rest_day(date),
                RestDayAction::Remove { date } => ledger.remove_rest_day(date),
            };
            respond(Ok(committed))?
        }
        Commands::Stock => print_json(&json!({
            "totalStock": ledger.total_stock(),
            "lots": ledger.reporting().lot_progress(),
        }))?,
        Commands::Stats { days } => print_json(&ledger.stats_over_window(window(days)))?,
        Commands::ByLocation { days } => {
            print_json(&ledger.reporting().sales_by_location(window(days)))?
        }
        Commands::ByDate { days } => print_json(&ledger.reporting().sales_by_date(window(days)))?,
        Commands::Pace { days } => print_json(&ledger.reporting().sales_pace(window(days)))?,
        Commands::ExportCsv { output } => {
            let csv = ledger.reporting().export_sales_csv()?;
            match output {
                Some(path) => std::fs::write(&path, csv)
                    .with_context(|| format!("writing {}", path.display()))?,
                None => print!("{csv}"),
            }
        }
        Commands::Doctor => print_json(&ledger.store().diagnostics())?,
        Commands::EmergencyBackup => {
            let written = ledger.emergency_backup();
            print_json(&json!({ "success": written }))?;
            if !written {
                anyhow::bail!("emergency slot could not be written");
            }
        }
    }
    Ok(())
}

/// Print a mutation outcome; a rejected operation prints its error body and fails the command
fn respond<T: Serialize>(result: LedgerResult<Committed<T>>) -> anyhow::Result<()> {
    match result {
        Ok(committed) => {
            let persisted = committed.is_durable();
            print_json(&json!({
                "success": true,
                "data": committed.value,
                "persisted": persisted,
                "save": committed.save,
            }))?;
            if !persisted {
                tracing::warn!("change was not written to the primary slot");
            }
            Ok(())
        }
        Err(e) => {
            print_json(&e.to_response())?;
            Err(e.into())
        }
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
