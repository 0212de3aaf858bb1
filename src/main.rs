mod alerts;
mod config;
mod display;
mod error;
mod extract;
mod heuristics;
mod identity;
mod ledger;
mod ledger_db;
mod period_log;
mod reconcile;

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use time::OffsetDateTime;
use tracing::{info, warn};

use config::Config;
use display::StockFilter;
use extract::{DocumentText, TextExtractor};
use identity::{Confirmation, ManualOverride};
use ledger::{Action, Category, Ledger, LedgerKey, Location, QuantityKind};
use ledger_db::LedgerStore;
use period_log::{PeriodLabel, PeriodLog};
use reconcile::{Outcome, StockRequest};

#[derive(Debug, Parser)]
#[command(name = "pharmacy_stock", about = "Pharmacy stock ledger")]
struct Cli {
    #[arg(long, default_value = ".config/pharmacy_stock.toml")]
    config: PathBuf,

    /// Overrides `db_path` from the config file.
    #[arg(long)]
    db: Option<PathBuf>,

    /// Overrides `low_stock_threshold` from the config file.
    #[arg(long)]
    threshold: Option<u32>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Read a product label photo and book it into the ledger
    Identify {
        image: PathBuf,
        #[command(flatten)]
        entry: EntryArgs,
        /// Skip the estimate and use this count (exact)
        #[arg(long, conflicts_with_all = ["confirm", "correct", "unsure"])]
        qty: Option<u32>,
        /// Accept the estimated count as exact
        #[arg(long, conflicts_with_all = ["correct", "unsure"])]
        confirm: bool,
        /// Reject the estimate and use this count (exact)
        #[arg(long, conflicts_with = "unsure")]
        correct: Option<u32>,
        /// Keep the estimated count, marked as estimated
        #[arg(long)]
        unsure: bool,
    },
    /// Book a manually typed entry
    Record {
        #[command(flatten)]
        entry: EntryArgs,
        #[arg(long)]
        qty: u32,
    },
    /// Receive every product line of an invoice into the warehouse
    Invoice { file: PathBuf },
    /// Show the ledger
    View {
        #[arg(long, value_enum, default_value_t = StockFilter::All)]
        filter: StockFilter,
        #[arg(long)]
        json: bool,
    },
    /// Net change per product for one month
    Changes {
        /// e.g. "March 2025" or "2025-03"; defaults to the current month
        #[arg(long)]
        period: Option<PeriodLabel>,
    },
}

#[derive(Debug, Args)]
struct EntryArgs {
    #[arg(long)]
    name: Option<String>,
    /// Empty string records the product as unbranded
    #[arg(long)]
    brand: Option<String>,
    #[arg(long, value_parser = parse_category)]
    category: Option<Category>,
    #[arg(long, value_parser = parse_location_arg, default_value = "0")]
    location: Location,
    #[arg(long, value_parser = parse_action, default_value = "add")]
    action: Action,
}

impl EntryArgs {
    fn manual(&self) -> ManualOverride {
        ManualOverride {
            name: self.name.clone(),
            brand: self.brand.clone(),
            category: self.category,
        }
    }
}

fn parse_category(s: &str) -> Result<Category, String> {
    Category::parse(s).ok_or_else(|| format!("unknown category `{s}`"))
}

fn parse_location_arg(s: &str) -> Result<Location, String> {
    display::parse_location(s).ok_or_else(|| format!("unknown location `{s}` (0 warehouse, 1 store, 2 shelf)"))
}

fn parse_action(s: &str) -> Result<Action, String> {
    match s.trim().to_lowercase().as_str() {
        "add" | "+" => Ok(Action::Add),
        "remove" | "-" => Ok(Action::Remove),
        _ => Err(format!("unknown action `{s}` (add or remove)")),
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // init tracing
    tracing_subscriber::fmt()
        .with_target(true)
        .with_level(true)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let cfg = Config::load_or_default(&cli.config)?;
    let threshold = cli.threshold.unwrap_or(cfg.low_stock_threshold);
    let db_path = cli.db.clone().unwrap_or_else(|| PathBuf::from(&cfg.db_path));

    let mut store = LedgerStore::open(&db_path)?;
    if let Some(dir) = cfg.snapshot_dir() {
        store = store.with_snapshot_dir(dir);
    }

    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    let period = PeriodLabel::containing(now);

    match cli.command {
        Command::Identify {
            image,
            entry,
            qty,
            confirm,
            correct,
            unsure,
        } => {
            let fragments = cfg.ocr().extract(&image)?;
            let candidate = identity::pick_candidate(&fragments).unwrap_or("");
            if candidate.is_empty() && entry.name.is_none() {
                return Err(format!("no text recognised in {}; pass --name", image.display()).into());
            }
            let id = identity::resolve(candidate, &entry.manual(), &cfg.classifier());
            match id.brand_score {
                Some(score) => info!(name = %id.name, brand = id.brand_or_blank(), score, "Identified product"),
                None => info!(name = %id.name, brand = id.brand_or_blank(), "Identified product"),
            }

            let key = LedgerKey::new(id.name.as_str(), id.brand_or_blank(), entry.location);
            let (current, _) = store.load()?;
            match current.get(&key) {
                Some(row) => println!("{key}: {} in stock ({})", row.quantity, row.quantity_kind.as_str()),
                None => println!("{key}: not in the ledger yet"),
            }

            let mut warnings = Vec::new();
            let (quantity, quantity_kind) = match qty {
                Some(typed) => (typed, QuantityKind::Exact),
                None => {
                    let estimate = identity::estimate_quantity(&fragments);
                    warnings.extend(estimate.warning.clone());
                    let answer = if confirm {
                        Confirmation::Confirmed
                    } else if let Some(value) = correct {
                        Confirmation::Corrected(value)
                    } else if unsure {
                        Confirmation::Unsure
                    } else {
                        ask_confirmation(&id.name, estimate.value)?
                    };
                    estimate.settle(answer)
                }
            };

            let request = StockRequest {
                key,
                action: entry.action,
                quantity,
                quantity_kind,
                category: id.category_update(),
            };
            let outcomes = run_cycle(&mut store, &[request], now, period)?;
            report(&outcomes, &warnings, threshold);
        }
        Command::Record { entry, qty } => {
            let Some(name) = entry.name.as_deref().map(str::trim).filter(|n| !n.is_empty()) else {
                return Err("record needs --name".into());
            };
            let id = identity::resolve(name, &entry.manual(), &cfg.classifier());
            let request = StockRequest {
                key: LedgerKey::new(id.name.as_str(), id.brand_or_blank(), entry.location),
                action: entry.action,
                quantity: qty,
                quantity_kind: QuantityKind::Exact,
                category: id.category_update(),
            };
            let outcomes = run_cycle(&mut store, &[request], now, period)?;
            report(&outcomes, &[], threshold);
        }
        Command::Invoice { file } => {
            let outcomes = ingest_invoice(&mut store, &cfg, &file, now, period)?;
            report(&outcomes, &[], threshold);
        }
        Command::View { filter, json } => {
            let (ledger, _) = store.load()?;
            let rows = filter.select(&ledger, threshold);
            if json {
                let views: Vec<display::RecordView<'_>> = rows.iter().map(|r| display::RecordView::from(*r)).collect();
                println!("{}", serde_json::to_string_pretty(&views)?);
            } else {
                println!("{}", display::render_table(&rows));
                if let Some(alert) = alerts::surface(&ledger, threshold) {
                    println!("\n{}", display::format_alert(&alert));
                }
                let low_totals = alerts::total_low(&ledger, threshold);
                if !low_totals.is_empty() {
                    let names: Vec<String> = low_totals.iter().map(|(name, total)| format!("{name} ({total})")).collect();
                    println!("Low across all locations: {}", names.join(", "));
                }
            }
            let (records, changes) = store.counts()?;
            info!(records, changes, shown = rows.len(), "Ledger statistics");
        }
        Command::Changes { period: requested } => {
            let (_, log) = store.load()?;
            let period = requested.unwrap_or(period);
            println!("{}", display::render_period(period, &log.entries_for_period(period)));
        }
    }

    Ok(())
}

/// One load, every request committed in order, one save. Any failure
/// leaves the stored ledger as it was.
fn run_cycle(
    store: &mut LedgerStore,
    requests: &[StockRequest],
    at: OffsetDateTime,
    period: PeriodLabel,
) -> Result<Vec<Outcome>, Box<dyn std::error::Error>> {
    let (mut ledger, mut log): (Ledger, PeriodLog) = store.load()?;
    let mut outcomes = Vec::with_capacity(requests.len());
    for request in requests {
        let done = reconcile::commit(&ledger, &log, request, at, period)?;
        ledger = done.ledger;
        log = done.log;
        outcomes.push(done.outcome);
    }
    store.save(&ledger, &log, at)?;
    Ok(outcomes)
}

fn ingest_invoice(
    store: &mut LedgerStore,
    cfg: &Config,
    file: &Path,
    at: OffsetDateTime,
    period: PeriodLabel,
) -> Result<Vec<Outcome>, Box<dyn std::error::Error>> {
    let reader = DocumentText::new(cfg.ocr());
    let text = reader.extract(file)?.join("\n");
    let data = heuristics::extract_invoice(&text, &cfg.classifier());
    let (parsed, marked) = data.coverage();
    info!(file = %file.display(), parsed, marked, "Invoice scanned");

    for line in &data.lines {
        if let Some(warning) = &line.warning {
            warn!(product = %line.product_name, "{warning}");
        }
    }
    if data.lines.is_empty() {
        println!("No product lines found in {}", file.display());
        return Ok(Vec::new());
    }
    run_cycle(store, &data.requests(Location::Warehouse), at, period)
}

/// Yes keeps the estimate as exact, a number replaces it, anything
/// else keeps it as an estimate.
fn ask_confirmation(name: &str, estimate: u32) -> io::Result<Confirmation> {
    print!("Quantity for '{name}' looks like {estimate}. Correct? [y]es / [u]nsure / or type the count: ");
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    let answer = answer.trim();
    Ok(match answer.to_lowercase().as_str() {
        "y" | "yes" | "ναι" => Confirmation::Confirmed,
        other => match other.parse::<u32>() {
            Ok(value) if value > 0 => Confirmation::Corrected(value),
            _ => Confirmation::Unsure,
        },
    })
}

fn report(outcomes: &[Outcome], extra: &[error::Warning], threshold: u32) {
    for warning in extra {
        println!("warning: {warning}");
    }
    for outcome in outcomes {
        println!("{}", display::format_outcome(outcome));
        for warning in &outcome.warnings {
            println!("warning: {warning}");
        }
        if outcome.total_after <= u64::from(threshold) {
            println!(
                "low stock: only {} of '{}' left across all locations",
                outcome.total_after, outcome.key.product_name
            );
        }
    }
}
