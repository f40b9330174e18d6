//! TickerLab CLI — collect, reload and inspect market bars.
//!
//! Commands:
//! - `collect` — fetch bars for a list of instruments, derive features, replace the relation
//! - `load` — reload a relation with filters and ordering, print or export it
//! - `tickers` — list tradable instruments for a fiat market
//! - `prices` — current prices for instruments
//! - `status` — relations stored in a database

mod logging;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tickerlab_core::data::{QuoteClient, SyntheticQuoteClient, UpbitClient};
use tickerlab_core::domain::Interval;
use tickerlab_runner::{
    render_table, run_pipeline, write_csv, CollectConfig, Filter, OrderBy, SqliteStore,
    ThreadSleepPacer, TracingProgress,
};

#[derive(Parser)]
#[command(
    name = "tickerlab",
    about = "TickerLab CLI — market bar collection, feature derivation and SQLite storage"
)]
struct Cli {
    /// Log level or filter directive. TICKERLAB_LOG takes precedence.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Log output format: text or json.
    #[arg(long, global = true, default_value = "text")]
    log_format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Collect bars, derive features and replace the relation.
    Collect {
        /// Instruments (e.g., KRW-BTC KRW-ETH).
        /// Defaults to the config or KRW-PUNDIX KRW-USD1 KRW-BAT.
        instruments: Vec<String>,

        /// Bars per instrument. Defaults to 30.
        #[arg(long)]
        count: Option<usize>,

        /// Bar interval: minute1/3/5/10/15/30/60/240, day, week, month.
        #[arg(long)]
        interval: Option<Interval>,

        /// Pause between instruments in milliseconds. Defaults to 100.
        #[arg(long)]
        delay_ms: Option<u64>,

        /// Database file. Defaults to ./crypto_data.db.
        #[arg(long)]
        db: Option<PathBuf>,

        /// Relation name. Defaults to market_bars.
        #[arg(long)]
        relation: Option<String>,

        /// TOML config file; command-line flags override it.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Use the offline synthetic quote client.
        #[arg(long, default_value_t = false)]
        synthetic: bool,

        /// Rows per instrument to print after reload.
        #[arg(long, default_value_t = 5)]
        head: usize,
    },
    /// Reload a relation with optional filters and ordering.
    Load {
        /// Database file.
        #[arg(long, default_value = "crypto_data.db")]
        db: PathBuf,

        /// Relation name.
        #[arg(long, default_value = "market_bars")]
        relation: String,

        /// Filter condition, repeatable (e.g., --where "close>=100" --where "ticker=KRW-BTC").
        #[arg(long = "where")]
        conditions: Vec<String>,

        /// Sort key, repeatable (e.g., --order-by "date_str desc"). Defaults to date_str desc.
        #[arg(long)]
        order_by: Vec<String>,

        /// Rows per instrument to print.
        #[arg(long, default_value_t = 100)]
        head: usize,

        /// Also write every reloaded row to this CSV file.
        #[arg(long)]
        csv: Option<PathBuf>,
    },
    /// List tradable instruments quoted in a fiat currency.
    Tickers {
        #[arg(long, default_value = "KRW")]
        fiat: String,

        #[arg(long, default_value_t = false)]
        synthetic: bool,
    },
    /// Current prices for instruments.
    Prices {
        #[arg(required = true)]
        instruments: Vec<String>,

        #[arg(long, default_value_t = false)]
        synthetic: bool,
    },
    /// List relations stored in a database.
    Status {
        #[arg(long, default_value = "crypto_data.db")]
        db: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_tracing(&cli.log_level, &cli.log_format)?;

    match cli.command {
        Commands::Collect {
            instruments,
            count,
            interval,
            delay_ms,
            db,
            relation,
            config,
            synthetic,
            head,
        } => {
            let mut cfg = match config {
                Some(path) => CollectConfig::from_file(&path)?,
                None => CollectConfig::default(),
            };
            if !instruments.is_empty() {
                cfg.instruments = instruments;
            }
            if let Some(count) = count {
                cfg.bar_count = count;
            }
            if let Some(interval) = interval {
                cfg.interval = interval;
            }
            if let Some(delay_ms) = delay_ms {
                cfg.delay_ms = delay_ms;
            }
            if let Some(db) = db {
                cfg.store.db_path = db;
            }
            if let Some(relation) = relation {
                cfg.store.relation = relation;
            }
            cfg.validate()?;
            run_collect(&cfg, synthetic, head)
        }
        Commands::Load {
            db,
            relation,
            conditions,
            order_by,
            head,
            csv,
        } => run_load(&db, &relation, &conditions, &order_by, head, csv.as_deref()),
        Commands::Tickers { fiat, synthetic } => run_tickers(&fiat, synthetic),
        Commands::Prices {
            instruments,
            synthetic,
        } => run_prices(&instruments, synthetic),
        Commands::Status { db } => run_status(&db),
    }
}

fn make_client(synthetic: bool) -> Result<Box<dyn QuoteClient>> {
    if synthetic {
        let anchor = chrono::Local::now()
            .date_naive()
            .and_hms_opt(9, 0, 0)
            .context("invalid synthetic anchor time")?;
        return Ok(Box::new(SyntheticQuoteClient::new(anchor)));
    }
    Ok(Box::new(UpbitClient::new()?))
}

fn run_collect(cfg: &CollectConfig, synthetic: bool, head: usize) -> Result<()> {
    tracing::debug!(config = ?cfg, synthetic, "resolved collect config");
    let client = make_client(synthetic)?;
    let mut store = SqliteStore::open(&cfg.store.db_path)?;
    let tickers = cfg.instrument_refs();

    println!("Instruments: {}", tickers.join(", "));

    let result = run_pipeline(
        client.as_ref(),
        ThreadSleepPacer,
        &mut store,
        &cfg.store.relation,
        &tickers,
        &cfg.collect_options(),
        &TracingProgress,
    )?;

    println!("\nCurrent prices ({}):", client.name());
    for (ticker, price) in &result.prices {
        match price {
            Some(p) => println!("  {ticker}: {}", format_price(*p)),
            None => println!("  {ticker}: unavailable"),
        }
    }

    let failed = result.failed_instruments();
    if !failed.is_empty() {
        eprintln!("\nSkipped instruments: {}", failed.join(", "));
    }

    println!(
        "\nPersisted {} rows to '{}' in {}",
        result.persisted,
        result.relation,
        cfg.store.db_path.display()
    );
    if head > 0 {
        print!("{}", render_table(&result.reloaded, head));
    }
    Ok(())
}

fn run_load(
    db: &Path,
    relation: &str,
    conditions: &[String],
    order_by: &[String],
    head: usize,
    csv: Option<&Path>,
) -> Result<()> {
    if !db.exists() {
        anyhow::bail!("database does not exist: {}", db.display());
    }
    let filter = Filter::parse_all(conditions)?;
    let order = if order_by.is_empty() {
        OrderBy::newest_first()
    } else {
        OrderBy::parse_all(order_by)?
    };

    let store = SqliteStore::open(db)?;
    let table = store.load(relation, &filter, &order)?;

    println!("{} rows from '{relation}'", table.len());
    if head > 0 && !table.is_empty() {
        print!("{}", render_table(&table, head));
    }
    if let Some(path) = csv {
        write_csv(&table, path)?;
        println!("CSV written to: {}", path.display());
    }
    Ok(())
}

fn run_tickers(fiat: &str, synthetic: bool) -> Result<()> {
    let client = make_client(synthetic)?;
    let tickers = client.instruments(fiat)?;
    for ticker in &tickers {
        println!("{ticker}");
    }
    eprintln!("{} instruments quoted in {}", tickers.len(), fiat.to_uppercase());
    Ok(())
}

fn run_prices(instruments: &[String], synthetic: bool) -> Result<()> {
    let client = make_client(synthetic)?;
    let refs: Vec<&str> = instruments.iter().map(|s| s.as_str()).collect();
    let prices = client.current_prices(&refs)?;
    for (ticker, price) in &prices {
        println!("{ticker}: {}", format_price(*price));
    }
    Ok(())
}

fn run_status(db: &Path) -> Result<()> {
    if !db.exists() {
        println!("Database does not exist: {}", db.display());
        return Ok(());
    }
    let store = SqliteStore::open(db)?;
    let relations = store.relations()?;

    println!("Database: {}", db.display());
    if relations.is_empty() {
        println!("No relations.");
        return Ok(());
    }
    println!(
        "{:<20} {:>8}  {:<16}  persisted at",
        "relation", "rows", "data hash"
    );
    for info in &relations {
        println!(
            "{:<20} {:>8}  {:<16}  {}",
            info.name,
            info.row_count,
            &info.data_hash[..info.data_hash.len().min(16)],
            info.persisted_at
        );
    }
    Ok(())
}

/// Thousands separators on the integer part, up to 8 decimals.
fn format_price(price: f64) -> String {
    if !price.is_finite() {
        return price.to_string();
    }
    let text = format!("{:.8}", price.abs());
    let (int_part, frac_part) = text.split_once('.').unwrap_or((text.as_str(), ""));
    let frac = frac_part.trim_end_matches('0');

    let mut grouped = String::new();
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if price < 0.0 { "-" } else { "" };
    if frac.is_empty() {
        format!("{sign}{grouped}")
    } else {
        format!("{sign}{grouped}.{frac}")
    }
}
