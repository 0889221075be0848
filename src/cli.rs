//! CLI definition and dispatch.

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use std::collections::BTreeSet;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::console_report_adapter::ConsoleReportAdapter;
use crate::adapters::csv_adapter::CsvPriceAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::json_report_adapter::JsonReportAdapter;
use crate::adapters::transaction_csv_adapter::TransactionCsvAdapter;
use crate::domain::config_validation::validate_session_config;
use crate::domain::error::PerfolioError;
use crate::domain::ledger::Ledger;
use crate::domain::operation::{OperationContext, OperationKind, OperationSettings};
use crate::domain::price_oracle::{PriceOracle, PriceScope};
use crate::domain::report::Report;
use crate::domain::session::{PriceSourceConfig, ReportFormat, SessionConfig};
use crate::ports::config_port::ConfigPort;
use crate::ports::price_port::PricePort;
use crate::ports::report_port::ReportPort;

#[derive(Parser, Debug)]
#[command(name = "perfolio", about = "Portfolio performance analysis")]
pub struct Cli {
    /// Debug-level logging on stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Where the session comes from. Flags override the config file.
#[derive(Args, Debug, Clone, Default)]
pub struct SessionArgs {
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// Transaction CSV
    #[arg(long)]
    pub ledger: Option<PathBuf>,
    /// Directory of per-symbol price CSVs
    #[arg(long)]
    pub prices: Option<PathBuf>,
    /// text or json
    #[arg(long)]
    pub format: Option<String>,
    /// close or open
    #[arg(long)]
    pub field: Option<String>,
    /// Single-line JSON output
    #[arg(long)]
    pub compact: bool,
}

#[derive(Args, Debug, Clone, Default)]
pub struct RangeArgs {
    /// Start of the period, exclusive (default: one year ago)
    #[arg(long)]
    pub from: Option<NaiveDate>,
    /// End of the period, inclusive (default: today)
    #[arg(long)]
    pub to: Option<NaiveDate>,
}

impl RangeArgs {
    fn settings(&self) -> OperationSettings {
        let mut settings = OperationSettings::new();
        if let Some(from) = self.from {
            settings.set("from", from);
        }
        if let Some(to) = self.to {
            settings.set("to", to);
        }
        settings
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Time-weighted return over a period
    Twr {
        #[command(flatten)]
        session: SessionArgs,
        #[command(flatten)]
        range: RangeArgs,
    },
    /// Money-weighted return over a period
    Mwr {
        #[command(flatten)]
        session: SessionArgs,
        #[command(flatten)]
        range: RangeArgs,
    },
    /// Holdings and their value at a date
    Holdings {
        #[command(flatten)]
        session: SessionArgs,
        /// Valuation date (default: today)
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Transactions in a period
    Transactions {
        #[command(flatten)]
        session: SessionArgs,
        #[command(flatten)]
        range: RangeArgs,
    },
    /// Change in holdings over a period
    HoldingsDiff {
        #[command(flatten)]
        session: SessionArgs,
        #[command(flatten)]
        range: RangeArgs,
    },
    /// Validate configuration and ledger without computing anything
    Validate {
        #[command(flatten)]
        session: SessionArgs,
    },
    /// List available operations and their settings
    Operations,
    /// Copy CSV prices for the ledger's symbols into a SQLite price store
    #[cfg(feature = "sqlite")]
    ImportPrices {
        /// Transaction CSV whose symbols are imported
        #[arg(long)]
        ledger: PathBuf,
        /// Directory of per-symbol price CSVs
        #[arg(long)]
        prices: PathBuf,
        /// SQLite database to write (created if missing)
        #[arg(long)]
        db: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    let today = chrono::Local::now().date_naive();
    let stdout = io::stdout();
    let mut out = stdout.lock();

    let result = match cli.command {
        Command::Twr { session, range } => {
            run_operation(OperationKind::CalculateTwr, &range.settings(), &session, today, &mut out)
        }
        Command::Mwr { session, range } => {
            run_operation(OperationKind::CalculateMwr, &range.settings(), &session, today, &mut out)
        }
        Command::Holdings { session, date } => {
            let mut settings = OperationSettings::new();
            if let Some(date) = date {
                settings.set("date", date);
            }
            run_operation(OperationKind::ViewHoldings, &settings, &session, today, &mut out)
        }
        Command::Transactions { session, range } => run_operation(
            OperationKind::ViewTransactions,
            &range.settings(),
            &session,
            today,
            &mut out,
        ),
        Command::HoldingsDiff { session, range } => run_operation(
            OperationKind::ViewHoldingsDiff,
            &range.settings(),
            &session,
            today,
            &mut out,
        ),
        Command::Validate { session } => run_validate(&session, &mut out),
        Command::Operations => list_operations(today, &mut out),
        #[cfg(feature = "sqlite")]
        Command::ImportPrices { ledger, prices, db } => {
            import_prices(&ledger, &prices, &db, today, &mut out)
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e}");
            (&e).into()
        }
    }
}

/// Loads the config file (if any) and applies flag overrides on top.
pub fn load_config(args: &SessionArgs) -> Result<FileConfigAdapter, PerfolioError> {
    let mut config = match &args.config {
        Some(path) => {
            tracing::info!(path = %path.display(), "loading config");
            FileConfigAdapter::from_file(path)?
        }
        None => FileConfigAdapter::empty(),
    };

    if let Some(ledger) = &args.ledger {
        config.set("ledger", "path", &ledger.display().to_string());
    }
    if let Some(prices) = &args.prices {
        config.set("prices", "source", "csv");
        config.set("prices", "directory", &prices.display().to_string());
    }
    if let Some(format) = &args.format {
        config.set("report", "format", format);
    }
    if let Some(field) = &args.field {
        config.set("prices", "field", field);
    }
    if args.compact {
        config.set("report", "pretty", "false");
    }
    Ok(config)
}

pub fn build_session_config(config: &dyn ConfigPort) -> Result<SessionConfig, PerfolioError> {
    validate_session_config(config)?;
    SessionConfig::from_config(config)
}

pub fn build_price_port(source: &PriceSourceConfig) -> Result<Box<dyn PricePort>, PerfolioError> {
    match source {
        PriceSourceConfig::Csv { directory } => {
            if !directory.is_dir() {
                return Err(PerfolioError::PriceSource {
                    reason: format!("price directory {} does not exist", directory.display()),
                });
            }
            Ok(Box::new(CsvPriceAdapter::new(directory.clone())))
        }
        #[cfg(feature = "sqlite")]
        PriceSourceConfig::Sqlite { path, pool_size } => {
            use crate::adapters::sqlite_adapter::SqlitePriceAdapter;
            Ok(Box::new(SqlitePriceAdapter::open(path, *pool_size)?))
        }
        #[cfg(not(feature = "sqlite"))]
        PriceSourceConfig::Sqlite { .. } => Err(PerfolioError::ConfigInvalid {
            section: "prices".into(),
            key: "source".into(),
            reason: "sqlite support is not enabled in this build".into(),
        }),
    }
}

pub fn report_port(format: ReportFormat, pretty: bool) -> Box<dyn ReportPort> {
    match format {
        ReportFormat::Text => Box::new(ConsoleReportAdapter::new()),
        ReportFormat::Json if pretty => Box::new(JsonReportAdapter::new()),
        ReportFormat::Json => Box::new(JsonReportAdapter::compact()),
    }
}

pub fn load_ledger(path: &Path) -> Result<Ledger, PerfolioError> {
    TransactionCsvAdapter::new(path.to_path_buf()).load()
}

/// Runs one operation end to end against an already-built session and
/// returns the report it produced.
pub fn execute(
    kind: OperationKind,
    settings: &OperationSettings,
    session: &SessionConfig,
    ledger: &Ledger,
    today: NaiveDate,
) -> Result<Report, PerfolioError> {
    let port = build_price_port(&session.prices)?;
    // Operations narrow the scope before their first lookup.
    let oracle = PriceOracle::new(port, PriceScope::new(BTreeSet::new(), today, today));

    let ctx = OperationContext {
        ledger,
        oracle: &oracle,
        field: session.field,
        today,
    };
    kind.execute(settings, &ctx)
}

pub fn run_operation(
    kind: OperationKind,
    settings: &OperationSettings,
    args: &SessionArgs,
    today: NaiveDate,
    out: &mut dyn Write,
) -> Result<(), PerfolioError> {
    // Stage 1: config, overrides and validation
    let config = load_config(args)?;
    let session = build_session_config(&config)?;

    // Stage 2: settings are checked before any file is read
    kind.validate(settings, today)?;

    // Stage 3: ledger
    let ledger = load_ledger(&session.ledger_path)?;
    if ledger.is_empty() {
        tracing::warn!(path = %session.ledger_path.display(), "ledger has no transactions");
    }

    // Stage 4: compute
    tracing::info!(operation = %kind.display_name(), "running");
    let report = execute(kind, settings, &session, &ledger, today)?;

    // Stage 5: present
    report_port(session.format, session.pretty).write(&report, out)?;
    out.flush()?;
    Ok(())
}

fn run_validate(args: &SessionArgs, out: &mut dyn Write) -> Result<(), PerfolioError> {
    let config = load_config(args)?;
    let session = build_session_config(&config)?;
    let ledger = load_ledger(&session.ledger_path)?;
    build_price_port(&session.prices)?;

    writeln!(
        out,
        "Configuration is valid: {} transactions, {} symbols",
        ledger.len(),
        ledger.symbols().len()
    )?;
    if let Some(first) = ledger.first_date() {
        writeln!(out, "First transaction: {first}")?;
    }
    Ok(())
}

/// Loads every price from the ledger's first trade up to `today` and
/// upserts it into the SQLite store at `db`.
#[cfg(feature = "sqlite")]
pub fn import_prices(
    ledger_path: &Path,
    prices_dir: &Path,
    db: &Path,
    today: NaiveDate,
    out: &mut dyn Write,
) -> Result<(), PerfolioError> {
    use crate::adapters::sqlite_adapter::{rows_from_table, SqlitePriceAdapter};

    let ledger = load_ledger(ledger_path)?;
    let Some(start) = ledger.first_date() else {
        writeln!(out, "Ledger has no transactions, nothing to import")?;
        return Ok(());
    };

    let source = build_price_port(&PriceSourceConfig::Csv {
        directory: prices_dir.to_path_buf(),
    })?;
    let table = source.fetch(&ledger.symbols(), start, today)?;
    let rows = rows_from_table(&table);

    let store = SqlitePriceAdapter::open(db, 1)?;
    store.insert_prices(&rows)?;
    tracing::info!(db = %db.display(), rows = rows.len(), "imported prices");

    writeln!(
        out,
        "Imported {} rows for {} symbols into {}",
        rows.len(),
        table.symbol_count(),
        db.display()
    )?;
    Ok(())
}

fn list_operations(today: NaiveDate, out: &mut dyn Write) -> Result<(), PerfolioError> {
    for op in OperationKind::ALL {
        writeln!(out, "{:<14} {}", op.id(), op.display_name())?;
        for setting in op.settings() {
            writeln!(
                out,
                "{:<14}   --{:<6} {} (default {})",
                "",
                setting.key,
                setting.label,
                setting.default.resolve(today)
            )?;
        }
    }
    Ok(())
}
