use std::path::PathBuf;

use anyhow::Context;
use chrono::{Local, NaiveDate};
use clap::{Args, Parser, Subcommand};
use rust_decimal::Decimal;
use tracing::debug;

use quote_cli::app::{self, DocumentReport, DocumentRow, DraftOptions, TotalsReport};
use quote_cli::{logging, settings};
use quote_core::db::{DbConfig, DocumentRepository};
use quote_core::lifecycle::{SendChannel, signature_now};
use quote_core::listing::{DocumentFilter, SortOrder};
use quote_core::service::DocumentService;
use quote_core::{Document, DocumentKind, DocumentStatus};

// ─── CLI definition ──────────────────────────────────────────────────────────

/// Quotes and invoices for small building trades.
///
/// Documents are stored in the configured database and referred to by
/// their number, e.g. `DEV-2026-00001` or `FAC-2026-00003`.
#[derive(Debug, Parser)]
#[command(name = "quotebook", version)]
struct Cli {
    /// Database backend to use.
    #[arg(long, global = true, default_value = "sqlite")]
    backend: String,

    /// Database connection string.
    /// For SQLite this is a file path (e.g. `quotebook.db`) or `:memory:`.
    #[arg(long, global = true, default_value = "quotebook.db")]
    db: String,

    /// Company settings file. Defaults to `quotebook.toml` when present.
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// Log filter, a level or EnvFilter directives. Overrides `RUST_LOG`.
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Also append log records to this file.
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create a draft quote.
    Quote(DraftArgs),

    /// Create a stand-alone draft invoice.
    Invoice(DraftArgs),

    /// Compute totals for a set of lines without storing anything.
    Totals(DraftArgs),

    /// Send a draft to the client.
    Send {
        number: String,
        #[arg(long, default_value = "email", value_parser = parse_channel)]
        channel: SendChannel,
    },

    /// Record that the client opened a sent document.
    View { number: String },

    /// Accept a quote, optionally recording who signed it.
    Accept {
        number: String,
        #[arg(long)]
        signed_by: Option<String>,
    },

    /// Decline a quote.
    Decline { number: String },

    /// Force a status, bypassing the usual workflow.
    Status { number: String, status: String },

    /// Issue the deposit invoice of an accepted quote.
    Deposit {
        number: String,
        /// Deposit share of the quote. Defaults to the company setting.
        #[arg(long)]
        percent: Option<Decimal>,
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Issue the balance invoice of a quote (or the full invoice when no
    /// deposit was taken).
    Balance {
        number: String,
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Recompute the totals of a draft after a settings change.
    Recompute { number: String },

    /// List stored documents.
    List {
        /// all, quotes, invoices or pending.
        #[arg(long, default_value = "all", value_parser = parse_filter)]
        filter: DocumentFilter,
        /// recent, status or amount.
        #[arg(long, default_value = "recent", value_parser = parse_sort)]
        sort: SortOrder,
        /// Keep documents whose number contains this text.
        #[arg(long, default_value = "")]
        search: String,
    },

    /// Show one document in full.
    Show { number: String },
}

#[derive(Debug, Args)]
struct DraftArgs {
    /// Client identifier.
    #[arg(long)]
    client: Option<String>,

    /// Work site identifier.
    #[arg(long)]
    site: Option<String>,

    /// CSV file of lines (description,quantity,unit,unit_price_ht[,unit_cost_ht,tax_rate,section]).
    #[arg(long)]
    lines: Option<PathBuf>,

    /// One line in the same CSV layout, without header. Repeatable.
    #[arg(long = "line")]
    line: Vec<String>,

    /// Global discount percentage.
    #[arg(long)]
    discount: Option<Decimal>,

    /// Tax rate for lines without their own rate.
    #[arg(long)]
    tax_rate: Option<Decimal>,

    /// Withhold the retention of guarantee (quotes only).
    #[arg(long)]
    retention: bool,

    /// Quote validity in days.
    #[arg(long)]
    validity_days: Option<u32>,

    /// Free text printed below the lines.
    #[arg(long)]
    notes: Option<String>,

    /// Issue date, YYYY-MM-DD. Defaults to today.
    #[arg(long)]
    date: Option<NaiveDate>,
}

impl DraftArgs {
    fn into_options(self) -> (Option<NaiveDate>, DraftOptions) {
        let options = DraftOptions {
            client: self.client,
            site: self.site,
            lines_file: self.lines,
            line_specs: self.line,
            discount: self.discount,
            tax_rate: self.tax_rate,
            retention: self.retention,
            validity_days: self.validity_days,
            notes: self.notes,
        };
        (self.date, options)
    }
}

fn parse_channel(s: &str) -> Result<SendChannel, String> {
    SendChannel::parse(s).ok_or_else(|| format!("unknown channel '{s}' (email, sms, link)"))
}

fn parse_filter(s: &str) -> Result<DocumentFilter, String> {
    DocumentFilter::parse(s).ok_or_else(|| format!("unknown filter '{s}'"))
}

fn parse_sort(s: &str) -> Result<SortOrder, String> {
    SortOrder::parse(s).ok_or_else(|| format!("unknown sort order '{s}'"))
}

// ─── commands ────────────────────────────────────────────────────────────────

fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn print_report(
    document: &Document,
    remaining: Option<Decimal>,
) {
    print!(
        "{}",
        DocumentReport {
            document,
            remaining,
            today: today(),
        }
    );
}

fn print_status(document: &Document) {
    println!("{} is now {}", document.number, document.status());
}

async fn run(
    command: Command,
    repo: &dyn DocumentRepository,
    service: &DocumentService<'_>,
) -> anyhow::Result<()> {
    match command {
        Command::Quote(args) => create(DocumentKind::Quote, args, service).await?,
        Command::Invoice(args) => create(DocumentKind::Invoice, args, service).await?,
        Command::Totals(args) => {
            let (date, options) = args.into_options();
            let draft = app::build_draft(
                DocumentKind::Quote,
                service.settings(),
                date.unwrap_or_else(today),
                options,
            )?;
            print!("{}", TotalsReport(&app::preview_totals(&draft, service.settings())?));
        }
        Command::Send { number, channel } => {
            let document = app::find_document(repo, &number).await?;
            let updated = service.send(&document.id, channel).await?;
            if updated.status() == document.status() {
                println!("{number} was already sent, status unchanged");
            } else {
                println!("{number} sent by {channel}");
            }
        }
        Command::View { number } => {
            let document = app::find_document(repo, &number).await?;
            print_status(&service.mark_viewed(&document.id).await?);
        }
        Command::Accept { number, signed_by } => {
            let document = app::find_document(repo, &number).await?;
            let signature = signed_by.map(signature_now);
            print_status(&service.accept(&document.id, signature).await?);
        }
        Command::Decline { number } => {
            let document = app::find_document(repo, &number).await?;
            print_status(&service.decline(&document.id).await?);
        }
        Command::Status { number, status } => {
            let document = app::find_document(repo, &number).await?;
            let status = DocumentStatus::parse(document.kind(), &status)
                .with_context(|| format!("'{status}' is not a {} status", document.kind()))?;
            print_status(&service.set_status(&document.id, status).await?);
        }
        Command::Deposit {
            number,
            percent,
            date,
        } => {
            let quote = app::find_document(repo, &number).await?;
            let derivation = service
                .create_deposit_invoice(&quote.id, percent, date.unwrap_or_else(today))
                .await?;
            print_report(&derivation.invoice, None);
            print_status(&derivation.quote);
        }
        Command::Balance { number, date } => {
            let quote = app::find_document(repo, &number).await?;
            let derivation = service
                .create_balance_invoice(&quote.id, date.unwrap_or_else(today))
                .await?;
            print_report(&derivation.invoice, None);
            print_status(&derivation.quote);
        }
        Command::Recompute { number } => {
            let document = app::find_document(repo, &number).await?;
            let updated = service.recompute_totals(&document.id).await?;
            print!("{}", TotalsReport(&updated.totals));
        }
        Command::List {
            filter,
            sort,
            search,
        } => {
            let documents = app::list_documents(repo, filter, sort, &search).await?;
            if documents.is_empty() {
                println!("no documents");
            }
            for document in &documents {
                println!("{}", DocumentRow(document));
            }
        }
        Command::Show { number } => {
            let document = app::find_document(repo, &number).await?;
            let remaining = match document.kind() {
                DocumentKind::Quote => Some(service.remaining_balance(&document.id).await?),
                DocumentKind::Invoice => None,
            };
            print_report(&document, remaining);
        }
    }
    Ok(())
}

async fn create(
    kind: DocumentKind,
    args: DraftArgs,
    service: &DocumentService<'_>,
) -> anyhow::Result<()> {
    let (date, options) = args.into_options();
    let draft = app::build_draft(kind, service.settings(), date.unwrap_or_else(today), options)?;
    let document = service.create_document(draft).await?;
    print_report(&document, None);
    Ok(())
}

// ─── entry point ─────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    logging::init_logging(cli.log_level.as_deref())?;
    if let Some(path) = &cli.log_file {
        logging::enable_file_logging(path)?;
    }

    let settings = settings::load_settings(cli.settings.as_deref())?;

    let db_config = DbConfig::new(&cli.backend, cli.db);

    debug!(backend = %db_config.backend, "opening document store");
    let registry = app::build_registry();
    let repo = registry
        .open(&db_config)
        .await
        .with_context(|| format!("cannot open the {} store", db_config.backend))?;

    let service = DocumentService::new(&*repo, settings);
    run(cli.command, &*repo, &service).await
}
