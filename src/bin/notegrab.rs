use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use notegrab::app::{App, BatchFetchReport, DownloadOptions, DownloadReport, ListReport};
use notegrab::app::{InventoryReport, PurgeSummary, TranscriptListReport};
use notegrab::config::Locations;
use notegrab::domain::FileCategory;
use notegrab::error::NotegrabError;
use notegrab::output::{ConsoleProgress, JsonOutput, OutputMode};
use notegrab::transcripts::FetchRequest;
use notegrab::transfer::{HttpTransfer, ProgressObserver};

#[derive(Parser)]
#[command(name = "notegrab")]
#[command(about = "Fetch files over HTTP into a downloads folder or a typed scratch area")]
#[command(version, author)]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    download: DownloadArgs,
}

#[derive(Args, Clone)]
struct DownloadArgs {
    url: Option<String>,

    filename: Option<String>,

    #[arg(long, help = "Download to the scratch area instead of the downloads folder")]
    temp: bool,

    #[arg(
        long = "type",
        value_name = "CATEGORY",
        default_value = "general",
        help = "Scratch category: transcripts, notes, attachments or general; \
                anything else falls back to general"
    )]
    category: FileCategory,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "List downloaded or scratch files")]
    List(ListArgs),
    #[command(about = "Show scratch area inventory")]
    Info,
    #[command(about = "Delete scratch files older than the retention window")]
    Purge(PurgeArgs),
    #[command(about = "Fetch and inspect meeting transcripts")]
    Transcripts(TranscriptsArgs),
}

#[derive(Args)]
struct ListArgs {
    #[arg(long, help = "List the scratch area instead of the downloads folder")]
    temp: bool,

    #[arg(long = "type", value_name = "CATEGORY")]
    category: Option<FileCategory>,
}

#[derive(Args)]
struct PurgeArgs {
    #[arg(long, help = "Report what would be deleted without touching anything")]
    dry_run: bool,
}

#[derive(Args)]
struct TranscriptsArgs {
    #[command(subcommand)]
    command: TranscriptsCommand,
}

#[derive(Subcommand)]
enum TranscriptsCommand {
    #[command(about = "Fetch one or more transcripts into the scratch area")]
    Fetch(TranscriptFetchArgs),
    #[command(about = "List transcripts together with sidecar metadata")]
    List,
}

#[derive(Args)]
struct TranscriptFetchArgs {
    #[arg(required = true)]
    urls: Vec<String>,

    #[arg(long, help = "Meeting identifier, only valid with a single URL")]
    meeting_id: Option<String>,

    #[arg(long, value_name = "JSON", help = "Extra metadata recorded in the sidecar")]
    meta: Option<String>,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(err) = report.downcast_ref::<NotegrabError>() {
            return ExitCode::from(map_exit_code(err));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &NotegrabError) -> u8 {
    match error {
        NotegrabError::Transport(_)
        | NotegrabError::TransportStatus { .. }
        | NotegrabError::InvalidUrl(_) => 3,
        NotegrabError::StorageUnavailable { .. } => 2,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.json {
        OutputMode::Json
    } else {
        OutputMode::Human
    };

    let locations = Locations::discover().into_diagnostic()?;
    let transfer = HttpTransfer::new().into_diagnostic()?;
    let app = App::new(locations, transfer);

    match cli.command {
        Some(Commands::List(args)) => run_list(args, &app, output_mode),
        Some(Commands::Info) => run_info(&app, output_mode),
        Some(Commands::Purge(args)) => run_purge(args, &app, output_mode),
        Some(Commands::Transcripts(args)) => run_transcripts(args, &app, output_mode),
        None => run_download(cli.download, &app, output_mode),
    }
}

fn progress_observer(output_mode: OutputMode) -> &'static dyn ProgressObserver {
    match output_mode {
        OutputMode::Human => &ConsoleProgress,
        OutputMode::Json => &JsonOutput,
    }
}

fn run_download(
    args: DownloadArgs,
    app: &App<HttpTransfer>,
    output_mode: OutputMode,
) -> miette::Result<()> {
    let Some(url) = args.url else {
        return Err(miette::Report::msg("URL required (try `notegrab --help`)"));
    };

    let options = DownloadOptions {
        filename: args.filename,
        use_temp: args.temp,
        category: args.category,
    };
    if let OutputMode::Human = output_mode {
        println!("Downloading: {url}");
    }
    let report = app
        .download(&url, options, progress_observer(output_mode))
        .into_diagnostic()?;

    match output_mode {
        OutputMode::Json => JsonOutput::print(&report).into_diagnostic()?,
        OutputMode::Human => print_download_summary(&report),
    }
    Ok(())
}

fn run_list(args: ListArgs, app: &App<HttpTransfer>, output_mode: OutputMode) -> miette::Result<()> {
    let report = app.list(args.temp, args.category).into_diagnostic()?;
    match output_mode {
        OutputMode::Json => JsonOutput::print(&report).into_diagnostic()?,
        OutputMode::Human => print_list(&report),
    }
    Ok(())
}

fn run_info(app: &App<HttpTransfer>, output_mode: OutputMode) -> miette::Result<()> {
    let report = app.inventory().into_diagnostic()?;
    match output_mode {
        OutputMode::Json => JsonOutput::print(&report).into_diagnostic()?,
        OutputMode::Human => print_inventory(&report),
    }
    Ok(())
}

fn run_purge(
    args: PurgeArgs,
    app: &App<HttpTransfer>,
    output_mode: OutputMode,
) -> miette::Result<()> {
    let summary = app.purge(args.dry_run).into_diagnostic()?;
    match output_mode {
        OutputMode::Json => JsonOutput::print(&summary).into_diagnostic()?,
        OutputMode::Human => print_purge_summary(&summary),
    }
    Ok(())
}

fn run_transcripts(
    args: TranscriptsArgs,
    app: &App<HttpTransfer>,
    output_mode: OutputMode,
) -> miette::Result<()> {
    match args.command {
        TranscriptsCommand::Fetch(args) => {
            if args.meeting_id.is_some() && args.urls.len() > 1 {
                return Err(miette::Report::msg(
                    "--meeting-id is only valid with a single URL",
                ));
            }
            let metadata = args
                .meta
                .as_deref()
                .map(serde_json::from_str::<serde_json::Value>)
                .transpose()
                .into_diagnostic()?;
            let requests: Vec<FetchRequest> = args
                .urls
                .into_iter()
                .map(|url| FetchRequest {
                    url,
                    meeting_id: args.meeting_id.clone(),
                    metadata: metadata.clone(),
                })
                .collect();

            let report = app
                .fetch_transcripts(&requests, progress_observer(output_mode))
                .into_diagnostic()?;
            match output_mode {
                OutputMode::Json => JsonOutput::print(&report).into_diagnostic()?,
                OutputMode::Human => print_batch_summary(&report),
            }
            Ok(())
        }
        TranscriptsCommand::List => {
            let report = app.list_transcripts().into_diagnostic()?;
            match output_mode {
                OutputMode::Json => JsonOutput::print(&report).into_diagnostic()?,
                OutputMode::Human => print_transcript_list(&report),
            }
            Ok(())
        }
    }
}

const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";
const RED: &str = "\x1b[31m";
const RESET: &str = "\x1b[0m";

fn print_download_summary(report: &DownloadReport) {
    println!();
    println!("{GREEN}Download completed: {}{RESET}", report.path);
    println!(
        "{CYAN}  {} bytes in {:.1}s{RESET}",
        report.size_bytes, report.elapsed_secs
    );
}

fn print_list(report: &ListReport) {
    if report.files.is_empty() {
        println!("No files found in {}", report.root);
        return;
    }
    println!("{CYAN}Files in {}:{RESET}", report.root);
    for (index, file) in report.files.iter().enumerate() {
        println!(
            "{:2}. {} ({:.1} MB) - {}",
            index + 1,
            file.path,
            file.size_bytes as f64 / (1024.0 * 1024.0),
            file.modified
        );
    }
}

fn print_inventory(report: &InventoryReport) {
    println!("{CYAN}Scratch area info{RESET}");
    println!("  Location:      {}", report.root);
    println!(
        "  Total size:    {:.1} MB",
        report.total_size_bytes as f64 / (1024.0 * 1024.0)
    );
    println!("  File count:    {}", report.file_count);
    println!("  Cleanup after: {} hours", report.retention_hours);
}

fn print_purge_summary(summary: &PurgeSummary) {
    if summary.dry_run {
        println!(
            "{YELLOW}Would delete {} old file(s):{RESET}",
            summary.deleted.len()
        );
        for path in &summary.deleted {
            println!("  {path}");
        }
        return;
    }
    for path in &summary.deleted {
        println!("{GREEN}Deleted: {path}{RESET}");
    }
    for failure in &summary.failed {
        println!("{RED}Failed to delete {}: {}{RESET}", failure.path, failure.reason);
    }
    println!(
        "{CYAN}Purge finished: {} deleted, {} failed{RESET}",
        summary.deleted.len(),
        summary.failed.len()
    );
}

fn print_batch_summary(report: &BatchFetchReport) {
    println!();
    for item in &report.items {
        match &item.path {
            Some(path) => println!("{GREEN}fetched {} -> {path}{RESET}", item.url),
            None => println!(
                "{RED}failed  {} ({}){RESET}",
                item.url,
                item.error.as_deref().unwrap_or("unknown error")
            ),
        }
    }
    let failed = report.items.iter().filter(|item| item.path.is_none()).count();
    println!(
        "{CYAN}Transcripts: {} fetched, {} failed{RESET}",
        report.items.len() - failed,
        failed
    );
}

fn print_transcript_list(report: &TranscriptListReport) {
    if report.transcripts.is_empty() {
        println!("No transcripts stored.");
        return;
    }
    for entry in &report.transcripts {
        println!("{CYAN}{}{RESET} ({} bytes, {})", entry.path, entry.size_bytes, entry.modified);
        match &entry.metadata {
            Some(sidecar) => {
                println!("  url: {}", sidecar.url);
                if let Some(meeting_id) = &sidecar.meeting_id {
                    println!("  meeting: {meeting_id}");
                }
            }
            None => println!("  {YELLOW}no metadata{RESET}"),
        }
    }
}
