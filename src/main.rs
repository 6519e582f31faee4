use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use indicatif::ProgressBar;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;
use wikidict::config::{DEFAULT_CHUNK_SIZE, DEFAULT_TIMEOUT_SECS, PROGRESS_INTERVAL};
use wikidict::consumer::JsonlConsumer;
use wikidict::db::{ArticleDb, MemoryDb};
use wikidict::filters::FilterConfig;
use wikidict::parser::BasicParser;
use wikidict::pipeline::ConvertContext;
use wikidict::scheduler::{Scheduler, SchedulerOptions};
use wikidict::siteinfo::SiteInfo;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Parser)]
#[command(name = "wikidict")]
#[command(about = "Convert compiled wiki dumps into offline dictionary article records")]
struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert articles into serialized records
    Convert(ConvertArgs),
    /// Count articles and bytes in the configured slice
    Total(TotalArgs),
}

#[derive(Args)]
struct ConvertArgs {
    /// Path to the article database (JSON object of title -> text)
    #[arg(short, long)]
    input: PathBuf,

    /// Output file for serialized article records (JSON lines)
    #[arg(short, long)]
    output: PathBuf,

    /// Site description JSON (namespaces, magic words, general info)
    #[arg(long)]
    siteinfo: PathBuf,

    /// Content filter JSON (excluded pages/classes/ids, text replacements)
    #[arg(long)]
    filters: Option<PathBuf>,

    /// Worker pool size (default: available parallelism)
    #[arg(long)]
    workers: Option<usize>,

    /// Titles dispatched to the pool per chunk
    #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
    chunk_size: usize,

    /// Seconds to wait for a pooled result before recreating the pool
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS)]
    timeout: u64,

    /// Disable the worker pool and convert sequentially
    #[arg(long)]
    no_pool: bool,

    /// Skip this many titles before converting
    #[arg(long, default_value_t = 0)]
    start: usize,

    /// Stop at this title index (exclusive)
    #[arg(long)]
    end: Option<usize>,

    /// Stop after this many non-redirect articles
    #[arg(long)]
    article_count: Option<u64>,

    /// Comma-separated language codes to resolve language links for
    #[arg(long)]
    lang_links: Option<String>,
}

#[derive(Args)]
struct TotalArgs {
    /// Path to the article database (JSON object of title -> text)
    #[arg(short, long)]
    input: PathBuf,

    /// Skip this many titles
    #[arg(long, default_value_t = 0)]
    start: usize,

    /// Stop at this title index (exclusive)
    #[arg(long)]
    end: Option<usize>,
}

fn run_convert(args: ConvertArgs) -> Result<()> {
    let site = SiteInfo::load(&args.siteinfo)?;
    let filters = match &args.filters {
        Some(path) => FilterConfig::load(path)?,
        None => FilterConfig::default(),
    };
    let db = MemoryDb::load(&args.input)?;
    let redirect_aliases = site.redirect_aliases();

    let ctx = ConvertContext {
        db: Arc::new(db),
        parser: Arc::new(BasicParser::new()),
        filters: Arc::new(filters),
        redirect_aliases: Arc::new(redirect_aliases),
        math: None,
    };

    let options = SchedulerOptions {
        workers: args.workers,
        chunk_size: args.chunk_size,
        timeout: Duration::from_secs(args.timeout),
        start: args.start,
        end: args.end,
        article_limit: args.article_count,
        sequential: args.no_pool,
        lang_links: args
            .lang_links
            .map(|codes| codes.split(',').map(str::to_string).collect())
            .unwrap_or_default(),
        interrupt: Arc::new(AtomicBool::new(false)),
    };

    let mut consumer = JsonlConsumer::create(&args.output)?;
    let scheduler = Scheduler::new(ctx, site, options);

    let start = Instant::now();
    let stats = scheduler.run(&mut consumer)?;
    consumer.flush()?;
    let duration = start.elapsed();
    info!(
        duration_secs = duration.as_secs_f64(),
        "Conversion complete"
    );

    println!();
    println!("=== Summary ===");
    println!("Conversion time:    {:.2}s", duration.as_secs_f64());
    println!();
    println!("Articles added:     {}", stats.added);
    println!("Redirects:          {}", stats.redirects);
    println!("Language redirects: {}", stats.lang_redirects);
    println!("Empty articles:     {}", stats.empty);
    println!("Failed articles:    {}", stats.failed);
    println!("Pool timeouts:      {}", stats.timeouts);

    Ok(())
}

fn run_total(args: TotalArgs) -> Result<()> {
    let db = MemoryDb::load(&args.input)?;
    let pb = ProgressBar::new_spinner();

    let mut articles: u64 = 0;
    let mut total_bytes: u64 = 0;
    let iter = db.titles_with_sizes().skip(args.start);
    let iter: Box<dyn Iterator<Item = (String, u64)>> = match args.end {
        Some(end) => Box::new(iter.take(end.saturating_sub(args.start))),
        None => Box::new(iter),
    };

    for (_, size) in iter {
        articles += 1;
        total_bytes += size;
        if articles % PROGRESS_INTERVAL == 0 {
            pb.tick();
        }
    }
    pb.finish_and_clear();

    println!("Articles: {}", articles);
    println!("Bytes:    {}", total_bytes);
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");

    let result = match cli.command {
        Commands::Convert(args) => run_convert(args),
        Commands::Total(args) => run_total(args),
    };

    match result {
        Ok(()) => {
            info!("Completed successfully");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Error: {:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
