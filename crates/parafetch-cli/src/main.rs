//! `parafetch`: a segmented, parallel HTTP(S) downloader.
//!
//! Argument parsing and exit-code behavior follow the reference tool's
//! `main.cpp` (abort on the first bad argument or the first chunk failure);
//! the `clap`/`tracing-subscriber` wiring follows the pack's clearest CLI
//! precedent for this shape of tool (`ngdp-client`), since the teacher GUI
//! app has no CLI entry point of its own.

mod render;

use std::io::IsTerminal;
use std::path::PathBuf;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::Level;

use parafetch_core::config::{EngineOptions, JobConfig};
use parafetch_core::hash::HashAlgorithm;
use parafetch_core::planner::SizingPolicy;
use parafetch_core::queue::{self, QueueEvent};

/// Segmented, parallel HTTP(S) downloader.
///
/// If no URLs are given as arguments, they are read one per line from stdin.
#[derive(Parser, Debug)]
#[command(name = "parafetch", version, about)]
struct Cli {
    /// URLs to download.
    urls: Vec<String>,

    /// Where to save files (defaults to the current directory).
    #[arg(short, long, default_value = ".")]
    output: PathBuf,

    /// Number of simultaneous connections to use per download.
    #[arg(short, long, default_value_t = 1)]
    conns: u32,

    /// Resume a download if the file is present locally and the server supports it.
    #[arg(short, long)]
    resume: bool,

    /// Number of chunks to split the download into. Cannot be used with --chunk-size.
    #[arg(long, conflicts_with = "chunk_size")]
    chunks: Option<u64>,

    /// Size of each chunk in bytes, which dictates how many are used. Cannot be used with --chunks.
    #[arg(long)]
    chunk_size: Option<u64>,

    /// Ask to confirm on redirects, or whether to truncate a completed file when resuming.
    #[arg(long)]
    confirm: bool,

    /// Verbose mode.
    #[arg(long)]
    verbose: bool,

    /// Show all HTTP headers. Implies --verbose.
    #[arg(long)]
    show_http_headers: bool,

    /// Resolve URLs and print what would happen without downloading anything.
    #[arg(long)]
    dry_run: bool,

    /// Show progress information for each connection.
    #[arg(long)]
    show_conn_progress: bool,

    /// Username for HTTP basic authorization.
    #[arg(long, requires = "http_pass")]
    http_user: Option<String>,

    /// Password for HTTP basic authorization.
    #[arg(long, requires = "http_user")]
    http_pass: Option<String>,

    /// Generate a checksum of each downloaded file using the given hash function.
    #[arg(long)]
    gen_checksum: Option<String>,

    /// Verify the integrity of the downloaded file using "algorithm=hex". Only
    /// valid with exactly one URL.
    #[arg(long)]
    verify: Option<String>,

    /// Suppress progress bars; final summary and error lines are still printed.
    #[arg(short, long)]
    quiet: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let verbose = cli.verbose || cli.show_http_headers;
    init_logging(verbose, cli.quiet);

    if let Err(err) = run(cli).await {
        eprintln!("ERROR {err}");
        std::process::exit(1);
    }
}

fn init_logging(verbose: bool, quiet: bool) {
    let level = if quiet {
        Level::ERROR
    } else if verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level.as_str()));

    tracing_subscriber::fmt().with_target(false).with_env_filter(filter).init();
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut urls = cli.urls.clone();
    if !std::io::stdin().is_terminal() {
        use std::io::Read;
        let mut input = String::new();
        std::io::stdin().read_to_string(&mut input)?;
        urls.extend(input.lines().map(str::trim).filter(|l| !l.is_empty()).map(str::to_string));
    }

    if urls.is_empty() {
        anyhow::bail!("no URLs given (pass them as arguments or pipe them on stdin)");
    }

    let gen_checksum = match &cli.gen_checksum {
        Some(name) => {
            Some(HashAlgorithm::parse(name).ok_or_else(|| anyhow::anyhow!("invalid hash function: {name}"))?)
        }
        None => None,
    };

    let verify = match &cli.verify {
        Some(spec) => {
            if urls.len() != 1 {
                anyhow::bail!("--verify can only be used with exactly one URL");
            }
            let (alg, hex) = spec
                .split_once('=')
                .ok_or_else(|| anyhow::anyhow!("--verify expects the form algorithm=hex"))?;
            let algorithm =
                HashAlgorithm::parse(alg).ok_or_else(|| anyhow::anyhow!("invalid hash function: {alg}"))?;
            Some((algorithm, hex.to_string()))
        }
        None => None,
    };

    let policy = SizingPolicy { chunks: cli.chunks, chunk_size: cli.chunk_size };
    let options = EngineOptions {
        output_dir: cli.output.clone(),
        conns: cli.conns,
        policy,
        resume: cli.resume,
        confirm: cli.confirm,
        http_user: cli.http_user.clone(),
        http_pass: cli.http_pass.clone(),
        verbose,
        show_http_headers: cli.show_http_headers,
        dry_run: cli.dry_run,
        show_conn_progress: cli.show_conn_progress,
        quiet: cli.quiet,
    };
    options.validate()?;

    let parsed_urls: Vec<url::Url> = urls
        .iter()
        .map(|u| url::Url::parse(u.trim()).map_err(|_| anyhow::anyhow!("invalid URL: {u}")))
        .collect::<Result<_, _>>()?;

    if cli.dry_run {
        return dry_run(&parsed_urls, &options).await;
    }

    let jobs: Vec<_> = parsed_urls
        .iter()
        .cloned()
        .map(|url| {
            let job = JobConfig { url: url.clone(), output_path: None, options: options.clone() };
            let confirm_prompt: Option<parafetch_core::coordinator::ConfirmPrompt> =
                Some(Box::new(|msg: &str| ask_proceed(msg)));
            (url, job.into_coordinator_options(confirm_prompt))
        })
        .collect();

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let cancel = CancellationToken::new();
    let queue_handle = tokio::spawn(queue::run(jobs, tx, cancel.clone()));

    let mut renderer = render::Renderer::new(options.quiet, options.show_conn_progress);
    let mut output_paths = vec![None; parsed_urls.len()];

    while let Some(event) = rx.recv().await {
        if let QueueEvent::Download {
            index,
            event: parafetch_core::coordinator::DownloadEvent::Finished { output_path, .. },
        } = &event
        {
            output_paths[*index] = Some(output_path.clone());
        }
        renderer.handle_queue_event(&event);
    }

    queue_handle.await.map_err(|e| anyhow::anyhow!(e.to_string()))??;

    for path in output_paths.into_iter().flatten() {
        if let Some(algorithm) = gen_checksum {
            let digest = parafetch_core::hash::compute_hash(&path, algorithm).await?;
            println!("{algorithm} {digest}  {}", path.display());
        }
        if let Some((algorithm, expected)) = &verify {
            let ok = parafetch_core::hash::verify(&path, *algorithm, expected).await?;
            if !ok {
                anyhow::bail!("checksum mismatch for {}", path.display());
            }
            println!("{}: OK", path.display());
        }
    }

    Ok(())
}

async fn dry_run(urls: &[url::Url], options: &EngineOptions) -> anyhow::Result<()> {
    let client = parafetch_core::probe::build_client()?;
    for url in urls {
        let (bare_url, credentials) = parafetch_core::probe::extract_embedded_credentials(url);
        let result = parafetch_core::probe::probe(
            &client,
            &bare_url,
            credentials.as_ref(),
            options.confirm,
            options.show_http_headers,
            || ask_proceed("Do you want to continue? [y/N] "),
        )
        .await?;
        println!(
            "{} -> {} ({} bytes, {})",
            url,
            result.final_url,
            result.total_size,
            if result.resumable { "resumable" } else { "not resumable" }
        );
    }
    Ok(())
}

/// Print `msg`, then read one line from stdin and treat `y`/`yes`
/// (case-insensitive, surrounding whitespace trimmed) as acceptance.
fn ask_proceed(msg: &str) -> bool {
    use std::io::Write;

    print!("{msg}");
    let _ = std::io::stdout().flush();

    let mut line = String::new();
    if std::io::stdin().read_line(&mut line).is_err() {
        return false;
    }
    let answer = line.trim().to_ascii_lowercase();
    answer == "y" || answer == "yes"
}
