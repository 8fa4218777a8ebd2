//! bindery - EPUB container polish tool

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use bindery::{CoverLink, PolishOptions, process_epub};

#[derive(Parser)]
#[command(name = "bindery")]
#[command(version, about = "Unpack, polish, and repack EPUB containers", long_about = None)]
#[command(after_help = "EXAMPLES:
    bindery book.epub polished.epub                Polish a book
    bindery book.epub out.epub --summary chapter-2.xhtml
    bindery book.epub out.epub -t work --keep      Keep the working tree")]
struct Cli {
    /// Input EPUB file
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// Output EPUB file
    #[arg(value_name = "OUTPUT")]
    output: PathBuf,

    /// Working directory for the extracted tree (replaced if present)
    #[arg(short = 't', long = "temp", value_name = "DIR", default_value = "temp_epub")]
    temp: PathBuf,

    /// Keep the working directory after a successful run
    #[arg(long)]
    keep: bool,

    /// Href of the cover page, relative to the content directory
    #[arg(long, value_name = "HREF", default_value = "cover.xhtml")]
    cover_href: String,

    /// Text for injected cover links
    #[arg(long, value_name = "TEXT", default_value = "Cover")]
    cover_label: String,

    /// Href of a summary page to refresh with the cover link
    #[arg(long, value_name = "HREF")]
    summary: Option<String>,

    /// Only log errors
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.quiet);

    match run(&cli) {
        Ok(()) => {
            if !cli.quiet {
                println!("Wrote {}", cli.output.display());
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> bindery::Result<()> {
    let options = PolishOptions {
        cover: CoverLink::new(cli.cover_href.clone(), cli.cover_label.clone()),
        summary: cli.summary.clone(),
        keep_work_dir: cli.keep,
    };

    // A stale tree from an earlier run would leak entries into the output
    if cli.temp.exists() {
        fs::remove_dir_all(&cli.temp).map_err(|e| bindery::Error::Io {
            path: cli.temp.clone(),
            source: e,
        })?;
    }

    process_epub(&cli.input, &cli.output, &cli.temp, &options)
}

fn init_logging(quiet: bool) {
    let default = if quiet { "error" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default)),
        )
        .init();
}
