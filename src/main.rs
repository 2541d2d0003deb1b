use std::io::Write;
use std::path::PathBuf;

use base64::Engine;
use clap::{Parser, Subcommand};
use dynamic_fs::fs::UnknownEncoding;
use dynamic_fs::{
    BufferEncoding, DynamicFs, FileData, FileSystem, FsError, LoadError, Manifest, ReadOptions,
    ReaddirOptions, StreamEvent,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "dynamic-fs")]
#[command(about = "Read files through an overlay of synthetic files over the real filesystem")]
#[command(version)]
struct Cli {
    /// Overlay manifest (.json, .yaml, .yml or .toml); later manifests win
    #[arg(long = "overlay", value_name = "MANIFEST")]
    overlays: Vec<PathBuf>,

    /// Directory `.`-prefixed overlay paths are resolved against
    #[arg(long = "base-dir")]
    base_dir: Option<String>,

    /// Output results as JSON
    #[arg(long = "json")]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print a file's content
    Cat {
        path: String,
        /// Decode the content with this encoding (utf8, latin1, base64, hex, ...)
        #[arg(long)]
        encoding: Option<String>,
        /// First byte to read
        #[arg(long)]
        start: Option<usize>,
        /// Byte to stop before
        #[arg(long)]
        end: Option<usize>,
    },
    /// List a directory
    Ls {
        path: String,
        /// List every descendant, not just direct children
        #[arg(short, long)]
        recursive: bool,
    },
    /// Show what kind of entry a path is
    Stat { path: String },
    /// Report whether a path exists
    Exists { path: String },
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error(transparent)]
    Fs(#[from] FsError),
    #[error(transparent)]
    Encoding(#[from] UnknownEncoding),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

fn build_fs(cli: &Cli) -> Result<DynamicFs, LoadError> {
    let mut manifest = Manifest::default();
    for path in &cli.overlays {
        manifest.merge(Manifest::load(path)?);
    }
    if let Some(base_dir) = &cli.base_dir {
        manifest.base_dir = Some(base_dir.clone());
    }
    manifest.build(None)
}

async fn cat(
    fs: &DynamicFs,
    path: &str,
    options: ReadOptions,
    json: bool,
) -> Result<(), CliError> {
    let mut stream = fs.create_read_stream(path, &options);

    if json {
        let data = stream.read_to_end().await?;
        let value = match data {
            FileData::Text(text) => serde_json::json!({
                "path": path,
                "synthetic": fs.is_synthetic(path),
                "encoding": options.encoding.map(|e| e.as_str()),
                "content": text,
            }),
            FileData::Buffer(bytes) => serde_json::json!({
                "path": path,
                "synthetic": fs.is_synthetic(path),
                "encoding": BufferEncoding::Base64.as_str(),
                "content": base64::engine::general_purpose::STANDARD.encode(bytes),
            }),
        };
        println!("{}", serde_json::to_string(&value)?);
        return Ok(());
    }

    let mut stdout = std::io::stdout().lock();
    while let Some(event) = stream.next_event().await {
        match event {
            StreamEvent::Data(chunk) => stdout.write_all(chunk.as_bytes())?,
            StreamEvent::Error(err) => return Err(err.into()),
            StreamEvent::Open | StreamEvent::End | StreamEvent::Close => {}
        }
    }
    stdout.flush()?;
    Ok(())
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let fs = build_fs(&cli)?;

    match &cli.command {
        Command::Cat { path, encoding, start, end } => {
            let mut options = ReadOptions::new().with_range(*start, *end);
            if let Some(label) = encoding {
                options = options.with_encoding(label.parse()?);
            }
            cat(&fs, path, options, cli.json).await?;
        }
        Command::Ls { path, recursive } => {
            let options = ReaddirOptions { recursive: *recursive };
            let entries = fs.readdir(path, &options).await?;
            if cli.json {
                println!("{}", serde_json::json!({ "path": path, "entries": entries }));
            } else {
                for entry in entries {
                    println!("{}", entry);
                }
            }
        }
        Command::Stat { path } => {
            let stats = fs.stat(path).await?;
            if cli.json {
                println!(
                    "{}",
                    serde_json::json!({
                        "path": path,
                        "type": stats.kind(),
                        "size": stats.size(),
                        "synthetic": stats.is_synthetic(),
                    })
                );
            } else {
                println!("{}: {}, {} bytes", path, stats.kind(), stats.size());
            }
        }
        Command::Exists { path } => {
            let exists = fs.exists_sync(path);
            if cli.json {
                println!("{}", serde_json::json!({ "path": path, "exists": exists }));
            } else {
                println!("{}", exists);
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("dynamic-fs: {}", e);
        std::process::exit(1);
    }
}
