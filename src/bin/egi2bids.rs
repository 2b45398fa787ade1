use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use egi2bids::{convert, ConvertConfig};

#[derive(Parser)]
#[command(name = "egi2bids", about = "Convert an EGI/MFF recording to BIDS")]
struct Args {
    /// .mff bundle, or a .tar/.zip archive containing one
    source: PathBuf,

    /// BIDS dataset root (created as needed)
    bids_root: PathBuf,

    /// Subject label (sub-<label>)
    #[arg(long)]
    subject: String,

    /// Session label (ses-<label>)
    #[arg(long)]
    session: String,

    /// Task label (task-<label>)
    #[arg(long)]
    task: String,

    /// Run index (run-<nn>)
    #[arg(long)]
    run: Option<u32>,

    /// Event-id mapping as label=code pairs (comma-separated)
    #[arg(long, default_value = "")]
    event_id: String,

    /// Copy the source bundle into <root>/sourcedata/
    #[arg(long)]
    save_source: bool,

    /// Overwrite existing output (including saved source data)
    #[arg(long)]
    overwrite: bool,

    /// Power-line frequency annotation in Hz (default: 50)
    #[arg(long, default_value_t = 50.0)]
    line_freq: f64,

    /// Extract archives here instead of a temporary directory
    #[arg(long)]
    working_dir: Option<PathBuf>,
}

fn parse_event_id(spec: &str) -> Result<Option<BTreeMap<String, i64>>> {
    if spec.is_empty() {
        return Ok(None);
    }
    let mut map = BTreeMap::new();
    for pair in spec.split(',') {
        let (label, code) = pair
            .split_once('=')
            .ok_or_else(|| anyhow::anyhow!("bad event-id entry '{pair}' (want label=code)"))?;
        map.insert(label.trim().to_string(), code.trim().parse::<i64>()?);
    }
    Ok(Some(map))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let cfg = ConvertConfig {
        subject:     args.subject,
        session:     args.session,
        task:        args.task,
        run:         args.run,
        event_id:    parse_event_id(&args.event_id)?,
        save_source: args.save_source,
        overwrite:   args.overwrite,
        line_freq:   args.line_freq,
        working_dir: args.working_dir,
    };

    let root = convert(&args.source, &args.bids_root, &cfg)?;
    println!("BIDS dataset written to {}", root.display());
    Ok(())
}
