use anyhow::Context;
use bmffmeta::{Fields, ParseOptions, parse_file};
use clap::{ArgAction, Parser};

#[derive(Parser, Debug)]
#[command(version, about = "Print QuickTime/iTunes metadata of an MP4/MOV file")]
struct Args {
    /// MP4/ISOBMFF file path
    path: String,

    /// Only entries of this track (0 means file-level only)
    #[arg(long)]
    track: Option<u32>,

    /// Emit JSON instead of one line per entry
    #[arg(long, action = ArgAction::SetTrue)]
    json: bool,

    /// Debug logging on stderr
    #[arg(short, long, action = ArgAction::SetTrue)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if args.verbose { "bmffmeta=debug" } else { "bmffmeta=warn" }.to_string()
    });
    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    let options = ParseOptions::default().with_fields(Fields::metadata_only());
    let out = parse_file(&args.path, &options).with_context(|| format!("parsing {}", args.path))?;

    let entries: Vec<_> = out
        .metadata
        .iter()
        .filter(|e| match args.track {
            Some(0) => e.track_id.is_none(),
            Some(id) => e.track_id == Some(id),
            None => true,
        })
        .collect();

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "metadata": entries,
                "diagnostics": out.diagnostics,
            }))?
        );
        return Ok(());
    }

    for e in &entries {
        match e.track_id {
            Some(id) => println!("[track {}] {} = {}", id, e.key, e.value),
            None => println!("{} = {}", e.key, e.value),
        }
    }
    for d in &out.diagnostics {
        eprintln!("warning: {:#x}: {}", d.offset, d.message);
    }
    Ok(())
}
