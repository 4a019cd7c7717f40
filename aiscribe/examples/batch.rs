//! Process several files as a sequential batch.
//!
//! Usage: cargo run --example batch -- a.mp3 b.mp4 c.wav

use std::path::PathBuf;

use aiscribe::{Pipeline, PipelineConfig};

#[tokio::main]
async fn main() -> aiscribe::Result<()> {
    let paths: Vec<PathBuf> = std::env::args().skip(1).map(PathBuf::from).collect();
    if paths.is_empty() {
        eprintln!("usage: batch <media-file>...");
        std::process::exit(1);
    }

    let pipeline = Pipeline::new(PipelineConfig::load_default())?;
    let outcomes = pipeline.run_batch(&paths, None, None).await;

    for outcome in outcomes {
        match outcome.result {
            Ok(output) => println!("{}: {} chars", outcome.path.display(), output.transcript.text.len()),
            Err(e) => println!("{}: failed — {e}", outcome.path.display()),
        }
    }

    Ok(())
}
