//! Run the full pipeline: transcribe a file, then shape the transcript
//! with a prompt template.
//!
//! Usage: cargo run --example templates -- path/to/meeting.mp3 meeting_notes

use aiscribe::{Pipeline, PipelineConfig};

#[tokio::main]
async fn main() -> aiscribe::Result<()> {
    let mut args = std::env::args().skip(1);
    let path = args.next().expect("usage: templates <media-file> <template-id>");
    let template_id = args.next().unwrap_or_else(|| "content_summary".into());

    let pipeline = Pipeline::new(PipelineConfig::load_default())?
        .on_progress(|progress, message| eprintln!("[{:>3.0}%] {message}", progress * 100.0));

    for (id, template) in pipeline.templates().iter() {
        eprintln!("  {id}: {}", template.name);
    }

    let output = pipeline
        .run(path.as_ref(), Some(template_id.as_str()), None)
        .await?;

    println!("{}", output.processed.map(|p| p.text).unwrap_or_default());

    Ok(())
}
