//! Transcribe a local media file and print the text.
//!
//! Usage: cargo run --example basic -- path/to/audio.mp3

#[tokio::main]
async fn main() -> aiscribe::Result<()> {
    let path = std::env::args()
        .nth(1)
        .expect("usage: basic <media-file>");

    let transcript = aiscribe::transcribe_file(&path).await?;

    println!("{}", transcript.text);

    Ok(())
}
