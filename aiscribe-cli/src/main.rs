use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};

use aiscribe::{Action, FileOutcome, Pipeline, PipelineConfig, PipelineOutput};

#[derive(Parser)]
#[command(
    name = "aiscribe",
    about = "Transcribe audio/video and shape the text with a prompt template"
)]
struct Cli {
    /// Media files to process (multiple files run as a sequential batch).
    #[arg(required_unless_present_any = ["list_templates", "cache_stats", "clear_cache", "uri"])]
    inputs: Vec<PathBuf>,

    /// Prompt template to apply after transcription (omit to stop at the
    /// transcript).
    #[arg(short, long)]
    template: Option<String>,

    /// Language hint for the speech vendor (e.g. "en", "zh").
    #[arg(short, long)]
    language: Option<String>,

    /// Output format.
    #[arg(short, long, default_value = "text")]
    format: OutputFormat,

    /// Write output to file instead of stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Config file (default: ~/.config/aiscribe/config.json).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Extra prompt templates to load, as a JSON file of id → template.
    #[arg(long)]
    templates_file: Option<PathBuf>,

    /// Disable the result cache for this run.
    #[arg(long)]
    no_cache: bool,

    /// Handle an action URI (aiscribe://transcribe?file=…) instead of
    /// positional inputs.
    #[arg(long)]
    uri: Option<String>,

    /// List available prompt templates.
    #[arg(long)]
    list_templates: bool,

    /// Show result-cache statistics.
    #[arg(long)]
    cache_stats: bool,

    /// Remove every cached result.
    #[arg(long)]
    clear_cache: bool,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
    Srt,
    Vtt,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("aiscribe=info".parse().unwrap()),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut config = match &cli.config {
        Some(path) => match PipelineConfig::load_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Error loading config {}: {e}", path.display());
                std::process::exit(1);
            }
        },
        None => PipelineConfig::load_default(),
    };
    if cli.no_cache {
        config.cache.enabled = false;
    }

    let pipeline = match Pipeline::new(config) {
        Ok(pipeline) => pipeline,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };
    let mut pipeline = pipeline;

    if let Some(path) = &cli.templates_file {
        if let Err(e) = pipeline.templates_mut().merge_file(path, true) {
            eprintln!("Error loading templates {}: {e}", path.display());
            std::process::exit(1);
        }
    }

    if cli.list_templates {
        println!("{:<22} {:<12} {}", "ID", "CATEGORY", "DESCRIPTION");
        println!("{:<22} {:<12} {}", "--", "--------", "-----------");
        for (id, template) in pipeline.templates().iter() {
            println!(
                "{id:<22} {:<12} {}",
                template.category, template.description
            );
        }
        return;
    }

    if cli.clear_cache {
        match pipeline.cache().clear() {
            Ok(()) => eprintln!("Cache cleared"),
            Err(e) => {
                eprintln!("Error: {e}");
                std::process::exit(1);
            }
        }
        return;
    }

    if cli.cache_stats {
        let stats = pipeline.cache().stats();
        println!("Entries: {}", stats.entries);
        println!("Size:    {}", format_bytes(stats.total_bytes));
        return;
    }

    // Resolve what to run: an action URI or the positional inputs.
    let (inputs, template, language, direct_text) = match &cli.uri {
        Some(uri) => match aiscribe::scheme::parse_action(uri) {
            Ok(Action::Transcribe { file, language }) => (vec![file], None, language, None),
            Ok(Action::Process {
                template,
                text,
                file,
            }) => {
                let inputs = file.map(|f| vec![f]).unwrap_or_default();
                (inputs, Some(template), None, text)
            }
            Ok(Action::Config { view }) => {
                match view.as_deref() {
                    Some("cache") => {
                        let stats = pipeline.cache().stats();
                        println!("Entries: {}", stats.entries);
                        println!("Size:    {}", format_bytes(stats.total_bytes));
                    }
                    _ => {
                        if let Some(path) = aiscribe::config::default_config_path() {
                            println!("Config file: {}", path.display());
                        }
                    }
                }
                return;
            }
            Err(e) => {
                eprintln!("Error: {e}");
                std::process::exit(1);
            }
        },
        None => (
            cli.inputs.clone(),
            cli.template.clone(),
            cli.language.clone(),
            None,
        ),
    };

    // A process action with inline text needs no media pipeline.
    if let (Some(text), Some(template_id)) = (&direct_text, &template) {
        match pipeline.process_text(text, template_id).await {
            Ok(processed) => {
                emit(&cli.output, &processed.text);
                return;
            }
            Err(e) => {
                eprintln!("Error: {e}");
                std::process::exit(1);
            }
        }
    }

    let bar = progress_bar();
    let bar_cb = bar.clone();
    let pipeline = pipeline.on_progress(move |progress, message| {
        bar_cb.set_position((progress * 100.0) as u64);
        bar_cb.set_message(message.to_string());
    });

    if inputs.len() > 1 {
        let outcomes = pipeline
            .run_batch(&inputs, template.as_deref(), language.as_deref())
            .await;
        bar.finish_and_clear();
        emit_batch(&cli, &outcomes);
        if outcomes.iter().any(|o| o.result.is_err()) {
            std::process::exit(1);
        }
        return;
    }

    let input = match inputs.first() {
        Some(input) => input.clone(),
        None => {
            eprintln!("Error: no input file given");
            std::process::exit(1);
        }
    };

    let result = pipeline
        .run(&input, template.as_deref(), language.as_deref())
        .await;
    bar.finish_and_clear();

    let output = match result {
        Ok(output) => output,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    summarize(&output);
    let rendered = match render(&cli.format, &output) {
        Ok(rendered) => rendered,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };
    emit(&cli.output, &rendered);
}

fn progress_bar() -> ProgressBar {
    let bar = ProgressBar::new(100);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{wide_bar:.cyan/blue}] {pos}% {msg}")
            .expect("valid template")
            .progress_chars("#>-"),
    );
    bar
}

fn summarize(output: &PipelineOutput) {
    let duration = output
        .media
        .duration_secs
        .map(|d| format!("{d:.1}s"))
        .unwrap_or_else(|| "unknown length".into());
    eprintln!(
        "Transcribed {} ({}, {}): {} chars{}",
        output.media.path.display(),
        duration,
        format_bytes(output.media.size_bytes),
        output.transcript.text.len(),
        match &output.processed {
            Some(p) => format!(", processed with \"{}\"", p.template_id),
            None => String::new(),
        }
    );
}

fn render(format: &OutputFormat, output: &PipelineOutput) -> aiscribe::Result<String> {
    Ok(match format {
        OutputFormat::Text => match &output.processed {
            Some(processed) => processed.text.clone(),
            None => output.transcript.text.clone(),
        },
        OutputFormat::Json => output.to_json_pretty()?,
        OutputFormat::Srt => output.transcript.to_srt(),
        OutputFormat::Vtt => output.transcript.to_vtt(),
    })
}

fn emit(target: &Option<PathBuf>, text: &str) {
    match target {
        Some(path) => {
            if let Err(e) = std::fs::write(path, text) {
                eprintln!("Error writing to {}: {e}", path.display());
                std::process::exit(1);
            }
            eprintln!("Written to {}", path.display());
        }
        None => println!("{text}"),
    }
}

fn emit_batch(cli: &Cli, outcomes: &[FileOutcome]) {
    let ok = outcomes.iter().filter(|o| o.result.is_ok()).count();
    eprintln!("Batch complete: {ok}/{} succeeded", outcomes.len());

    let mut combined = String::new();
    for outcome in outcomes {
        combined.push_str(&format!("=== {} ===\n", outcome.path.display()));
        match &outcome.result {
            Ok(output) => {
                let rendered = render(&cli.format, output).unwrap_or_default();
                combined.push_str(&rendered);
            }
            Err(e) => combined.push_str(&format!("[failed: {e}]")),
        }
        combined.push_str("\n\n");
    }
    emit(&cli.output, &combined);
}

fn format_bytes(bytes: u64) -> String {
    if bytes >= 1_000_000_000 {
        format!("{:.1} GB", bytes as f64 / 1_000_000_000.0)
    } else if bytes >= 1_000_000 {
        format!("{:.0} MB", bytes as f64 / 1_000_000.0)
    } else {
        format!("{:.0} KB", bytes as f64 / 1_000.0)
    }
}
