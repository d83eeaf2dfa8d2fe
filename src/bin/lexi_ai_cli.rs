//! lexi-ai CLI: word lookups, image generation and streaming chat from the terminal.
//!
//! Usage:
//!   lexi-ai lookup <term>... [--config <path>]     Look up one or more words
//!   lexi-ai image <prompt> [--out <file>]           Generate an illustration
//!   lexi-ai chat [--system <prompt>]                Interactive streaming chat

use std::io::Write as _;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use futures::StreamExt;
use lexi_ai::batch::BulkLookup;
use lexi_ai::client::{LexiClient, LookupQuality, RequestOutcome, WordDetails};
use lexi_ai::notify::{Notifier, Severity};
use lexi_ai::ClientConfig;
use tokio::io::{AsyncBufReadExt, BufReader};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("lexi_ai=info")),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        print_usage();
        std::process::exit(1);
    }

    let rest = &args[2..];
    match args[1].as_str() {
        "lookup" => cmd_lookup(rest).await,
        "image" => cmd_image(rest).await,
        "chat" => cmd_chat(rest).await,
        "version" | "--version" | "-V" => {
            cmd_version();
            Ok(())
        }
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {other}");
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    }
}

fn print_usage() {
    println!(
        r#"lexi-ai: AI helpers for vocabulary lists

USAGE:
    lexi-ai <COMMAND> [OPTIONS]

COMMANDS:
    lookup <term>...            Look up part of speech, meaning and an example sentence
    image <prompt> [--out <f>]  Generate an illustration (default output: image.png)
    chat [--system <prompt>]    Interactive streaming chat; /reset starts over
    version                     Show version information
    help                        Show this help message

OPTIONS:
    --config <path>             YAML client configuration

ENVIRONMENT:
    GEMINI_API_KEY              API key (if none is stored in the keyring)
    LEXI_AI_*                   Configuration overrides
    RUST_LOG                    Log filter (default: lexi_ai=info)"#
    );
}

fn cmd_version() {
    println!("lexi-ai {}", env!("CARGO_PKG_VERSION"));
}

/// Splits `--flag value` pairs out of the positional arguments.
struct ParsedArgs {
    positional: Vec<String>,
    config: Option<PathBuf>,
    out: Option<PathBuf>,
    system: Option<String>,
}

fn parse_args(args: &[String]) -> anyhow::Result<ParsedArgs> {
    let mut parsed = ParsedArgs {
        positional: Vec::new(),
        config: None,
        out: None,
        system: None,
    };
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" | "--out" | "--system" => {
                let Some(value) = iter.next() else {
                    bail!("{arg} requires a value");
                };
                match arg.as_str() {
                    "--config" => parsed.config = Some(PathBuf::from(value)),
                    "--out" => parsed.out = Some(PathBuf::from(value)),
                    _ => parsed.system = Some(value.clone()),
                }
            }
            _ => parsed.positional.push(arg.clone()),
        }
    }
    Ok(parsed)
}

fn stderr_notifier() -> Arc<dyn Notifier> {
    Arc::new(|message: &str, severity: Severity| {
        eprintln!("[{}] {}", severity, message);
    })
}

fn build_client(parsed: &ParsedArgs) -> anyhow::Result<LexiClient> {
    let config = match &parsed.config {
        Some(path) => ClientConfig::from_path(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => ClientConfig::default(),
    }
    .apply_env()
    .context("applying LEXI_AI_* overrides")?;

    let client = LexiClient::builder()
        .config(config)
        .notifier(stderr_notifier())
        .build()
        .context("building client")?;
    Ok(client)
}

fn print_details(details: &WordDetails) {
    println!("{}", details.term);
    match details.quality {
        LookupQuality::Unparsed => {
            if let Some(raw) = &details.raw_text {
                println!("  {}", raw.trim());
            }
            return;
        }
        LookupQuality::Degraded => {
            println!("  (details unavailable)");
            return;
        }
        LookupQuality::Complete => {}
    }
    let field = |label: &str, value: &Option<String>| {
        if let Some(v) = value {
            println!("  {label:<15}{v}");
        }
    };
    field("part of speech", &details.part_of_speech);
    field("meaning", &details.meaning);
    field("example", &details.example_sentence);
    field("pronunciation", &details.pronunciation);
    if !details.synonyms.is_empty() {
        println!("  {:<15}{}", "synonyms", details.synonyms.join(", "));
    }
}

async fn cmd_lookup(args: &[String]) -> anyhow::Result<()> {
    let parsed = parse_args(args)?;
    if parsed.positional.is_empty() {
        bail!("lookup needs at least one term");
    }
    let client = build_client(&parsed)?;

    if let [term] = parsed.positional.as_slice() {
        return match client.word_details(term).await {
            RequestOutcome::Success(details) => {
                print_details(&details);
                Ok(())
            }
            RequestOutcome::Failure(f) => bail!("{}", f),
        };
    }

    let result = BulkLookup::new(&client).run(parsed.positional.as_slice()).await;
    let mut entries: Vec<_> = result
        .successes
        .iter()
        .chain(result.degraded.iter())
        .collect();
    entries.sort_by_key(|(i, _)| *i);
    for (_, details) in entries {
        print_details(details);
    }
    for (i, failure) in &result.failures {
        eprintln!("{}: {}", parsed.positional[*i], failure);
    }
    println!(
        "\n{}/{} complete ({:.0}%) in {:.1}s",
        result.success_count(),
        result.total_processed,
        result.success_rate() * 100.0,
        result.execution_time.as_secs_f64()
    );
    if result.failure_count() > 0 {
        std::process::exit(2);
    }
    Ok(())
}

async fn cmd_image(args: &[String]) -> anyhow::Result<()> {
    let parsed = parse_args(args)?;
    let prompt = parsed.positional.join(" ");
    if prompt.trim().is_empty() {
        bail!("image needs a prompt");
    }
    let client = build_client(&parsed)?;
    let image = match client.generate_image(&prompt).await {
        RequestOutcome::Success(image) => image,
        RequestOutcome::Failure(f) => bail!("{}", f),
    };
    let out = parsed.out.clone().unwrap_or_else(|| PathBuf::from("image.png"));
    tokio::fs::write(&out, &image.bytes)
        .await
        .with_context(|| format!("writing {}", out.display()))?;
    println!(
        "Wrote {} ({}, {} bytes)",
        out.display(),
        image.mime_type,
        image.bytes.len()
    );
    Ok(())
}

async fn cmd_chat(args: &[String]) -> anyhow::Result<()> {
    let parsed = parse_args(args)?;
    let client = build_client(&parsed)?;
    let system = parsed
        .system
        .clone()
        .unwrap_or_else(|| "You are a friendly English tutor. Keep answers short.".to_string());

    let session = client.chat();
    let mut handle = session.start(system.clone());
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    eprintln!("Type a message, /reset to start over, or an empty line to quit.");
    loop {
        eprint!("> ");
        std::io::stderr().flush().ok();
        let Some(line) = lines.next_line().await.context("reading stdin")? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            break;
        }
        if line == "/reset" {
            handle = session.start(system.clone());
            eprintln!("(conversation reset)");
            continue;
        }

        // Failures were already reported through the notifier.
        let Ok(mut deltas) = session.send(&handle, line).await else {
            continue;
        };
        let mut stdout = std::io::stdout();
        while let Some(delta) = deltas.next().await {
            match delta {
                Ok(text) => {
                    print!("{text}");
                    stdout.flush().ok();
                }
                Err(_) => {
                    println!("\n(reply interrupted)");
                    break;
                }
            }
        }
        println!();
    }
    Ok(())
}
