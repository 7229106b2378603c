//! RoboComic - AI stand-up comedy duels
//!
//! Serves the HTTP API, or runs a duel straight in the terminal.

use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use colored::Colorize;
use robocomic_core::tts::{combine_audio_segments, encode_wav, generate_output_filename};
use robocomic_core::{
    AgentRole, AudioPayload, ComedyService, DuelCallback, DuelEvent, DuelMode, DuelRequest, Language, LogFormat,
    PersonaRegistry, Settings,
};
use robocomic_server::{AppState, logging, server};

#[derive(Parser)]
#[command(
    name = "robocomic",
    version,
    about = "AI stand-up comedy duels",
    long_about = "Two AI comedians trade jokes in a bounded duel, optionally judged and voiced."
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP API (default)
    Serve {
        /// Interface to bind (overrides API_HOST)
        #[arg(long)]
        host: Option<String>,
        /// Port to bind (overrides API_PORT)
        #[arg(long)]
        port: Option<u16>,
    },
    /// List the available comedian personas
    Personas,
    /// Run a duel in the terminal
    Duel {
        /// Persona key of the opening comedian
        #[arg(value_name = "COMEDIAN1")]
        comedian1: String,
        /// Persona key of the answering comedian
        #[arg(value_name = "COMEDIAN2")]
        comedian2: String,
        /// Topic of the bit (ignored in roast mode)
        #[arg(short, long, default_value = "")]
        topic: String,
        /// topical or roast
        #[arg(short, long, default_value = "topical")]
        mode: String,
        /// Number of rounds (1-10)
        #[arg(short, long, default_value = "1", value_parser = clap::value_parser!(u32).range(1..=10))]
        rounds: u32,
        /// en or pl (defaults to DEFAULT_LANG)
        #[arg(short, long)]
        lang: Option<String>,
        /// Sampling temperature (0.0-1.0)
        #[arg(long, value_parser = parse_temperature)]
        temperature: Option<f32>,
        /// Ground the bit in generated anecdotes about the topic
        #[arg(long)]
        build_context: bool,
        /// Ask the judge for a verdict afterwards
        #[arg(long)]
        judge: bool,
        /// Voice every line and write the audio into this directory
        #[arg(long, value_name = "DIR")]
        save_audio: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    match cli.command.unwrap_or(Command::Serve { host: None, port: None }) {
        Command::Serve { host, port } => serve(host, port).await,
        Command::Personas => list_personas(),
        Command::Duel {
            comedian1,
            comedian2,
            topic,
            mode,
            rounds,
            lang,
            temperature,
            build_context,
            judge,
            save_audio,
        } => {
            let settings = Settings::from_env().context("Invalid configuration")?;
            let lang = match lang {
                Some(lang) => lang.parse::<Language>()?,
                None => settings.default_lang,
            };
            let request = DuelRequest {
                comedian1,
                comedian2,
                lang,
                mode: mode.parse::<DuelMode>()?,
                topic: Some(topic).filter(|t| !t.trim().is_empty()),
                context: None,
                rounds,
                temperature,
            };
            duel(settings, request, build_context, judge, save_audio).await
        }
    }
}

async fn serve(host: Option<String>, port: Option<u16>) -> Result<()> {
    let mut settings = Settings::from_env().context("Invalid configuration")?;
    if let Some(host) = host {
        settings.api_host = host;
    }
    if let Some(port) = port {
        settings.api_port = port;
    }
    logging::init(&settings.log_level, settings.log_format);

    let addr = settings.bind_address();
    let service = ComedyService::bootstrap(settings).await?;
    server::run(AppState::new(service), &addr).await
}

fn list_personas() -> Result<()> {
    let registry = match env::var("PERSONAS_FILE") {
        Ok(path) if !path.trim().is_empty() => PersonaRegistry::load(path.trim())?,
        _ => PersonaRegistry::builtin()?,
    };

    println!();
    println!("{}", "Available comedians:".bold());
    for (key, persona) in registry.iter() {
        println!(
            "  {} {} {}",
            format!("{key:<18}").bright_cyan(),
            persona.name.bold(),
            format!("({})", persona.style).yellow()
        );
        for line in textwrap(&persona.description, 62).lines() {
            println!("      {}", line.dimmed());
        }
    }
    println!();
    Ok(())
}

async fn duel(
    settings: Settings,
    request: DuelRequest,
    build_context: bool,
    judge: bool,
    save_audio: Option<PathBuf>,
) -> Result<()> {
    // Keep the console for the show itself
    logging::init("warn", LogFormat::Human);

    let service = ComedyService::bootstrap(settings).await?;
    let first = service.personas().get(&request.comedian1)?.clone();
    let second = service.personas().get(&request.comedian2)?.clone();

    println!();
    println!("{}", "═".repeat(70).bright_blue());
    println!(
        "{}",
        format!("  {} - {} duel", "RoboComic".bold(), request.mode)
            .bright_blue()
            .bold()
    );
    println!("{}", "═".repeat(70).bright_blue());
    println!();
    if let Some(topic) = &request.topic {
        println!("{} {}", "Topic:".bold(), topic.bright_white());
    }
    println!(
        "{} {} vs {}",
        "Comedians:".bold(),
        first.name.bright_cyan(),
        second.name.bright_magenta()
    );
    println!("{}", "─".repeat(70).dimmed());

    let names = [first.name.clone(), second.name.clone()];
    let lang = request.lang;
    let topic = request.topic.clone().unwrap_or_default();
    let result = service
        .generate_show_with(request, build_context, Some(create_console_callback(names.clone())))
        .await;

    if !result.success {
        println!();
        println!(
            "{}",
            "The duel could not be completed; showing the fallback transcript.".yellow()
        );
        for utterance in &result.history {
            println!("  {}: {}", utterance.role.dimmed(), utterance.content);
        }
    }

    if judge && result.success {
        let verdict = service.judge_show(&names[0], &names[1], &result.history, lang).await;
        println!();
        println!("{}", "═".repeat(70).bright_green());
        println!("  {} {}", "Winner:".bold(), verdict.winner.bright_green().bold());
        for line in textwrap(&verdict.summary, 66).lines() {
            println!("  {}", line);
        }
        println!("{}", "═".repeat(70).bright_green());
    }

    if let Some(dir) = save_audio {
        let path = save_show_audio(&service, &result.history, lang, &dir, &first.key, &second.key, &topic).await?;
        println!();
        println!("{} {}", "Audio saved:".bold(), path.display());
    }

    println!();
    Ok(())
}

/// Voice every line with its seat's voice. Sample backends produce one
/// combined WAV; encoded backends one file per line.
async fn save_show_audio(
    service: &ComedyService,
    history: &[robocomic_core::Utterance],
    lang: Language,
    dir: &Path,
    comedian1: &str,
    comedian2: &str,
    topic: &str,
) -> Result<PathBuf> {
    std::fs::create_dir_all(dir).with_context(|| format!("Cannot create {}", dir.display()))?;

    let mut segments = Vec::new();
    let mut sample_rate = None;
    let mut written = 0usize;

    for (i, utterance) in history.iter().enumerate() {
        let Some(role) = AgentRole::from_role_name(&utterance.role) else {
            continue;
        };
        let voice_id = service.voice_ids().for_role(role).to_string();

        match service.tts(&utterance.content, lang, Some(&voice_id)).await? {
            AudioPayload::Samples {
                samples,
                sample_rate: rate,
            } => {
                sample_rate = Some(rate);
                segments.push(samples);
            }
            AudioPayload::Encoded { bytes } => {
                let path = dir.join(format!("{:02}-{}.wav", i + 1, utterance.role));
                std::fs::write(&path, bytes).with_context(|| format!("Cannot write {}", path.display()))?;
                written += 1;
            }
        }
    }

    match sample_rate {
        Some(rate) => {
            let combined = combine_audio_segments(segments, 0.5, rate);
            let path = dir.join(generate_output_filename(comedian1, comedian2, topic));
            std::fs::write(&path, encode_wav(&combined, rate)?)
                .with_context(|| format!("Cannot write {}", path.display()))?;
            Ok(path)
        }
        None if written > 0 => Ok(dir.to_path_buf()),
        None => bail!("Nothing to voice in this transcript"),
    }
}

/// Create a callback that prints duel events to the console.
fn create_console_callback(names: [String; 2]) -> DuelCallback {
    Box::new(move |event| match event {
        DuelEvent::TurnStart { role, style } => {
            let name = match AgentRole::from_role_name(&role) {
                Some(AgentRole::First) => names[0].bright_cyan().bold(),
                Some(AgentRole::Second) => names[1].bright_magenta().bold(),
                None => role.normal(),
            };
            println!();
            println!("{} {} {}", "▶".bright_cyan(), name, format!("({})", style).yellow());
        }
        DuelEvent::Utterance { content, .. } => {
            let wrapped = textwrap(&content, 66);
            for line in wrapped.lines() {
                println!("  {}", line);
            }
        }
        DuelEvent::DuelEnd => {
            println!();
            println!("{}", "─".repeat(70).dimmed());
        }
    })
}

fn parse_temperature(value: &str) -> Result<f32, String> {
    let temperature: f32 = value.parse().map_err(|_| format!("'{value}' is not a number"))?;
    if (0.0..=1.0).contains(&temperature) {
        Ok(temperature)
    } else {
        Err("must be between 0.0 and 1.0".to_string())
    }
}

/// Simple text wrapping function.
fn textwrap(text: &str, width: usize) -> String {
    let mut result = String::new();
    let mut current_line_len = 0;

    for word in text.split_whitespace() {
        if current_line_len + word.len() + 1 > width && current_line_len > 0 {
            result.push('\n');
            current_line_len = 0;
        }
        if current_line_len > 0 {
            result.push(' ');
            current_line_len += 1;
        }
        result.push_str(word);
        current_line_len += word.len();
    }

    result
}
