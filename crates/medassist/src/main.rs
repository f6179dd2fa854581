use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use reedline::{DefaultPrompt, DefaultPromptSegment, Reedline, Signal};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use medassist::app::App;
use medassist::config::Config;
use medassist::dashboard::TrendSummary;
use medassist::llm::{Attachment, ProviderKind};
use medassist::report::{PdfTextExtractor, ReportExtractor};
use medassist::symptoms::extract_symptoms;

const DISCLAIMER: &str =
    "This assistant gives general health information only. It is not a substitute for a doctor.";

#[derive(Parser)]
#[command(name = "medassist")]
#[command(version)]
#[command(about = "AI health assistant for the terminal")]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, default_value = "medassist.yaml")]
    config: PathBuf,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Provider to use (openai or gemini); remembered for next time
    #[arg(short, long, global = true)]
    provider: Option<ProviderKind>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive symptom consultation (default)
    Chat,

    /// Explain a medical report PDF and answer questions about it
    Report {
        /// Path to the PDF
        path: PathBuf,
    },

    /// Show the symptom severity trend
    Dashboard,

    /// Manage API keys
    Keys {
        #[command(subcommand)]
        action: KeysAction,
    },

    /// Delete the health trend
    Clear,
}

#[derive(Subcommand)]
enum KeysAction {
    /// Save the API key for a provider
    Set { provider: ProviderKind, key: String },
    /// Show which keys are configured
    Status,
    /// Remove all saved keys and the provider preference
    Reset,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("medassist=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = Config::load(&cli.config)
        .await
        .with_context(|| format!("Failed to load config: {}", cli.config.display()))?;
    let mut app = App::load(config).await?;

    if let Some(provider) = cli.provider {
        app.select_provider(provider).await?;
    }

    match cli.command.unwrap_or(Commands::Chat) {
        Commands::Chat => cmd_chat(&mut app).await,
        Commands::Report { path } => cmd_report(&mut app, &path).await,
        Commands::Dashboard => {
            print_dashboard(&app);
            Ok(())
        }
        Commands::Keys { action } => cmd_keys(&mut app, action).await,
        Commands::Clear => {
            app.clear_data().await?;
            println!("All health data cleared.");
            Ok(())
        }
    }
}

async fn cmd_keys(app: &mut App, action: KeysAction) -> Result<()> {
    match action {
        KeysAction::Set { provider, key } => {
            app.set_api_key(provider, &key).await?;
            println!("{provider} API key saved.");
        }
        KeysAction::Status => print_key_status(app),
        KeysAction::Reset => {
            app.reset_keys().await?;
            println!("API keys reset.");
        }
    }
    Ok(())
}

fn print_key_status(app: &App) {
    for provider in ProviderKind::ALL {
        let state = if app.credentials().has_key(provider) {
            "set"
        } else {
            "not set"
        };
        println!("{:<8} {}: {state}", provider.label(), provider.credential_key());
    }
    match app.provider() {
        Some(provider) => println!("Selected: {provider}"),
        None => println!("Selected: none"),
    }
    println!("Keys file: {}", app.credentials_path().display());
}

fn print_dashboard(app: &App) {
    match TrendSummary::from_trend(app.trend()) {
        Some(summary) => print!("{summary}"),
        None => println!("No health data yet. Start a consultation to build your trend."),
    }
}

fn print_help() {
    println!("Type a message to describe your symptoms. Commands:");
    println!("  /image <path>     attach an image to your next message");
    println!("  /retry            regenerate the last reply");
    println!("  /new              start a new chat");
    println!("  /provider [name]  show or switch provider (openai, gemini)");
    println!("  /key <value>      save the API key for the current provider");
    println!("  /dashboard        show your symptom trend");
    println!("  /clear            delete all health data and this chat");
    println!("  /quit             exit");
}

fn busy(app: &App) {
    if let Some(provider) = app.provider() {
        println!("Analyzing with {provider}...");
    }
}

fn editor_prompt(label: &str) -> DefaultPrompt {
    DefaultPrompt::new(
        DefaultPromptSegment::Basic(label.to_string()),
        DefaultPromptSegment::Empty,
    )
}

async fn cmd_chat(app: &mut App) -> Result<()> {
    println!("AI Health Assistant");
    println!("{DISCLAIMER}");
    println!("Type /help for commands.\n");
    if app.provider().is_none() {
        println!("No provider selected. Use /provider openai or /provider gemini.");
    }

    let mut editor = Reedline::create();
    let prompt = editor_prompt("medassist");
    // Image waiting for the next message, and the one sent with the last message.
    let mut pending: Option<Attachment> = None;
    let mut last_sent: Option<Attachment> = None;

    loop {
        let line = match editor.read_line(&prompt)? {
            Signal::Success(line) => line,
            Signal::CtrlD => break,
            _ => continue,
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(command) = line.strip_prefix('/') {
            let (name, arg) = match command.split_once(char::is_whitespace) {
                Some((name, arg)) => (name, arg.trim()),
                None => (command, ""),
            };
            match name {
                "quit" | "exit" => break,
                "help" => print_help(),
                "image" => match Attachment::open(arg).await {
                    Ok(image) => {
                        debug!(path = arg, bytes = image.bytes().len(), "Attached image");
                        println!("Attached {arg}. It will be sent with your next message.");
                        pending = Some(image);
                    }
                    Err(e) => eprintln!("{e}"),
                },
                "retry" => {
                    busy(app);
                    match app.retry_consult(last_sent.as_ref()).await {
                        Ok(reply) => println!("\n{reply}\n"),
                        Err(e) => eprintln!("{e}"),
                    }
                }
                "new" => {
                    app.new_chat();
                    pending = None;
                    last_sent = None;
                    println!("Started a new chat.");
                }
                "provider" if arg.is_empty() => print_key_status(app),
                "provider" => match arg.parse::<ProviderKind>() {
                    Ok(provider) => match app.select_provider(provider).await {
                        Ok(()) => println!("Using {provider}."),
                        Err(e) => eprintln!("{e}"),
                    },
                    Err(e) => eprintln!("{e}"),
                },
                "key" => match app.provider() {
                    Some(provider) => match app.set_api_key(provider, arg).await {
                        Ok(()) => println!("{provider} API key saved."),
                        Err(e) => eprintln!("{e}"),
                    },
                    None => eprintln!("Select a provider before setting its key."),
                },
                "dashboard" => print_dashboard(app),
                "clear" => {
                    match app.clear_data().await {
                        Ok(()) => println!("All health data cleared."),
                        Err(e) => eprintln!("{e}"),
                    }
                    pending = None;
                    last_sent = None;
                }
                other => eprintln!("Unknown command /{other}. Type /help for commands."),
            }
            continue;
        }

        let symptoms = extract_symptoms(line);
        if !symptoms.is_empty() {
            println!("Detected symptoms: {}", symptoms.join(", "));
        }

        busy(app);
        let result = app.consult(line, pending.as_ref()).await;
        // The image belongs to this turn whether or not the call succeeded.
        last_sent = pending.take();
        match result {
            Ok(reply) => println!("\n{reply}\n"),
            Err(e) => eprintln!("{e}"),
        }
    }

    Ok(())
}

async fn cmd_report(app: &mut App, path: &Path) -> Result<()> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read report: {}", path.display()))?;
    let text = PdfTextExtractor.extract_text(&bytes)?;

    println!("Medical Report Explainer");
    println!("{DISCLAIMER}\n");

    busy(app);
    match app.explain_report(&path.display().to_string(), &text).await {
        Ok(Some(explanation)) => println!("\n{explanation}\n"),
        Ok(None) => {}
        Err(e) => eprintln!("{e}"),
    }
    if !app.report_session().is_explained() {
        return Ok(());
    }

    println!("Ask a question about your report, /retry to regenerate the last answer, or /quit.");
    let mut editor = Reedline::create();
    let prompt = editor_prompt("report");
    loop {
        let line = match editor.read_line(&prompt)? {
            Signal::Success(line) => line,
            Signal::CtrlD => break,
            _ => continue,
        };
        let line = line.trim();
        let result = match line {
            "" => continue,
            "/quit" | "/exit" => break,
            "/retry" => {
                busy(app);
                app.retry_report().await
            }
            question => {
                busy(app);
                app.ask_report(question).await
            }
        };
        match result {
            Ok(answer) => println!("\n{answer}\n"),
            Err(e) => eprintln!("{e}"),
        }
    }

    Ok(())
}
