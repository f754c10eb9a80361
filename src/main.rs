//! neethi: command-line client for the NeethiSaarathi legal assistant
//!
//! Answers the profile questionnaire, shows/edits/deletes the stored
//! profile, and asks the legal Q&A agent. The session id lives in the data
//! directory, like the browser's local storage.

use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::{debug, info, warn};

use neethisaarathi::questionnaire::catalog;
use neethisaarathi::{
    AgentClient, AnswerValue, ClientConfig, DeleteOutcome, FileSessionStore, Host,
    HttpProfileBackend, Identity, ProfileView, Question, QuestionKind, SaveOutcome,
    SubmitOutcome, View,
};

#[derive(Parser)]
#[command(name = "neethi")]
#[command(about = "Command-line client for the NeethiSaarathi legal assistant")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = neethisaarathi::config::DEFAULT_CONFIG_FILE)]
    config: String,

    /// Backend API root (overrides config file)
    #[arg(long, env = "NEETHI_API_URL")]
    api_url: Option<String>,

    /// Data directory holding the session id
    #[arg(short, long, env = "NEETHI_DATA_DIR")]
    data_dir: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print the session id, creating one if needed
    Session,

    /// Ask a question about Indian laws, rights or schemes
    Ask {
        /// The question
        #[arg(required = true)]
        question: Vec<String>,
    },

    /// Fill in the profile questionnaire interactively
    Questionnaire,

    /// Stored profile operations
    #[command(subcommand)]
    Profile(ProfileCommands),

    /// Show which view this session starts in
    Status,
}

#[derive(Debug, Subcommand)]
enum ProfileCommands {
    /// Show the stored profile
    Show,

    /// Change profile fields
    Edit {
        /// Field assignment, e.g. --set state=Kerala
        #[arg(long = "set", value_name = "FIELD=VALUE", required = true)]
        set: Vec<String>,
    },

    /// Delete the profile and start a new session
    Delete {
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(format!("neethisaarathi={}", cli.log_level).parse()?)
                .add_directive(format!("neethi={}", cli.log_level).parse()?),
        )
        .init();

    // Load or create default config
    let mut config = ClientConfig::load_or_default(&cli.config)
        .with_context(|| format!("loading {}", cli.config))?;

    // Apply CLI overrides
    if let Some(api_url) = cli.api_url {
        config.api.base_url = api_url;
    }
    if let Some(data_dir) = cli.data_dir {
        config.session.data_dir = PathBuf::from(data_dir);
    }

    debug!("API: {}", config.api.base_url);
    debug!("Data dir: {}", config.session.data_dir.display());

    let store = Arc::new(FileSessionStore::new(config.session.storage_path()));
    let identity = Arc::new(Identity::new(store));
    let backend = Arc::new(HttpProfileBackend::new(&config.api)?);
    let host = Host::new(identity, backend);

    match cli.command {
        Commands::Ask { question } => ask(&config, &question.join(" ")).await?,
        Commands::Session => {
            let session_id = host.identity().initialize().await?;
            println!("{}", session_id);
        }
        Commands::Status => {
            let boot = host.boot().await?;
            println!("Session:  {}", boot.session_id);
            println!("Profile:  {}", if boot.status.exists { "yes" } else { "no" });
            println!("Complete: {}", if boot.status.is_complete { "yes" } else { "no" });
            println!("View:     {:?}", boot.view);
        }
        Commands::Questionnaire => run_questionnaire(&host).await?,
        Commands::Profile(cmd) => run_profile(&host, cmd).await?,
    }

    Ok(())
}

async fn ask(config: &ClientConfig, question: &str) -> anyhow::Result<()> {
    let client = AgentClient::new(&config.api)?;
    let Some(answer) = client.ask(question).await? else {
        bail!("question is empty");
    };

    println!("{}", answer.answer);
    if let Some(file) = answer.file {
        println!("\nForm: {}", file);
    }
    if !answer.sources.is_empty() {
        println!("\nSources:");
        for source in answer.sources {
            match source.scheme.as_deref().filter(|s| !s.is_empty()) {
                Some(scheme) => println!("  - {} ({})", source.title, scheme),
                None => println!("  - {}", source.title),
            }
        }
    }
    Ok(())
}

async fn run_questionnaire(host: &Host<HttpProfileBackend>) -> anyhow::Result<()> {
    let boot = host.boot().await?;
    if boot.view == View::Profile {
        println!("A profile already exists for this session; use `neethi profile show`.");
        return Ok(());
    }

    let form = host.questionnaire(boot.session_id, || {
        println!("\nThank you! Your profile is complete.");
    });
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let phase = form.current_phase().await;
        println!("\n== {} ==", phase.to_string().to_uppercase());

        for question in form.questions().await {
            if let Some(value) = prompt_answer(&mut lines, question).await? {
                form.set_answer(question.id, value).await;
            }
        }

        let unanswered = form.unanswered().await;
        if !unanswered.is_empty() {
            println!("Skipped: {}", unanswered.join(", "));
        }

        match form.submit_phase().await {
            SubmitOutcome::EnteredPhaseTwo => continue,
            SubmitOutcome::Completed => return Ok(()),
            SubmitOutcome::NotReady => println!("Please choose an occupation to continue."),
            SubmitOutcome::Retained => println!("Could not save your answers, please try again."),
            outcome => {
                info!(?outcome, "Questionnaire stopped");
                return Ok(());
            }
        }
    }
}

/// Ask one question on the terminal. Empty input leaves it unanswered.
async fn prompt_answer(
    lines: &mut Lines<BufReader<Stdin>>,
    question: &Question,
) -> anyhow::Result<Option<AnswerValue>> {
    loop {
        println!("{}", question.prompt);
        match question.kind {
            QuestionKind::Select(options) => {
                for (i, option) in options.iter().enumerate() {
                    println!("  {}) {}", i + 1, option);
                }
            }
            QuestionKind::Boolean => println!("  (y/n)"),
            QuestionKind::Text => {}
        }

        let Some(line) = lines.next_line().await? else {
            bail!("input closed");
        };
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }

        match parse_value(question, line) {
            Some(value) => return Ok(Some(value)),
            None => println!("Not a valid answer, try again."),
        }
    }
}

/// Interpret raw input for a question: an option number or label for
/// selects, y/n for yes/no questions, anything for text
fn parse_value(question: &Question, raw: &str) -> Option<AnswerValue> {
    match question.kind {
        QuestionKind::Text => Some(AnswerValue::from(raw)),
        QuestionKind::Select(options) => raw
            .parse::<usize>()
            .ok()
            .and_then(|n| n.checked_sub(1))
            .and_then(|i| options.get(i))
            .or_else(|| options.iter().find(|o| o.eq_ignore_ascii_case(raw)))
            .map(|o| AnswerValue::from(*o)),
        QuestionKind::Boolean => match raw.to_ascii_lowercase().as_str() {
            "y" | "yes" | "true" => Some(AnswerValue::Flag(true)),
            "n" | "no" | "false" => Some(AnswerValue::Flag(false)),
            _ => None,
        },
    }
}

async fn run_profile(host: &Host<HttpProfileBackend>, cmd: ProfileCommands) -> anyhow::Result<()> {
    let session_id = host.identity().initialize().await?;
    let manager = host.profile_manager(session_id);

    if !manager.mount().await {
        bail!("no profile found for this session; run `neethi questionnaire` first");
    }

    match cmd {
        ProfileCommands::Show => {
            if let Some(profile) = manager.profile().await {
                print!("{}", ProfileView(&profile));
            }
        }
        ProfileCommands::Edit { set } => {
            manager.toggle_edit().await;
            for assignment in &set {
                let (field, raw) = assignment
                    .split_once('=')
                    .with_context(|| format!("expected FIELD=VALUE, got {:?}", assignment))?;
                let value = match catalog::find(field) {
                    Some(question) => parse_value(question, raw)
                        .with_context(|| format!("invalid value for {}: {:?}", field, raw))?,
                    None => bail!("unknown profile field {:?}", field),
                };
                manager.set_field(field, value).await;
            }

            match manager.save().await {
                SaveOutcome::Saved => {
                    println!("Profile updated.");
                    if let Some(profile) = manager.profile().await {
                        print!("{}", ProfileView(&profile));
                    }
                }
                outcome => bail!("profile not saved ({:?})", outcome),
            }
        }
        ProfileCommands::Delete { yes } => {
            let confirm = |prompt: &str| yes || confirm_on_terminal(prompt);
            match manager.delete_profile(&confirm).await {
                DeleteOutcome::Deleted => {
                    let boot = host.reload().await?;
                    println!("Profile deleted. New session: {}", boot.session_id);
                }
                DeleteOutcome::Cancelled => println!("Cancelled."),
                outcome => bail!("profile not deleted ({:?})", outcome),
            }
        }
    }
    Ok(())
}

fn confirm_on_terminal(prompt: &str) -> bool {
    confirm_with(prompt, &mut std::io::stdin().lock(), &mut std::io::stdout())
}

/// Ask `prompt` on `output` and read a yes/no from `input`; anything but
/// yes (including a read error) declines
fn confirm_with(prompt: &str, input: &mut impl BufRead, output: &mut impl Write) -> bool {
    if let Err(e) = write!(output, "{} [y/N] ", prompt).and_then(|_| output.flush()) {
        debug!(error = %e, "Could not write confirmation prompt");
    }

    let mut answer = String::new();
    if let Err(e) = input.read_line(&mut answer) {
        warn!(error = %e, "Could not read confirmation");
        return false;
    }
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_confirm_with() {
        let mut output = Vec::new();
        assert!(confirm_with("Delete?", &mut Cursor::new("yes\n"), &mut output));
        assert_eq!(String::from_utf8(output).unwrap(), "Delete? [y/N] ");

        assert!(confirm_with("Delete?", &mut Cursor::new(" Y \n"), &mut Vec::new()));
        assert!(!confirm_with("Delete?", &mut Cursor::new("\n"), &mut Vec::new()));
        assert!(!confirm_with("Delete?", &mut Cursor::new(""), &mut Vec::new()));
    }

    struct Broken;

    impl Write for Broken {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "closed"))
        }
    }

    #[test]
    fn test_confirm_survives_broken_output() {
        assert!(confirm_with("Delete?", &mut Cursor::new("y\n"), &mut Broken));
    }

    #[test]
    fn test_parse_value() {
        let gender = catalog::find("gender").unwrap();
        assert_eq!(parse_value(gender, "2"), Some(AnswerValue::from("Female")));
        assert_eq!(parse_value(gender, "male"), Some(AnswerValue::from("Male")));
        assert_eq!(parse_value(gender, "9"), None);

        let disability = catalog::find("has_disability").unwrap();
        assert_eq!(parse_value(disability, "n"), Some(AnswerValue::Flag(false)));
        assert_eq!(parse_value(disability, "maybe"), None);
    }
}
