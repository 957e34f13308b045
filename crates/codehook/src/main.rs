use std::env;
use std::fs;
use std::io::{self, IsTerminal, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use codehook::config::{self, APP_NAME, AppConfig, LoggingConfig};
use codehook::{Agent, Message, ProcessInteractiveService};

fn main() {
    if let Err(err) = try_main() {
        let _ = writeln!(io::stderr(), "{err:?}");
        std::process::exit(1);
    }
}

fn try_main() -> Result<()> {
    let cli = Cli::parse();
    let config_file = config::resolve_config_file(cli.common.config.clone())?;

    // `config path` and `config reset` must work even when the file fails to load.
    match cli.command {
        Command::Run(cmd) => async_run(RuntimeContext::load(&cli.common, &config_file)?, cmd),
        Command::Config { command } => handle_config(cli.common, config_file, command),
        Command::Completions { shell } => handle_completions(shell),
    }
}

#[tokio::main]
async fn async_run(ctx: RuntimeContext, cmd: RunCommand) -> Result<()> {
    handle_run(&ctx, cmd).await
}

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Codehook - execute fenced code blocks from a conversation and reply with the output.",
    propagate_version = true
)]
struct Cli {
    #[command(flatten)]
    common: CommonOpts,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Args)]
struct CommonOpts {
    /// Override the config file path
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,
    /// Reduce output to only errors
    #[arg(short, long, action = clap::ArgAction::SetTrue, global = true)]
    quiet: bool,
    /// Increase logging verbosity (stackable)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    /// Emit logs as JSON
    #[arg(long = "log-json", global = true)]
    log_json: bool,
    /// Disable ANSI colors in log output
    #[arg(long = "no-color", global = true)]
    no_color: bool,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Reply to a conversation by executing the code blocks in its latest message
    Run(RunCommand),
    /// Inspect and manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Debug, Clone, Args)]
struct RunCommand {
    /// Message text to reply to (defaults to reading stdin)
    #[arg(short, long, conflicts_with = "history")]
    message: Option<String>,
    /// JSON file holding the conversation history (array of messages)
    #[arg(long, value_name = "FILE")]
    history: Option<PathBuf>,
    /// Sender name for --message / stdin input
    #[arg(long, default_value = "user")]
    from: String,
    /// Override the agent name from config
    #[arg(long)]
    agent_name: Option<String>,
    /// Override the maximum reply length
    #[arg(long, value_name = "CHARS")]
    max_output: Option<usize>,
    /// Print the reply as a JSON message
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Clone, Copy, Subcommand)]
enum ConfigCommand {
    /// Output the effective configuration
    Show,
    /// Print the resolved config file path
    Path,
    /// Regenerate the default configuration file
    Reset,
}

#[derive(Debug, Clone)]
struct RuntimeContext {
    config: AppConfig,
}

impl RuntimeContext {
    fn load(common: &CommonOpts, config_file: &Path) -> Result<Self> {
        let config = config::load_config(config_file)?;
        init_logging(common, &config.logging.level);
        debug!("loaded config from {}", config_file.display());
        Ok(Self { config })
    }
}

fn init_logging(common: &CommonOpts, configured_level: &str) {
    use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

    let level = effective_log_level(common, configured_level);
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{APP_NAME}={level}")));

    // Replies go to stdout; logs always go to stderr.
    if common.log_json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(io::stderr))
            .try_init()
            .ok();
    } else {
        let disable_color =
            common.no_color || env::var_os("NO_COLOR").is_some() || !io::stderr().is_terminal();

        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_ansi(!disable_color)
                    .with_writer(io::stderr),
            )
            .try_init()
            .ok();
    }
}

fn effective_log_level<'a>(common: &CommonOpts, configured_level: &'a str) -> &'a str {
    if common.quiet {
        return "error";
    }
    match common.verbose {
        0 => configured_level,
        1 => "debug",
        _ => "trace",
    }
}

async fn handle_run(ctx: &RuntimeContext, cmd: RunCommand) -> Result<()> {
    let history = read_history(&cmd)?;

    let mut hook_config = ctx.config.hook.clone();
    if let Some(max) = cmd.max_output {
        hook_config.maximum_output_to_keep = max;
    }

    let service_config = ctx
        .config
        .executor
        .to_service_config()
        .context("resolving executor settings")?;
    info!(
        program = %service_config.program,
        timeout_secs = service_config.timeout.as_secs(),
        "using process executor"
    );
    let service = Arc::new(ProcessInteractiveService::new(service_config));

    let name = cmd
        .agent_name
        .clone()
        .unwrap_or_else(|| ctx.config.agent_name.clone());
    let mut agent = Agent::new(name);
    if let Some(ref reply) = ctx.config.default_reply {
        agent = agent.with_default_reply(reply.clone());
    }
    agent
        .register_code_block_execution_hook(service, hook_config)
        .context("registering code block hook")?;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling reply");
            on_signal.cancel();
        }
    });

    let reply = agent
        .generate_reply(&history, &cancel)
        .await
        .context("generating reply")?;

    match reply {
        Some(message) if cmd.json => {
            println!(
                "{}",
                serde_json::to_string_pretty(&message).context("serializing reply to JSON")?
            );
        }
        Some(message) => {
            let mut stdout = io::stdout();
            stdout.write_all(message.text().unwrap_or_default().as_bytes())?;
            stdout.flush()?;
        }
        None => debug!("no reply produced"),
    }
    Ok(())
}

fn read_history(cmd: &RunCommand) -> Result<Vec<Message>> {
    if let Some(ref path) = cmd.history {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading history file {}", path.display()))?;
        let history: Vec<Message> = serde_json::from_str(&raw)
            .with_context(|| format!("parsing history file {}", path.display()))?;
        return Ok(history);
    }

    let text = match cmd.message {
        Some(ref text) => text.clone(),
        None => {
            if io::stdin().is_terminal() {
                return Err(anyhow!("no input: pass --message, --history, or pipe text on stdin"));
            }
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .context("reading message from stdin")?;
            buffer
        }
    };
    Ok(vec![Message::user(text, cmd.from.clone())])
}

fn handle_config(common: CommonOpts, config_file: PathBuf, command: ConfigCommand) -> Result<()> {
    match command {
        ConfigCommand::Show => {
            let ctx = RuntimeContext::load(&common, &config_file)?;
            println!(
                "{}",
                toml::to_string_pretty(&ctx.config).context("serializing config to TOML")?
            );
            Ok(())
        }
        ConfigCommand::Path => {
            println!("{}", config_file.display());
            Ok(())
        }
        ConfigCommand::Reset => {
            init_logging(&common, &LoggingConfig::default().level);
            reset_config(&config_file)?;
            println!("Wrote default config to {}", config_file.display());
            Ok(())
        }
    }
}

/// Overwrite `config_file` with the defaults without reading what is there.
fn reset_config(config_file: &Path) -> Result<()> {
    config::write_default_config(config_file)?;
    info!("reset config at {}", config_file.display());
    Ok(())
}

fn handle_completions(shell: Shell) -> Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, APP_NAME, &mut io::stdout());
    Ok(())
}
