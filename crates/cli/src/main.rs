use anyhow::Context;
use clap::{Parser, Subcommand};
use lib::app::{choose_model, ChatApp, INIT_HINT};
use lib::catalog::ModelCatalog;
use lib::config::{self, Config};
use lib::gateway::HttpGatewayBuilder;
use lib::prompts;
use lib::routing::{self, FileSink, ProviderKind, ProviderSelection};
use lib::session::Role;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "switchboard")]
#[command(about = "Switchboard CLI: chat with OpenRouter or Ollama models through an inference gateway", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version
    Version,

    /// Create the configuration directory and a default config file.
    Init {
        /// Config file path (default: SWITCHBOARD_CONFIG_PATH or ~/.switchboard/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,
    },

    /// List selectable models for a provider.
    Models {
        /// Config file path (default: SWITCHBOARD_CONFIG_PATH or ~/.switchboard/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,

        /// "openrouter" or "ollama"
        #[arg(long, short, default_value = "openrouter")]
        provider: ProviderKind,
    },

    /// Write the gateway routing config for a provider and model.
    Emit {
        /// Config file path (default: SWITCHBOARD_CONFIG_PATH or ~/.switchboard/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,

        /// "openrouter" or "ollama"
        #[arg(long, short)]
        provider: ProviderKind,

        /// Model id (e.g. "openai/gpt-4o-mini" or "llama3.2:latest")
        #[arg(long, short)]
        model: String,

        /// Output path (default: gateway.routingConfigPath from config). Use "-" for stdout.
        #[arg(long, short, value_name = "PATH")]
        output: Option<PathBuf>,
    },

    /// Chat interactively through the gateway.
    Chat {
        /// Config file path (default: SWITCHBOARD_CONFIG_PATH or ~/.switchboard/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,

        /// "openrouter" or "ollama" (default from config, else openrouter)
        #[arg(long, short)]
        provider: Option<ProviderKind>,

        /// Model id (default from config, else the provider's default)
        #[arg(long, short)]
        model: Option<String>,

        /// System prompt preset (e.g. "Technical Expert")
        #[arg(long)]
        preset: Option<String>,

        /// Custom system prompt; replaces the preset
        #[arg(long, value_name = "TEXT", conflicts_with = "system_prompt_file")]
        system_prompt: Option<String>,

        /// Read the custom system prompt from a file
        #[arg(long, value_name = "PATH")]
        system_prompt_file: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Version) => {
            println!("switchboard {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Init { config }) => {
            if let Err(e) = run_init(config) {
                log::error!("init failed: {}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Models { config, provider }) => {
            if let Err(e) = run_models(config, provider).await {
                log::error!("models failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Emit {
            config,
            provider,
            model,
            output,
        }) => {
            if let Err(e) = run_emit(config, provider, model, output) {
                log::error!("emit failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Chat {
            config,
            provider,
            model,
            preset,
            system_prompt,
            system_prompt_file,
        }) => {
            let prompt = ChatPrompt {
                preset,
                text: system_prompt,
                file: system_prompt_file,
            };
            if let Err(e) = run_chat(config, provider, model, prompt).await {
                log::error!("chat failed: {:#}", e);
                eprintln!("error: {:#}", e);
                std::process::exit(1);
            }
        }
        None => {
            println!("Run with --help for usage");
        }
    }
}

fn run_init(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    let path = config_path.unwrap_or_else(config::default_config_path);
    let _dir = lib::init::init_config_dir(&path)?;
    println!(
        "initialized configuration at {}",
        path.parent().unwrap_or(Path::new(".")).display()
    );
    Ok(())
}

fn print_warnings(warnings: Vec<String>) {
    for w in warnings {
        eprintln!("warning: {}", w);
    }
}

async fn run_models(config_path: Option<PathBuf>, provider: ProviderKind) -> anyhow::Result<()> {
    let (config, _) = config::load_config(config_path)?;
    let catalog = ModelCatalog::from_config(&config);
    let models = catalog.models_for(provider).await;
    print_warnings(catalog.take_warnings().await);
    for m in models {
        println!("{}", m);
    }
    Ok(())
}

fn run_emit(
    config_path: Option<PathBuf>,
    provider: ProviderKind,
    model: String,
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    let selection = ProviderSelection::new(provider, model)?;
    if output.as_deref() == Some(Path::new("-")) {
        let mut text = String::new();
        routing::write_routing_config(&mut text, &selection)?;
        print!("{}", text);
        return Ok(());
    }
    let (config, path) = config::load_config(config_path)?;
    let out = output.unwrap_or_else(|| config::resolve_routing_config_path(&config, &path));
    let mut sink = FileSink::new(out);
    routing::write_routing_config(&mut sink, &selection)?;
    println!("wrote {}", sink.path().display());
    Ok(())
}

/// System prompt options from the command line.
struct ChatPrompt {
    preset: Option<String>,
    text: Option<String>,
    file: Option<PathBuf>,
}

fn initial_system_prompt(config: &Config, prompt: ChatPrompt) -> anyhow::Result<String> {
    let from_file = match &prompt.file {
        Some(path) => Some(
            prompts::load_prompt_file(path)
                .with_context(|| format!("system prompt file {} is missing or empty", path.display()))?,
        ),
        None => None,
    };
    let custom = from_file
        .or(prompt.text)
        .or_else(|| config.chat.system_prompt.clone());
    let preset = prompt
        .preset
        .or_else(|| config.chat.system_prompt_preset.clone());
    Ok(prompts::resolve_system_prompt(preset.as_deref(), custom.as_deref())?)
}

async fn run_chat(
    config_path: Option<PathBuf>,
    provider: Option<ProviderKind>,
    model: Option<String>,
    prompt: ChatPrompt,
) -> anyhow::Result<()> {
    let (config, path) = config::load_config(config_path)?;
    let catalog = ModelCatalog::from_config(&config);

    let provider = provider
        .or(config.chat.default_provider)
        .unwrap_or(ProviderKind::OpenRouter);
    let requested = model.or_else(|| config.chat.default_model.clone());
    let selection = choose_model(&catalog, provider, requested.as_deref()).await;
    print_warnings(catalog.take_warnings().await);
    let selection = selection?;

    let system_prompt = initial_system_prompt(&config, prompt)?;
    let settings = config::gateway_settings(&config, &path);
    let sink = FileSink::new(&settings.config_path);
    let mut app = ChatApp::new(
        Box::new(HttpGatewayBuilder),
        settings,
        Box::new(sink),
        system_prompt,
    );
    app.select(selection)
        .await
        .with_context(|| INIT_HINT.to_string())?;

    if let Some(s) = app.selection() {
        println!(
            "chatting with {} via {} (type /help for commands)",
            s,
            app.settings().gateway_url
        );
    }
    repl(&mut app, &catalog).await
}

/// One line of REPL input.
#[derive(Debug, PartialEq, Eq)]
enum ReplCommand {
    Message(String),
    Provider(Option<String>),
    Model(Option<String>),
    Models,
    Refresh,
    Presets,
    Preset(Option<String>),
    Prompt(Option<String>),
    History,
    Episode,
    Help,
    Exit,
    Unknown(String),
    Empty,
}

fn parse_command(line: &str) -> ReplCommand {
    let input = line.trim();
    if input.is_empty() {
        return ReplCommand::Empty;
    }
    let Some(rest) = input.strip_prefix('/') else {
        return ReplCommand::Message(line.to_string());
    };
    let (name, arg) = match rest.split_once(char::is_whitespace) {
        Some((n, a)) => (n, Some(a.trim().to_string()).filter(|a| !a.is_empty())),
        None => (rest, None),
    };
    match name.to_lowercase().as_str() {
        "exit" | "quit" => ReplCommand::Exit,
        "provider" => ReplCommand::Provider(arg),
        "model" => ReplCommand::Model(arg),
        "models" => ReplCommand::Models,
        "refresh" => ReplCommand::Refresh,
        "presets" => ReplCommand::Presets,
        "preset" => ReplCommand::Preset(arg),
        "prompt" => ReplCommand::Prompt(arg),
        "history" => ReplCommand::History,
        "episode" => ReplCommand::Episode,
        "help" => ReplCommand::Help,
        other => ReplCommand::Unknown(other.to_string()),
    }
}

const HELP: &str = "\
/provider <openrouter|ollama>  switch provider (picks its default model)
/model <id>                    switch model within the current provider
/models                        list models for the current provider
/refresh                       forget cached model lists
/presets                       list system prompt presets
/preset <name>                 use a preset system prompt
/prompt [text]                 show or replace the system prompt
/history                       show the conversation
/episode                       show the episode id
/exit, /quit                   leave";

async fn repl(app: &mut ChatApp, catalog: &ModelCatalog) -> anyhow::Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut lines = stdin.lock().lines();

    loop {
        if let Some(reason) = app.halted() {
            anyhow::bail!("{} ({})", reason, INIT_HINT);
        }
        write!(stdout, "> ")?;
        stdout.flush()?;
        let Some(line) = lines.next() else {
            break;
        };
        let line = line?;

        match parse_command(&line) {
            ReplCommand::Empty => continue,
            ReplCommand::Exit => break,
            ReplCommand::Help => println!("{}", HELP),
            ReplCommand::Message(text) => match app.submit(&text).await {
                Ok(turn) => println!("< {}", turn.content.trim()),
                Err(e) => eprintln!("chat error: {}", e),
            },
            ReplCommand::Provider(None) | ReplCommand::Model(None) | ReplCommand::Preset(None) => {
                eprintln!("missing argument; type /help for usage");
            }
            ReplCommand::Provider(Some(name)) => match name.parse::<ProviderKind>() {
                Ok(provider) => reselect(app, catalog, provider, None).await,
                Err(e) => eprintln!("{}", e),
            },
            ReplCommand::Model(Some(model)) => {
                let provider = app
                    .selection()
                    .map(|s| s.provider())
                    .unwrap_or(ProviderKind::OpenRouter);
                reselect(app, catalog, provider, Some(&model)).await;
            }
            ReplCommand::Models => {
                let current = app.selection().cloned();
                let provider = current
                    .as_ref()
                    .map(|s| s.provider())
                    .unwrap_or(ProviderKind::OpenRouter);
                let models = catalog.models_for(provider).await;
                print_warnings(catalog.take_warnings().await);
                for m in models {
                    let marker = if current.as_ref().map(|s| s.model_id()) == Some(m.as_str()) {
                        "*"
                    } else {
                        " "
                    };
                    println!("{} {}", marker, m);
                }
            }
            ReplCommand::Refresh => {
                catalog.invalidate().await;
                println!("model lists will be refetched");
            }
            ReplCommand::Presets => {
                for p in prompts::PRESETS.iter() {
                    println!("{}: {}", p.name, p.text);
                }
            }
            ReplCommand::Preset(Some(name)) => match prompts::preset(&name) {
                Some(p) => {
                    app.set_system_prompt(p.text);
                    println!("system prompt: {}", p.text);
                }
                None => eprintln!("unknown preset: {} (see /presets)", name),
            },
            ReplCommand::Prompt(None) => println!("system prompt: {}", app.session().system_prompt()),
            ReplCommand::Prompt(Some(text)) => {
                app.set_system_prompt(text);
                println!("system prompt updated");
            }
            ReplCommand::History => {
                for turn in app.session().transcript() {
                    let who = match turn.role {
                        Role::User => ">",
                        Role::Assistant => "<",
                    };
                    println!("{} {}", who, turn.content.trim());
                }
            }
            ReplCommand::Episode => match app.session().episode_id() {
                Some(id) => println!("episode {}", id),
                None => println!("no episode yet"),
            },
            ReplCommand::Unknown(name) => eprintln!("unknown command /{}; type /help", name),
        }
    }

    Ok(())
}

/// Switch provider/model. Choice errors are reported and the current selection kept;
/// config write and gateway failures halt the app (checked at the top of the loop).
async fn reselect(app: &mut ChatApp, catalog: &ModelCatalog, provider: ProviderKind, model: Option<&str>) {
    let choice = choose_model(catalog, provider, model).await;
    print_warnings(catalog.take_warnings().await);
    match choice {
        Ok(selection) => match app.select(selection).await {
            Ok(()) => {
                if let Some(s) = app.selection() {
                    println!("now chatting with {}", s);
                }
            }
            Err(e) => eprintln!("error: {}", e),
        },
        Err(e) => eprintln!("{}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_a_message() {
        assert_eq!(parse_command("  hello there "), ReplCommand::Message("  hello there ".into()));
        assert_eq!(parse_command("   "), ReplCommand::Empty);
    }

    #[test]
    fn slash_commands_take_optional_arguments() {
        assert_eq!(parse_command("/QUIT"), ReplCommand::Exit);
        assert_eq!(parse_command("/provider ollama"), ReplCommand::Provider(Some("ollama".into())));
        assert_eq!(parse_command("/model"), ReplCommand::Model(None));
        assert_eq!(
            parse_command("/preset Technical Expert"),
            ReplCommand::Preset(Some("Technical Expert".into()))
        );
        assert_eq!(
            parse_command("/prompt   You are terse.  "),
            ReplCommand::Prompt(Some("You are terse.".into()))
        );
        assert_eq!(parse_command("/nope"), ReplCommand::Unknown("nope".into()));
    }
}
