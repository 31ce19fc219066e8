use anyhow::{bail, Context};
use clap::{ArgAction, CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use colored::Colorize;
use credhub_acceptance::commands::{self, ProbeOptions};
use credhub_acceptance::configuration::{working_dir, CONFIG_FILE_NAME};
use credhub_acceptance::logging;
use credhub_acceptance::TestConfig;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// Prepare and check a CredHub acceptance test environment.
#[derive(Parser)]
#[clap(author, version = clap::crate_version!(), max_term_width = 100, about)]
struct Cli {
    #[clap(subcommand)]
    command: Option<Commands>,

    /// Increase logging level (-v: info, -vv: debug, -vvv: trace)
    #[clap(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Path to the suite config (default: ./config.json)
    #[clap(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Prints the effective suite configuration
    Config,
    /// Writes a fresh set of PKI fixtures
    Certs {
        /// Directory to write certificates and keys into
        #[clap(short, long, default_value = "certs")]
        out: PathBuf,
    },
    /// Sends one mutual TLS request to the credential service
    Probe {
        /// Client certificate (PEM)
        #[clap(long)]
        cert: PathBuf,

        /// Client private key (PEM)
        #[clap(long)]
        key: PathBuf,

        /// Trusted CA bundle (default: <credential_root>/ca.pem)
        #[clap(long)]
        ca: Option<PathBuf>,

        /// API base URL (default: api_url from the config)
        #[clap(long)]
        url: Option<String>,
    },
    /// Prints a unique credential name
    Name {
        /// Print an API path ending in this suffix instead
        #[clap(long)]
        path: Option<String>,
    },
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

fn config_path(cli_path: Option<&Path>) -> Result<PathBuf, anyhow::Error> {
    match cli_path {
        Some(path) => Ok(path.to_path_buf()),
        None => Ok(working_dir()
            .context("Failed to get working directory")?
            .join(CONFIG_FILE_NAME)),
    }
}

fn load_config(cli_path: Option<&Path>) -> Result<TestConfig, anyhow::Error> {
    let path = config_path(cli_path)?;
    let config = TestConfig::load_from(&path)?;
    trace!("{:?}", config);
    Ok(config)
}

pub async fn run() -> Result<(), anyhow::Error> {
    let cli = Cli::parse();

    let command = match cli.command {
        Some(cmd) => cmd,
        None => {
            Cli::command().print_help()?;
            return Ok(());
        }
    };

    if let Commands::Completions { shell } = &command {
        let mut cmd = Cli::command();
        generate(*shell, &mut cmd, "credhub-acceptance", &mut std::io::stdout());
        return Ok(());
    }

    tracing::subscriber::set_global_default(logging::subscriber(cli.verbose))
        .context("Failed to set tracing subscriber")?;
    debug!("Argument parsing complete.");

    let mut stdout = std::io::stdout();
    match &command {
        Commands::Config => {
            let config = load_config(cli.config.as_deref())?;
            commands::config_command(&config, &mut stdout)?;
        }
        Commands::Certs { out } => {
            commands::certs_command(out, &mut stdout)?;
        }
        Commands::Probe { cert, key, ca, url } => {
            // The config is only needed for defaults the flags leave open.
            let config = if ca.is_some() && url.is_some() {
                None
            } else {
                Some(load_config(cli.config.as_deref())?)
            };
            let options = ProbeOptions {
                cert: cert.clone(),
                key: key.clone(),
                ca: ca.clone(),
                url: url.clone(),
            };
            let outcome = commands::probe_command(config.as_ref(), &options).await?;
            match &outcome.error {
                None => {
                    println!(
                        "{} {}",
                        "accepted".green(),
                        outcome.status.map(|s| s.to_string()).unwrap_or_default()
                    );
                    println!("{}", outcome.body);
                }
                Some(error) => {
                    eprintln!("{} {}", "rejected".red(), error);
                    bail!("mutual TLS request was rejected");
                }
            }
        }
        Commands::Name { path } => {
            println!("{}", commands::name_command(path.as_deref()));
        }
        Commands::Completions { shell: _ } => {
            unreachable!("Completions should be handled before this point");
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    match run().await {
        Ok(()) => {}
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(1);
        }
    }
}
