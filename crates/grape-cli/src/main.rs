use anyhow::{Context, Result, anyhow};
use clap::Parser;
use grape_cli::{Cli, Commands, EdgeList, RunArgs, RunConfig, render};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "grape_core=debug,grape_cli=debug".into())
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "grape_core=warn,grape_cli=warn".into())
    };
    // Results go to stdout, so logs stay on stderr
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = RunConfig::load_or_default(cli.config.as_deref())?;

    match cli.command {
        Commands::Run(args) => execute_run(args, config).await,
        Commands::Config => {
            config
                .validate()
                .map_err(|e| anyhow!("invalid configuration: {}", e))?;
            print!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

async fn execute_run(args: RunArgs, mut config: RunConfig) -> Result<()> {
    args.apply(&mut config);
    let input = config
        .input
        .clone()
        .context("no input edge list given on the command line or in the config")?;

    let graph = EdgeList::load(&input)?;
    let run_config = config.clone();
    // Workers block on the cluster barrier, keep them off the async runtime
    let report = tokio::task::spawn_blocking(move || grape_cli::run(&run_config, &graph))
        .await
        .context("run task panicked")??;

    println!("{}", render(&report.rows, config.format)?.trim_end());
    if args.stats {
        eprintln!(
            "app={} rounds={} frames_sent={} bytes_sent={} elapsed={:?}",
            report.app, report.rounds, report.frames_sent, report.bytes_sent, report.elapsed
        );
    }
    Ok(())
}
