//! relay - submit goals to an execution backend from the command line

use clap::{CommandFactory, Parser};
use orchestrator::{ConfigLoader, Relay};
use relay_cli::commands::{self, CommandOutput};
use relay_cli::{logging, shutdown, Cli, Commands, Console, OutputFormat, RunArgs};
use std::process::ExitCode;
use tokio::io::BufReader;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    let format = cli.format;

    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        return Ok(ExitCode::SUCCESS);
    };

    if let Commands::Version = command {
        return Ok(emit(commands::version(format), format));
    }

    let mut loader = ConfigLoader::new();
    if let Some(path) = cli.config {
        loader = loader.with_explicit(path);
    }
    let config = loader.load()?;
    logging::init(&config.logging)?;

    let relay = Relay::from_config(&config)?;

    let result = match command {
        Commands::Run {
            goal,
            user_id,
            max_depth,
            extra,
        } => {
            let cancel = CancellationToken::new();
            let _signals = shutdown::install_signal_handlers(cancel.clone());
            let args = RunArgs {
                goal: goal.join(" "),
                user_id,
                max_depth,
                extra,
            };
            commands::run(&relay, args, format, cancel).await
        }
        Commands::Raw { body } => commands::raw(&relay, &body, format).await,
        Commands::Ping => commands::ping(&relay, format).await,
        Commands::Show => commands::show(&relay, format),
        Commands::Console { user_id } => {
            run_console(relay, user_id).await?;
            return Ok(ExitCode::SUCCESS);
        }
        Commands::Version => commands::version(format),
    };

    Ok(emit(result, format))
}

fn emit(result: anyhow::Result<CommandOutput>, format: OutputFormat) -> ExitCode {
    match result {
        Ok(output) => {
            println!("{}", output.text);
            if output.success {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Err(e) => {
            eprintln!("{}", commands::describe_error(&e, format));
            ExitCode::FAILURE
        }
    }
}

async fn run_console(relay: Relay, user_id: i64) -> anyhow::Result<()> {
    let (console, mut replies) = Console::new(relay, user_id);
    let _signals = shutdown::install_signal_handlers(console.cancel_token());

    let writer = tokio::spawn(async move {
        while let Some(reply) = replies.recv().await {
            println!("{}\n", reply);
        }
    });

    console.run(BufReader::new(tokio::io::stdin())).await?;
    writer.await?;
    Ok(())
}
