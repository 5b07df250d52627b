use anyhow::Result;
use clap::Parser;
use serde_json::json;
use tracing::Instrument;

mod cli;

use cli::commands::actions::ActionsCommand;
use cli::commands::attach::AttachCommand;
use cli::commands::init::InitConfigCommand;
use cli::commands::list::ListCommand;
use cli::commands::show::ShowCommand;
use cli::commands::submit::SubmitCommand;
use cli::commands::transition::TransitionCommand;
use cli::commands::{Command, Workspace};
use cli::{Cli, Commands};
use complaint_workflow::{
    create_workflow_span, generate_correlation_id, init_telemetry, WorkflowError,
};

fn main() {
    let cli = Cli::parse();
    let code = match run(cli) {
        Ok(()) => 0,
        Err(e) => report(&e),
    };
    std::process::exit(code);
}

fn run(cli: Cli) -> Result<()> {
    if let Commands::InitConfig { force } = cli.command {
        return InitConfigCommand::new(force).execute();
    }

    let config = complaint_workflow::config()?;
    init_telemetry(&config.observability)?;

    let span = create_workflow_span(cli.command.name(), &generate_correlation_id());
    let command = async move {
        let workspace = Workspace::open(config, cli.token).await?;
        let result = match cli.command {
            Commands::Submit {
                title,
                description,
                location,
                category,
            } => {
                SubmitCommand::new(title, description, location, category)
                    .execute(&workspace)
                    .await
            }
            Commands::Attach { id, file_ref } => {
                AttachCommand { id, file_ref }.execute(&workspace).await
            }
            Commands::Transition { id, status } => {
                TransitionCommand { id, status }.execute(&workspace).await
            }
            Commands::Show { id } => ShowCommand { id }.execute(&workspace).await,
            Commands::List { mine, status } => {
                ListCommand { mine, status }.execute(&workspace).await
            }
            Commands::Actions { id } => ActionsCommand { id }.execute(&workspace).await,
            Commands::InitConfig { .. } => Ok(()),
        };
        workspace.close().await;
        result
    };
    tokio::runtime::Runtime::new()?.block_on(command.instrument(span))
}

/// Print the failure and pick an exit code. Workflow errors are reported as
/// JSON on stdout so callers can branch on `error`.
fn report(error: &anyhow::Error) -> i32 {
    match error.downcast_ref::<WorkflowError>() {
        Some(workflow_error) => {
            let kind = workflow_error.kind();
            let mut body = json!({
                "error": kind.as_str(),
                "message": workflow_error.to_string(),
            });
            if let WorkflowError::InvalidTransition { allowed, .. } = workflow_error {
                body["allowed"] = json!(allowed);
            }
            println!("{body}");
            kind.exit_code()
        }
        None => {
            eprintln!("❌ {error:#}");
            1
        }
    }
}
