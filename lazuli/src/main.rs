use colored::Colorize;
use lazuli::commands::command_argument_builder;
use lazuli::handlers::{handle_run, init_tracing, print_banner};
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing::warn;

#[tokio::main]
async fn main() -> ExitCode {
    let cmd = command_argument_builder();
    let chosen_command = cmd.get_matches();
    let quiet = chosen_command.get_flag("quiet");
    let verbose = chosen_command.get_flag("verbose");

    init_tracing(quiet, verbose);

    // Show banner unless --quiet flag is set
    if !quiet {
        print_banner();
    }

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, abandoning in-flight pages");
            interrupt.cancel();
        }
    });

    let run_args = match chosen_command.subcommand() {
        Some(("run", primary_command)) => primary_command,
        None => &chosen_command,
        _ => unreachable!("clap should ensure we don't get here"),
    };

    match handle_run(run_args, quiet, cancel).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {:#}", "✗".red(), e);
            ExitCode::FAILURE
        }
    }
}
