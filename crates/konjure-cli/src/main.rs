//! Konjure CLI - Expand manifest specs into Kubernetes resources

use clap::{CommandFactory, FromArgMatches, Parser, Subcommand};
use clap::error::ErrorKind;

mod commands;
mod error;
mod exit_codes;
mod logging;
mod writer;

use commands::expand::ExpandArgs;
use commands::helm_values::HelmValuesArgs;

#[derive(Parser)]
#[command(name = "konjure")]
#[command(author = "Konjure Contributors")]
#[command(version)]
#[command(about = "Expand manifest specs into Kubernetes resources", long_about = None)]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    expand: ExpandArgs,

    /// Enable debug output
    #[arg(long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge Helm values the way `helm template` would
    HelmValues(HelmValuesArgs),
}

fn exit_on_usage_error(err: clap::Error) -> ! {
    match err.kind() {
        ErrorKind::DisplayHelp
        | ErrorKind::DisplayVersion
        | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => err.exit(),
        _ => {
            let _ = err.print();
            std::process::exit(exit_codes::USAGE_ERROR)
        }
    }
}

fn main() {
    miette::set_panic_hook();

    // Raw matches are kept: helm-values needs the flag positions
    let matches = Cli::command()
        .try_get_matches()
        .unwrap_or_else(|e| exit_on_usage_error(e));
    let cli = Cli::from_arg_matches(&matches).unwrap_or_else(|e| exit_on_usage_error(e));

    logging::init(cli.debug);

    let result = match cli.command {
        Some(Commands::HelmValues(args)) => {
            let sub = matches.subcommand_matches("helm-values").cloned().unwrap_or_default();
            commands::helm_values::run(&args, &sub)
        }
        None => commands::expand::run(&cli.expand),
    };

    let code = match result {
        Ok(()) => exit_codes::SUCCESS,
        Err(err) => {
            let code = err.exit_code();
            eprintln!("{:?}", miette::Report::new(err));
            code
        }
    };
    std::process::exit(code);
}
