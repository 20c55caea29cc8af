use clap::{CommandFactory, Parser};
use pnadc_fetcher::cli::{args::Args, commands};
use std::process;

fn main() {
    let args = Args::parse();

    if args.command.is_none() {
        let _ = Args::command().print_help();
        println!();
        process::exit(0);
    }

    commands::setup_logging(&args);

    let runtime = tokio::runtime::Runtime::new().unwrap_or_else(|e| {
        eprintln!("Failed to create async runtime: {}", e);
        process::exit(1);
    });

    let result = runtime.block_on(commands::run_until_interrupted(
        commands::run(args),
        tokio::signal::ctrl_c(),
    ));

    // An interrupted transfer is never renamed into place
    runtime.shutdown_background();

    if let Err(error) = result {
        eprintln!("Error: {:#}", error);
        process::exit(1);
    }
}
