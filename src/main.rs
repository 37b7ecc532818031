use clap::Parser;
use paratidy::cli::{Cli, run_cli};
use paratidy::output::OutputFormatter;
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse();

    // RUST_LOG wins over the command-line flags.
    let level = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run_cli(cli) {
        OutputFormatter::error(&format!("Error: {}", e));
        std::process::exit(1);
    }
}
