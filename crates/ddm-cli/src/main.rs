use ddm_core::logging;

mod cli;

use crate::cli::CliCommand;

#[tokio::main]
async fn main() {
    logging::init_logging();

    if let Err(err) = CliCommand::run_from_args().await {
        eprintln!("ddm error: {err:#}");
        std::process::exit(1);
    }
}
