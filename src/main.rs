use clap::Parser;
use log::debug;

use freespeek_admin::cli::Cli;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    if let Err(e) = freespeek_admin::utils::block_on(cli.run()) {
        debug!("Exiting after error: {e:?}");
        std::process::exit(1);
    }
}
