use aviv_chart::Cli;
use clap::Parser;
use std::process;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    aviv_chart::logging::init(cli.chart.verbose);

    if let Err(err) = aviv_chart::run(cli).await {
        eprintln!("Error: {:#}", err);
        process::exit(1);
    }
}
