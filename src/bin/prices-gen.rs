use chrono::Utc;
use clap::{error::ErrorKind, Parser};
use failure::Error;
use prices_gen::commands::{generate, GenerateOptions};
use prices_gen::gofmt::Gofmt;
use prices_gen::pricing::AwsPricingProvider;
use prices_gen::wait::cancel_on;
use std::path::PathBuf;
use std::process;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Generate a Go table of EC2 on-demand prices from the AWS pricing APIs
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Output file, e.g. pkg/cloudprovider/aws/zz_generated.pricing.go
    output: PathBuf,

    /// AWS region whose prices are generated
    #[arg(short, long, default_value = "us-east-1")]
    region: String,

    /// Go package clause of the generated file
    #[arg(short, long, default_value = "aws")]
    package: String,

    /// Seconds between checks for a completed pricing update
    #[arg(long, default_value_t = 1)]
    poll_interval: u64,

    /// Give up waiting on the pricing update after this many seconds. Waits forever if unset.
    #[arg(short, long)]
    timeout: Option<u64>,

    /// gofmt binary used to format the generated source
    #[arg(long, default_value = "gofmt")]
    gofmt: PathBuf,
}

fn parse_cli() -> Cli {
    match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => e.exit(),
        Err(e) => {
            let _ = e.print();
            process::exit(1);
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    let cli = parse_cli();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let options = GenerateOptions {
        output: cli.output,
        region: cli.region,
        package: cli.package,
        poll_interval: Duration::from_secs(cli.poll_interval),
        timeout: cli.timeout.map(Duration::from_secs),
    };

    let update_started = Utc::now();
    let provider = AwsPricingProvider::from_env(&options.region).await;
    let cancel = cancel_on(tokio::signal::ctrl_c());

    let entries = generate(
        &provider,
        &Gofmt::new(cli.gofmt),
        &options,
        update_started,
        cancel,
    )
    .await?;
    info!(entries, region = provider.region(), "done");
    Ok(())
}
