use anyhow::Result;
use butterfly_prepare::cli::{Cli, LogFormat};
use clap::Parser;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Logs go to stderr so `--json` output on stdout stays machine readable
fn init_tracing(format: LogFormat) -> Result<()> {
    let filter_layer = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("info"))?;

    let text_layer = (format == LogFormat::Text)
        .then(|| fmt::layer().with_target(false).with_writer(std::io::stderr));
    let json_layer = (format == LogFormat::Json).then(|| fmt::layer().json().with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(text_layer)
        .with(json_layer)
        .init();
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format)?;
    cli.run()
}
