use anyhow::Result;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// `-d` beats `-v`; without either the configured level applies.
pub fn level_from_cli(cli: &crate::cli::args::Cli, configured: &str) -> tracing::Level {
    if cli.debug {
        tracing::Level::DEBUG
    } else if cli.verbose {
        tracing::Level::INFO
    } else {
        configured.parse().unwrap_or(tracing::Level::WARN)
    }
}

/// Installs the global subscriber. `RUST_LOG` directives are kept and the
/// crate's own level is added on top.
pub fn init(level: tracing::Level) -> Result<()> {
    let filter = EnvFilter::from_default_env()
        .add_directive(format!("blitzscan={}", level).parse()?)
        .add_directive(tracing::Level::WARN.into());

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .compact()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_thread_ids(false)
                .with_thread_names(false),
        )
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    Ok(())
}

/// Argument vector as a copy-pasteable shell line.
pub fn quote_argv(argv: &[String]) -> String {
    shell_words::join(argv)
}
