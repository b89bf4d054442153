use anyhow::Context as _;

/// Default filter when `RUST_LOG` is unset. The HTML parser and HTTP stack log
/// per-token and per-connection detail at debug, so they stay at warn.
const DEFAULT_FILTER: &str = "info,html5ever=warn,selectors=warn,reqwest=warn,hyper_util=warn";

pub fn init() -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(DEFAULT_FILTER))
        .context("build log filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| anyhow::anyhow!("initialize tracing subscriber: {err}"))?;

    Ok(())
}
