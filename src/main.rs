use std::process::ExitCode;

use anyhow::Context as _;
use clap::Parser as _;

fn main() -> ExitCode {
    if let Err(err) = try_main() {
        eprintln!("{err:#}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

fn try_main() -> anyhow::Result<()> {
    sitemigrate::logging::init().context("init logging")?;

    let cli = sitemigrate::cli::Cli::parse();
    tracing::debug!(?cli, "parsed cli");

    match cli.command {
        sitemigrate::cli::Command::Build(args) => {
            sitemigrate::build::run(args).context("build")?;
        }
        sitemigrate::cli::Command::Crawl(args) => {
            sitemigrate::crawl::run(args).context("crawl")?;
        }
        sitemigrate::cli::Command::Generate(args) => {
            sitemigrate::generate::run(args).context("generate")?;
        }
        sitemigrate::cli::Command::Linkmap {
            command: sitemigrate::cli::LinkMapCommand::Build(args),
        } => {
            sitemigrate::linkmap::build(args).context("linkmap build")?;
        }
        sitemigrate::cli::Command::Linkmap {
            command: sitemigrate::cli::LinkMapCommand::Check(args),
        } => {
            sitemigrate::linkmap::check(args).context("linkmap check")?;
        }
        sitemigrate::cli::Command::Relink(args) => {
            sitemigrate::relink::run(args).context("relink")?;
        }
    }

    Ok(())
}
