use clap::Parser;

mod app;
mod config;
mod interactive;
mod opts;
mod report;

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    let opts = opts::Opts::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(opts.verbose.tracing_level_filter().into()))
        .init();

    app::run(opts).await
}
