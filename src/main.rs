mod app;
mod cli;

fn main() {
    // RUST_LOG controls verbosity, e.g. RUST_LOG=streamcast=debug
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    app::run(cli::parse());
}
