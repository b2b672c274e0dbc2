use parley::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    parley::logging::init_tracing();

    let config = Config::from_env()?;
    parley::run(config).await
}
