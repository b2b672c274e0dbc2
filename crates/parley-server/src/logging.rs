use tracing_subscriber::EnvFilter;

/// `RUST_LOG` wins; otherwise the hub and HTTP layer log at debug.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "parley=debug,parley_gateway=debug,parley_api=debug,tower_http=debug".into()),
        )
        .init();
}
