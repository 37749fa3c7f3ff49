use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub fn init_logging() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dispatcher=info,tower_http=debug,batch_driver=debug,server=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
