use central_registry::{config::Config, logging, server};

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: jemallocator::Jemalloc = jemallocator::Jemalloc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    logging::init(&config.logging.level);

    tracing::info!(port = config.server.port, "Starting service registry...");
    server::start(config).await?;
    Ok(())
}
