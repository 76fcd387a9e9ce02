use poser::PoserServer;

#[tokio::main]
async fn main() -> Result<(), poser::PoserError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let addr =
        std::env::var("POSER_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());

    let server = PoserServer::builder().bind(&addr).build().await?;
    if let Ok(local) = server.local_addr() {
        tracing::info!(%local, "listening for players on ws://{local}/ws/<room>");
    }
    server.run().await
}
