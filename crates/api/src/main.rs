#[tokio::main]
async fn main() {
    skirmish_observability::init();

    let api_key = std::env::var("SKIRMISH_API_KEY").unwrap_or_else(|_| {
        tracing::warn!("SKIRMISH_API_KEY not set; using insecure dev default");
        "dev-key".to_string()
    });

    let app = skirmish_api::app::build_app(api_key);

    let listener = tokio::net::TcpListener::bind("0.0.0.0:8080")
        .await
        .expect("failed to bind 0.0.0.0:8080");

    tracing::info!("listening on {}", listener.local_addr().unwrap());

    axum::serve(listener, app).await.unwrap();
}
