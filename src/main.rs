use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Init logging
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap();
    fmt().with_env_filter(filter).init();

    // Startup banner at info level so something always prints at default verbosity
    let rust_log = std::env::var("RUST_LOG").unwrap_or_else(|_| "<unset>".to_string());
    let http_port: u16 = std::env::var("QUILLPRESS_HTTP_PORT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(5002);
    let db_folder = std::env::var("QUILLPRESS_DB_FOLDER").unwrap_or_else(|_| "data".to_string());
    // Sessions are server-side random tokens, so the secret key is surfaced
    // only as configuration state here.
    let secret_set = std::env::var("QUILLPRESS_SECRET_KEY").is_ok();
    info!(
        target: "quillpress",
        "quillpress starting: RUST_LOG='{}', http_port={}, db_root='{}', secret_key_set={}",
        rust_log, http_port, db_folder, secret_set
    );

    quillpress::server::run_with_port(http_port, &db_folder).await
}
