use std::net::SocketAddr;

use clap::Parser;
use tasktrack::cli::{
    Args, build_config, handle_promote_admin, init_logging, load_secrets, open_database,
};
use tasktrack::create_app;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let args = Args::parse();

    init_logging(&args.log_format);

    let Some((access_secret, refresh_secret)) = load_secrets(&args) else {
        std::process::exit(1);
    };

    let Some(db) = open_database(&args.database).await else {
        std::process::exit(1);
    };

    if let Some(email) = args.promote_admin.as_deref() {
        handle_promote_admin(&db, email).await;
    }

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| {
            error!(address = %addr, error = %e, "Failed to bind");
            std::process::exit(1);
        });

    let local_addr = listener.local_addr().unwrap_or_else(|e| {
        error!(error = %e, "Failed to read local address");
        std::process::exit(1);
    });

    let config = build_config(&args, db, access_secret, refresh_secret);
    let app = create_app(&config);

    info!(
        address = %local_addr,
        environment = ?args.environment,
        access_ttl_secs = args.access_token_ttl.as_secs(),
        refresh_ttl_secs = args.refresh_token_ttl.as_secs(),
        "Listening"
    );

    let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
    if let Err(e) = axum::serve(listener, make_service).await {
        error!(error = %e, "Server error");
        std::process::exit(1);
    }
}
