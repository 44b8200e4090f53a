//! Resolver service binary entrypoint.
//! Boots the Axum HTTP server with the resolution cascade wired from config.

use shuttle_axum::ShuttleAxum;

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();

    ytruth_resolver::init_tracing();

    let router = ytruth_resolver::app().await?;
    tracing::info!("resolver router ready");

    Ok(router.into())
}
