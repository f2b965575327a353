// main.rs
// Axum server wiring: connects to MongoDB, builds the API router, and
// serves on BIND_ADDR (default :8080).

use dotenvy::dotenv;
use std::{env, net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;

use lavka::{routes, state};

#[tokio::main]
async fn main() {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lavka=info".into()),
        )
        .init();

    let state = Arc::new(
        state::init_state()
            .await
            .expect("failed to initialize MongoDB state"),
    );

    let app = routes::app(state);

    let addr: SocketAddr = env::var("BIND_ADDR")
        .unwrap_or_else(|_| "0.0.0.0:8080".to_string())
        .parse()
        .expect("invalid BIND_ADDR");
    tracing::info!("listening on http://{addr}");
    let listener = TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
