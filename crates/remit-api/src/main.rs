//! Remit API server binary.

use remit_api::{Config, Server};
use remit_core::{init_logging, LogFormat};

#[tokio::main]
async fn main() {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("configuration error: {err}");
            std::process::exit(1);
        }
    };

    let format = if config.debug {
        LogFormat::Pretty
    } else {
        LogFormat::Json
    };
    init_logging(format);

    let server = Server::builder().config(config).build();
    if let Err(err) = server.serve().await {
        tracing::error!(error = %err, "Server exited with error");
        std::process::exit(1);
    }
}
