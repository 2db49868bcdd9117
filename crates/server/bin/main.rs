use std::process::ExitCode;

use clap::Parser;

use pgshim::routes::create_router;
use pgshim::state::create_state;
use pgshim_configuration::ServerOptions;

#[tokio::main]
pub async fn main() -> ExitCode {
    env_logger::init();

    let result = run(ServerOptions::parse()).await;
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            tracing::error!("{error:#}");
            eprintln!("{error:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(options: ServerOptions) -> anyhow::Result<()> {
    let address = options.socket_address()?;
    let state = create_state(&options).await?;
    let router = create_router(state.clone());

    let server = axum::Server::try_bind(&address)?.serve(router.into_make_service());
    tracing::info!("Starting server on {}", server.local_addr());
    server.with_graceful_shutdown(shutdown_signal()).await?;

    tracing::info!("Server stopped, closing connection pool");
    state.pool.close().await;
    Ok(())
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            tracing::error!("unable to listen for Ctrl-C: {error}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(error) => {
                tracing::error!("unable to listen for SIGTERM: {error}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
