//! Listener setup and serving.

use axum::Router;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::path::Path;
use tokio::net::{TcpListener, UnixListener};
use tracing::{debug, info};

/// Bind the plugin socket.
///
/// The parent directory is created with mode 0700 so only the owner can
/// reach the socket. A stale socket left by a previous run is removed.
pub async fn bind_unix_socket(path: &Path) -> io::Result<UnixListener> {
    if let Some(dir) = path.parent() {
        tokio::fs::DirBuilder::new()
            .recursive(true)
            .mode(0o700)
            .create(dir)
            .await?;
    }

    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!(path = %path.display(), "Removed stale socket"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }

    let listener = UnixListener::bind(path)?;
    info!("Listening on: unix://{}", path.display());
    Ok(listener)
}

/// Remove the socket and, if nothing else lives there, its directory.
pub async fn remove_unix_socket(path: &Path) {
    let _ = tokio::fs::remove_file(path).await;
    if let Some(dir) = path.parent() {
        let _ = tokio::fs::remove_dir(dir).await;
    }
}

/// Serve `router` on a Unix socket until `shutdown` resolves.
pub async fn serve_unix<F>(router: Router, path: &Path, shutdown: F) -> io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = bind_unix_socket(path).await?;
    let result = axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await;
    remove_unix_socket(path).await;
    result
}

/// Serve `router` on a TCP address until `shutdown` resolves.
pub async fn serve_tcp<F>(router: Router, addr: SocketAddr, shutdown: F) -> io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind(addr).await?;
    info!("Listening on: http://{}", listener.local_addr()?);
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
}
