//! Shared test utilities for scope-tc integration tests.

#![allow(dead_code)]

use reqwest::{Client, Response as ReqwestResponse};
use scope_tc::rest::{AppState, create_router};
use scope_tc::{ContainerStore, ControlDispatcher, ControlRegistry, PluginConfig, ReportBuilder};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Build the router state the binary uses, over the given store.
pub fn app_state(store: &ContainerStore) -> Arc<AppState> {
    let registry = ControlRegistry::builtin();
    Arc::new(AppState {
        reporter: ReportBuilder::new(store.clone(), registry.clone(), &PluginConfig::default()),
        dispatcher: ControlDispatcher::new(store.clone(), registry),
    })
}

/// Test server serving the plugin router on a loopback port.
pub struct TestServer {
    pub addr: SocketAddr,
    pub client: Client,
    pub store: ContainerStore,
    shutdown_tx: tokio::sync::oneshot::Sender<()>,
}

impl TestServer {
    /// Spawn a server over an empty store.
    pub async fn spawn() -> Self {
        Self::spawn_with(ContainerStore::default()).await
    }

    /// Spawn a server over `store`.
    pub async fn spawn_with(store: ContainerStore) -> Self {
        let router = create_router(app_state(&store));

        // Use port 0 to let the OS choose an available port
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind");
        let addr = listener.local_addr().unwrap();

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .expect("Server error");
        });

        Self {
            addr,
            client: Client::new(),
            store,
            shutdown_tx,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Perform a GET request.
    pub async fn get(&self, path: &str) -> ReqwestResponse {
        self.client
            .get(self.url(path))
            .send()
            .await
            .expect("Request failed")
    }

    /// Perform a POST request with JSON body.
    pub async fn post_json<T: Serialize>(&self, path: &str, body: &T) -> ReqwestResponse {
        self.client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .expect("Request failed")
    }

    /// Perform a POST request with a raw body.
    pub async fn post_raw(&self, path: &str, body: &'static str) -> ReqwestResponse {
        self.client
            .post(self.url(path))
            .body(body)
            .send()
            .await
            .expect("Request failed")
    }

    /// Shutdown the server.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
    }
}
