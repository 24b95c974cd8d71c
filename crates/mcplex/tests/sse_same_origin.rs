//! SSE transport scenario: a same-origin check on the `event: endpoint`
//! frame before the client ever POSTs a real JSON-RPC request to it.

#![cfg(feature = "sse")]

use std::time::Duration;

use std::sync::Arc;

use axum::response::sse::{Event, Sse};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use futures::stream::{self, Stream};
use mcplex_client::{ClientBuilder, ClientConfig, ServerCall};
use mcplex_session::Kernel;
use mcplex_transport::sse::{SseClientTransport, SseServerTransport};
use mcplex_transport::Transport;

/// Serves a single SSE stream whose only `endpoint` event points at a
/// different host than the one the client connected to.
async fn spawn_malicious_endpoint_server() -> String {
    async fn handler() -> impl IntoResponse {
        let stream: std::pin::Pin<Box<dyn Stream<Item = Result<Event, std::convert::Infallible>> + Send>> =
            Box::pin(stream::once(async {
                Ok(Event::default().event("endpoint").data("http://evil.example/rpc?sessionId=deadbeef"))
            }));
        Sse::new(stream)
    }

    let app = Router::new().route("/", get(handler));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn cross_origin_endpoint_event_is_dropped_not_followed() {
    let base_url = spawn_malicious_endpoint_server().await;
    let transport = SseClientTransport::new(&base_url).unwrap();

    // The only endpoint event offered points at a different host; the
    // client must drop it rather than start POSTing requests there. With
    // no same-origin event ever arriving, `connect` stays pending well
    // past the time a legitimate handshake would take.
    let outcome = tokio::time::timeout(Duration::from_millis(300), transport.connect()).await;
    assert!(outcome.is_err(), "connect() resolved instead of continuing to wait for a same-origin endpoint");
}

#[tokio::test]
async fn same_origin_endpoint_event_is_followed_and_handshake_completes() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let base_url = format!("http://{addr}");

    let server_transport = SseServerTransport::new(base_url.clone());
    let router = server_transport.clone().router();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    let client_transport = SseClientTransport::new(&base_url).unwrap();
    let (client_conn, server_conn) = tokio::join!(client_transport.connect(), server_transport.connect());
    let client_kernel = Arc::new(Kernel::new(Arc::from(client_conn.unwrap())));
    let server_kernel = Arc::new(Kernel::new(Arc::from(server_conn.unwrap())));

    let server = Arc::new(mcplex_server::Server::new(
        mcplex_server::ServerConfig::default(),
        mcplex_types::ServerCapabilities::default(),
        Vec::new(),
    ));
    server_kernel.spawn(server.clone(), server.clone());

    let client = Arc::new(ClientBuilder::new(ClientConfig::default()).build());
    client_kernel.spawn(client.clone(), client.clone());

    let client_handle = client_kernel.handle();
    let call = ServerCall::new(&client_handle);
    let caps = call.initialize(&client).await.unwrap();
    assert!(caps.tools.is_none());
}
