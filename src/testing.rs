//! helpers shared by the http tests

use std::net::SocketAddr;

use axum::Router;

/// serve `app` on an ephemeral local port for the rest of the test
pub async fn serve(app: Router) -> SocketAddr {
	let server = axum::Server::bind(&SocketAddr::from(([127, 0, 0, 1], 0))).serve(app.into_make_service());
	let addr = server.local_addr();
	tokio::spawn(server);
	addr
}
