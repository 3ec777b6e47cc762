//! Local key-listing server.
//!
//! An axum router answering fixed `(status, body)` responses by request path
//! on 127.0.0.1. Unknown paths get 404. The server runs on its own
//! current-thread runtime in a background thread, so it serves both async
//! tests and tests that drive the `isoforge` binary synchronously.

use axum::Router;
use axum::extract::State;
use axum::http::{StatusCode, Uri};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::JoinHandle;
use tokio::sync::oneshot;

#[derive(Clone)]
struct Listings {
    routes: Arc<HashMap<String, (StatusCode, String)>>,
    hits: Arc<AtomicUsize>,
}

pub struct KeyServer {
    addr: SocketAddr,
    hits: Arc<AtomicUsize>,
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl KeyServer {
    /// Start serving `routes` (path, status, body).
    pub fn start(routes: &[(&str, u16, &str)]) -> Self {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind key server");
        listener
            .set_nonblocking(true)
            .expect("key server non-blocking");
        let addr = listener.local_addr().expect("key server address");

        let routes: HashMap<String, (StatusCode, String)> = routes
            .iter()
            .map(|(path, status, body)| {
                let status = StatusCode::from_u16(*status).expect("valid status code");
                (path.to_string(), (status, body.to_string()))
            })
            .collect();
        let hits = Arc::new(AtomicUsize::new(0));
        let state = Listings {
            routes: Arc::new(routes),
            hits: Arc::clone(&hits),
        };
        let app = Router::new().fallback(serve_listing).with_state(state);

        let (shutdown, stopped) = oneshot::channel::<()>();
        let handle = std::thread::spawn(move || {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .expect("key server runtime");
            runtime.block_on(async move {
                let listener =
                    tokio::net::TcpListener::from_std(listener).expect("key server listener");
                axum::serve(listener, app)
                    .with_graceful_shutdown(async {
                        let _ = stopped.await;
                    })
                    .await
                    .expect("key server failed");
            });
        });

        Self {
            addr,
            hits,
            shutdown: Some(shutdown),
            handle: Some(handle),
        }
    }

    /// Serve one identity's listing at `/<identity>.keys`.
    pub fn with_listing(identity: &str, listing: &str) -> Self {
        let path = format!("/{}.keys", identity);
        Self::start(&[(path.as_str(), 200, listing)])
    }

    /// Base URL, without trailing slash.
    pub fn endpoint(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Requests served so far.
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

impl Drop for KeyServer {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

async fn serve_listing(State(listings): State<Listings>, uri: Uri) -> (StatusCode, String) {
    listings.hits.fetch_add(1, Ordering::SeqCst);
    listings
        .routes
        .get(uri.path())
        .cloned()
        .unwrap_or((StatusCode::NOT_FOUND, "Not Found".to_string()))
}
