// Request/response transport over HTTP/1.1

use async_trait::async_trait;
use hyper::client::HttpConnector;
use hyper::header::CONTENT_TYPE;
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Client, Method, Request, Response, Server, StatusCode};
use std::collections::HashMap;
use std::convert::Infallible;
use std::net::{SocketAddr, TcpListener};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, trace, warn};

use locus::{AsyncQueue, ChoreographyError, Location, Result};
use locus_choreography::{spawn_pump, Delivery, Envelope, Subscription, Transport};

use crate::config::HttpConfig;

const ENVELOPE_PATH: &str = "/envelope";
const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

fn transport_error(e: impl std::fmt::Display) -> ChoreographyError {
    ChoreographyError::Transport(e.to_string())
}

/// One participant's endpoint: an HTTP server for inbound envelopes plus a
/// client for outbound ones.
pub struct HttpTransport<L: Location> {
    location: L,
    locations: Vec<L>,
    peers: HashMap<L, SocketAddr>,
    local_addr: SocketAddr,
    client: Client<HttpConnector>,
    inbox: Arc<AsyncQueue<Envelope<L>>>,
    shutdown: Mutex<Option<oneshot::Sender<()>>>,
    server: Mutex<Option<JoinHandle<()>>>,
    closed: AtomicBool,
}

impl<L: Location> HttpTransport<L> {
    /// Listen on the address configured for `location`.
    pub async fn bind(config: HttpConfig<L>, location: L) -> Result<Self> {
        let addr = config.address(location)?;
        let listener = TcpListener::bind(addr).map_err(transport_error)?;
        Self::from_listener(config, location, listener)
    }

    /// Serve on an already bound listener. Must be called from inside a
    /// tokio runtime.
    pub fn from_listener(
        config: HttpConfig<L>,
        location: L,
        listener: TcpListener,
    ) -> Result<Self> {
        config.address(location)?;
        listener.set_nonblocking(true).map_err(transport_error)?;
        let local_addr = listener.local_addr().map_err(transport_error)?;
        let inbox = Arc::new(AsyncQueue::new());

        let service_inbox = inbox.clone();
        let make_service = make_service_fn(move |_conn| {
            let inbox = service_inbox.clone();
            async move {
                Ok::<_, Infallible>(service_fn(move |request| accept(request, inbox.clone())))
            }
        });

        let (shutdown, signal) = oneshot::channel::<()>();
        let server = Server::from_tcp(listener)
            .map_err(transport_error)?
            .serve(make_service)
            .with_graceful_shutdown(async move {
                let _ = signal.await;
            });
        let task = tokio::spawn(async move {
            if let Err(e) = server.await {
                error!(error = %e, "http server failed");
            }
        });
        debug!(?location, %local_addr, "http transport listening");

        let mut locations = config.participants();
        if !locations.contains(&location) {
            locations.push(location);
        }
        Ok(Self {
            location,
            locations,
            peers: config.locations,
            local_addr,
            client: Client::new(),
            inbox,
            shutdown: Mutex::new(Some(shutdown)),
            server: Mutex::new(Some(task)),
            closed: AtomicBool::new(false),
        })
    }

    /// The address the server actually listens on.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn location(&self) -> L {
        self.location
    }
}

fn reply(status: StatusCode) -> Response<Body> {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = status;
    response
}

async fn accept<L: Location>(
    request: Request<Body>,
    inbox: Arc<AsyncQueue<Envelope<L>>>,
) -> std::result::Result<Response<Body>, Infallible> {
    if request.method() != Method::POST || request.uri().path() != ENVELOPE_PATH {
        return Ok(reply(StatusCode::NOT_FOUND));
    }
    let body = match hyper::body::to_bytes(request.into_body()).await {
        Ok(body) => body,
        Err(e) => {
            warn!(error = %e, "unreadable request body");
            return Ok(reply(StatusCode::BAD_REQUEST));
        }
    };
    match Envelope::<L>::from_json(&body) {
        Ok(envelope) => {
            trace!(from = ?envelope.from, tag = %envelope.tag, "http: envelope received");
            inbox.push(envelope);
            Ok(reply(StatusCode::ACCEPTED))
        }
        Err(e) => {
            warn!(error = %e, "malformed envelope");
            Ok(reply(StatusCode::BAD_REQUEST))
        }
    }
}

#[async_trait]
impl<L: Location> Transport<L> for HttpTransport<L> {
    fn locations(&self) -> &[L] {
        &self.locations
    }

    async fn send(&self, to: L, envelope: Envelope<L>) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(ChoreographyError::Transport(format!(
                "transport of {:?} is torn down",
                self.location
            )));
        }
        let addr = self
            .peers
            .get(&to)
            .ok_or_else(|| ChoreographyError::UnknownLocation(format!("{:?}", to)))?;
        let request = Request::builder()
            .method(Method::POST)
            .uri(format!("http://{}{}", addr, ENVELOPE_PATH))
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(envelope.to_json()?))
            .map_err(transport_error)?;

        trace!(from = ?self.location, ?to, tag = %envelope.tag, %addr, "http: send");
        let response = self.client.request(request).await.map_err(transport_error)?;
        if !response.status().is_success() {
            return Err(ChoreographyError::Transport(format!(
                "{:?} at {} answered {}",
                to,
                addr,
                response.status()
            )));
        }
        Ok(())
    }

    fn subscribe(&self, delivery: Delivery<L>) -> Result<Subscription> {
        Ok(spawn_pump(self.inbox.clone(), delivery))
    }

    async fn teardown(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let shutdown = self
            .shutdown
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(shutdown) = shutdown {
            let _ = shutdown.send(());
        }
        let server = self
            .server
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(server) = server {
            let abort = server.abort_handle();
            if tokio::time::timeout(SHUTDOWN_GRACE, server).await.is_err() {
                warn!(location = ?self.location, "http server did not drain in time");
                abort.abort();
            }
        }
        debug!(location = ?self.location, addr = %self.local_addr, "http transport closed");
        Ok(())
    }
}
