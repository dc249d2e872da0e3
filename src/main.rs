//! muxd — demo daemon serving the same route tables over HTTP and DNS.
//!
//! Registers a small zone (an SRV record for `**.example.com.` whose
//! target resolves via a glue A record) plus a couple of HTTP routes,
//! then serves HTTP through axum and DNS over UDP with hickory-proto
//! framing until ctrl-c.

use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::response::Response;
use clap::Parser;
use hickory_proto::op::Message;
use hickory_proto::rr::rdata::{A, SRV};
use hickory_proto::rr::{Name, RData, Record};
use tokio::net::{TcpListener, UdpSocket};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use polymux::config::MuxdConfig;
use polymux::dns as dns_mux;
use polymux::http as http_mux;
use polymux::lifecycle::shutdown::ShutdownSignal;
use polymux::lifecycle::Shutdown;
use polymux::observability::{logging, metrics};

/// Maximum buffered HTTP request body.
const MAX_BODY_BYTES: usize = 1 << 20;

#[derive(Parser, Debug)]
#[command(name = "muxd", about = "multi-protocol request muxer demo daemon")]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the HTTP listener address.
    #[arg(long)]
    http_addr: Option<String>,

    /// Override the DNS listener address.
    #[arg(long)]
    dns_addr: Option<String>,
}

#[derive(Clone)]
struct AppState {
    router: Arc<http_mux::Router>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => polymux::config::load_config(path)?,
        None => MuxdConfig::default(),
    };
    if let Some(addr) = cli.http_addr {
        config.http.bind_address = addr;
    }
    if let Some(addr) = cli.dns_addr {
        config.dns.bind_address = addr;
    }

    logging::init(&config.observability.log_filter);
    tracing::info!(
        http = %config.http.bind_address,
        dns = %config.dns.bind_address,
        "muxd starting"
    );

    if config.observability.metrics_enabled {
        metrics::init_metrics(config.observability.metrics_address.parse()?)?;
    }

    let http_router = Arc::new(http_mux::Router::new());
    let dns_router = Arc::new(dns_mux::Router::new());

    let http_listener = TcpListener::bind(&config.http.bind_address).await?;
    let http_port = http_listener.local_addr()?.port();
    let dns_socket = UdpSocket::bind(&config.dns.bind_address).await?;
    tracing::info!(address = %http_listener.local_addr()?, "HTTP listening");
    tracing::info!(address = %dns_socket.local_addr()?, "DNS listening");

    register_demo_routes(&http_router, &dns_router, http_port)?;

    let shutdown = Shutdown::new();

    let dns_task = tokio::spawn(serve_dns(
        dns_socket,
        dns_router.clone(),
        shutdown.subscribe(),
    ));

    let state = AppState {
        router: http_router.clone(),
    };
    let app = axum::Router::new()
        .fallback(serve_http)
        .with_state(state)
        .layer(TraceLayer::new_for_http());
    let mut http_signal = shutdown.subscribe();
    let http_task = tokio::spawn(async move {
        axum::serve(http_listener, app)
            .with_graceful_shutdown(async move { http_signal.recv().await })
            .await
    });

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown signal received");
    shutdown.trigger();

    let _ = dns_task.await;
    if let Ok(Err(err)) = http_task.await {
        tracing::error!(error = %err, "HTTP server error");
    }
    tracing::info!("shutdown complete");
    Ok(())
}

/// The routes served by the demo: an SRV record under a wildcard zone
/// with its glue A record, an HTTP echo of captured path variables, and
/// a health endpoint.
fn register_demo_routes(
    http_router: &http_mux::Router,
    dns_router: &dns_mux::Router,
    http_port: u16,
) -> Result<(), polymux::RouterError> {
    let target = Name::from_utf8("localhost.").expect("static name");
    let srv_name = Name::from_utf8("_http._tcp.example.com.").expect("static name");
    let srv = Record::from_rdata(
        srv_name,
        300,
        RData::SRV(SRV::new(0, 0, http_port, target.clone())),
    );
    dns_router.handle(
        dns_mux::Route {
            name: "**.example.com.".into(),
            rtype: "SRV".into(),
            ..Default::default()
        },
        move |w: &mut dns_mux::ResponseWriter, _: &dns_mux::Request| {
            w.answer(srv.clone());
        },
    )?;

    let a = Record::from_rdata(target, 300, RData::A(A(Ipv4Addr::LOCALHOST)));
    dns_router.handle(
        dns_mux::Route {
            name: "localhost.".into(),
            rtype: "A".into(),
            ..Default::default()
        },
        move |w: &mut dns_mux::ResponseWriter, _: &dns_mux::Request| {
            w.answer(a.clone());
        },
    )?;

    http_router.handle(
        http_mux::Route::path("/healthz"),
        |w: &mut http_mux::ResponseWriter, _: &http_mux::Request| {
            w.write(b"ok\n");
        },
    )?;

    http_router.handle(
        http_mux::Route::path("/v1/*"),
        |w: &mut http_mux::ResponseWriter, req: &http_mux::Request| {
            let vars = http_mux::vars(req);
            w.write(format!("host vars: {:?}\n", vars.host).as_bytes());
            w.write(format!("path vars: {:?}\n", vars.path).as_bytes());
        },
    )?;

    Ok(())
}

/// Bridges axum requests into the mux and back.
async fn serve_http(State(state): State<AppState>, request: axum::extract::Request) -> Response {
    let request_id = Uuid::new_v4();
    let (parts, body) = request.into_parts();
    let body = axum::body::to_bytes(body, MAX_BODY_BYTES)
        .await
        .unwrap_or_default();

    let req = http_mux::Request {
        method: parts.method,
        uri: parts.uri,
        headers: parts.headers,
        body,
        extensions: Default::default(),
    };

    let mut w = http_mux::ResponseWriter::new();
    state.router.serve(&mut w, &req);

    metrics::record_http_request(req.method.as_str(), w.status().as_u16());
    tracing::debug!(
        %request_id,
        method = %req.method,
        path = %req.path(),
        status = %w.status(),
        "request served"
    );
    w.into_response().map(Body::from)
}

/// Receives UDP queries, dispatches them through the DNS router, and
/// sends the finished responses back.
async fn serve_dns(
    socket: UdpSocket,
    router: Arc<dns_mux::Router>,
    mut shutdown: ShutdownSignal,
) {
    let mut buf = vec![0u8; 4096];
    loop {
        tokio::select! {
            _ = shutdown.recv() => break,
            received = socket.recv_from(&mut buf) => {
                let (len, peer) = match received {
                    Ok(v) => v,
                    Err(err) => {
                        tracing::warn!(error = %err, "DNS receive failed");
                        continue;
                    }
                };
                let message = match Message::from_vec(&buf[..len]) {
                    Ok(m) => m,
                    Err(err) => {
                        tracing::warn!(peer = %peer, error = %err, "undecodable DNS message");
                        continue;
                    }
                };

                let req = dns_mux::Request::new(message);
                let qtype = req
                    .query()
                    .map(|q| q.query_type().to_string())
                    .unwrap_or_default();

                let mut w = dns_mux::ResponseWriter::network();
                router.serve_dns(&mut w, &req);
                let response = match w.finish(&req) {
                    Ok(response) => response,
                    Err(err) => {
                        tracing::warn!(peer = %peer, error = %err, "response already committed");
                        continue;
                    }
                };

                metrics::record_dns_query(&qtype, &format!("{:?}", response.response_code()));
                match response.to_vec() {
                    Ok(bytes) => {
                        if let Err(err) = socket.send_to(&bytes, peer).await {
                            tracing::warn!(peer = %peer, error = %err, "DNS send failed");
                        }
                    }
                    Err(err) => tracing::warn!(error = %err, "DNS response encoding failed"),
                }
            }
        }
    }
}
