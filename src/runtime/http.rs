use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::agent::RoutingAgent;
use crate::model::NodeId;
use crate::predict::ModelVariant;
use crate::routing::RouteError;
use crate::runtime::config::HttpConfig;

const MAX_REQUEST_BYTES: usize = 64 * 1024;

#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Value,
}

impl HttpResponse {
    fn ok(body: Value) -> Self {
        Self { status: 200, body }
    }

    fn error(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            body: json!({"error": message.into()}),
        }
    }

    fn status_line(&self) -> &'static str {
        match self.status {
            200 => "HTTP/1.1 200 OK",
            400 => "HTTP/1.1 400 Bad Request",
            404 => "HTTP/1.1 404 Not Found",
            405 => "HTTP/1.1 405 Method Not Allowed",
            413 => "HTTP/1.1 413 Payload Too Large",
            _ => "HTTP/1.1 500 Internal Server Error",
        }
    }
}

#[derive(Debug, Deserialize)]
struct RunRequest {
    start: Option<String>,
    dest: Option<String>,
    model: Option<String>,
}

/// Dispatches one request against the agent. Kept free of socket IO so the
/// routes can be exercised directly.
pub fn route_request(agent: &RoutingAgent, method: &str, path: &str, body: &[u8]) -> HttpResponse {
    let path = path.split('?').next().unwrap_or(path);
    match (method, path) {
        ("GET", "/healthz") => HttpResponse::ok(json!({"status": "ok"})),
        ("GET", "/api/network") => network_view(agent),
        ("GET" | "POST", "/api/randomize") => {
            agent.randomize_network();
            HttpResponse::ok(json!({
                "status": "success",
                "generation": agent.get_network_state().generation(),
            }))
        }
        ("POST", "/api/run") => run_route(agent, body),
        ("GET", "/api/models") => HttpResponse::ok(json!({
            "models": agent.models().statuses(),
            "metadata": agent.models().metadata(),
        })),
        (_, "/healthz" | "/api/network" | "/api/randomize" | "/api/run" | "/api/models") => {
            HttpResponse::error(405, format!("method {method} not allowed on {path}"))
        }
        _ => HttpResponse {
            status: 404,
            body: json!({"error": "not_found", "path": path}),
        },
    }
}

fn network_view(agent: &RoutingAgent) -> HttpResponse {
    let snapshot = agent.get_network_state();
    let topology = agent.topology();
    HttpResponse::ok(json!({
        "nodes": topology.nodes(),
        "connections": topology.connections(),
        "generation": snapshot.generation(),
        "edges": &*snapshot,
    }))
}

fn run_route(agent: &RoutingAgent, body: &[u8]) -> HttpResponse {
    let request: RunRequest = match serde_json::from_slice(body) {
        Ok(request) => request,
        Err(err) => return HttpResponse::error(400, format!("malformed request body: {err}")),
    };
    let (Some(start), Some(dest)) = (request.start, request.dest) else {
        return HttpResponse::error(400, "both 'start' and 'dest' are required");
    };
    let variant = match request.model.as_deref().unwrap_or("linear").parse::<ModelVariant>() {
        Ok(variant) => variant,
        Err(err) => return HttpResponse::error(400, err.to_string()),
    };

    match agent.find_best_route(&NodeId::from(start), &NodeId::from(dest), variant) {
        Ok(outcome) => match serde_json::to_value(&outcome) {
            Ok(body) => HttpResponse::ok(body),
            Err(err) => HttpResponse::error(500, format!("failed to encode outcome: {err}")),
        },
        Err(err @ RouteError::InvalidNode { .. }) => HttpResponse::error(400, err.to_string()),
        Err(err @ RouteError::BrokenPredecessorChain { .. }) => {
            warn!("route search aborted: {err}");
            HttpResponse::error(500, err.to_string())
        }
    }
}

pub struct HttpServer {
    agent: Arc<RoutingAgent>,
    cfg: HttpConfig,
}

impl HttpServer {
    pub fn new(agent: Arc<RoutingAgent>, cfg: HttpConfig) -> Self {
        Self { agent, cfg }
    }

    /// Serves until `running` is cleared. Requests are handled one at a time.
    pub fn serve(&self, running: &AtomicBool) -> Result<()> {
        let listener = TcpListener::bind((self.cfg.bind_address.as_str(), self.cfg.port))
            .with_context(|| {
                format!(
                    "failed to bind HTTP server at {}:{}",
                    self.cfg.bind_address, self.cfg.port
                )
            })?;
        listener
            .set_nonblocking(true)
            .context("failed to set HTTP listener non-blocking")?;
        info!(
            "presana HTTP started on {}:{}",
            self.cfg.bind_address, self.cfg.port
        );

        while running.load(Ordering::Relaxed) {
            match listener.accept() {
                Ok((stream, addr)) => {
                    if let Err(err) = self.handle_stream(stream) {
                        debug!("HTTP request from {addr} failed: {err:#}");
                    }
                }
                Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                    thread::sleep(Duration::from_millis(50));
                }
                Err(err) => {
                    warn!("HTTP accept error: {err}");
                    thread::sleep(Duration::from_millis(200));
                }
            }
        }
        info!("presana HTTP stopped");
        Ok(())
    }

    fn handle_stream(&self, mut stream: TcpStream) -> Result<()> {
        let timeout = Some(Duration::from_millis(self.cfg.request_timeout_ms.max(1)));
        stream
            .set_nonblocking(false)
            .context("failed to set HTTP stream blocking")?;
        stream
            .set_read_timeout(timeout)
            .context("failed to set HTTP read timeout")?;
        stream
            .set_write_timeout(timeout)
            .context("failed to set HTTP write timeout")?;

        let response = match read_request(&mut stream)? {
            Some(request) => {
                debug!("HTTP {} {}", request.method, request.path);
                route_request(&self.agent, &request.method, &request.path, &request.body)
            }
            None => HttpResponse::error(413, "request too large"),
        };
        write_response(&mut stream, &response)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedRequest {
    pub method: String,
    pub path: String,
    pub body: Vec<u8>,
}

/// Reads headers plus a `Content-Length` body. `None` when the request
/// exceeds the size cap.
pub fn read_request<R: Read>(reader: &mut R) -> Result<Option<ParsedRequest>> {
    let mut buf = Vec::new();
    let mut chunk = [0_u8; 4096];

    let header_end = loop {
        if let Some(pos) = find_header_end(&buf) {
            break pos;
        }
        if buf.len() > MAX_REQUEST_BYTES {
            return Ok(None);
        }
        let n = reader
            .read(&mut chunk)
            .context("failed to read HTTP request")?;
        if n == 0 {
            anyhow::bail!("connection closed before headers completed");
        }
        buf.extend_from_slice(&chunk[..n]);
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).into_owned();
    let mut lines = head.lines();
    let first_line = lines.next().unwrap_or_default();
    let mut parts = first_line.split_whitespace();
    let method = parts.next().unwrap_or("GET").to_ascii_uppercase();
    let path = parts.next().unwrap_or("/").to_string();

    let content_length = lines
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .map(|(_, value)| value.trim().parse::<usize>())
        .transpose()
        .context("invalid Content-Length header")?
        .unwrap_or(0);
    if content_length > MAX_REQUEST_BYTES {
        return Ok(None);
    }

    let body_start = header_end + 4;
    let mut body = buf.get(body_start..).map(<[u8]>::to_vec).unwrap_or_default();
    while body.len() < content_length {
        let n = reader
            .read(&mut chunk)
            .context("failed to read HTTP body")?;
        if n == 0 {
            break;
        }
        body.extend_from_slice(&chunk[..n]);
    }
    body.truncate(content_length);

    Ok(Some(ParsedRequest { method, path, body }))
}

fn find_header_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|window| window == b"\r\n\r\n")
}

fn write_response<W: Write>(writer: &mut W, response: &HttpResponse) -> Result<()> {
    let payload =
        serde_json::to_vec(&response.body).unwrap_or_else(|_| b"{\"error\":\"encode\"}".to_vec());
    let head = format!(
        "{}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        response.status_line(),
        payload.len()
    );
    writer
        .write_all(head.as_bytes())
        .context("failed to write HTTP headers")?;
    writer
        .write_all(&payload)
        .context("failed to write HTTP body")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EdgeMetrics, NetworkSnapshot, Topology};
    use crate::predict::{LinearModel, ModelRegistry};

    fn agent() -> RoutingAgent {
        let models = ModelRegistry::new().with_model(ModelVariant::Linear, LinearModel::default());
        let agent = RoutingAgent::with_seed(Topology::default_mesh(), Arc::new(models), 4);
        let mut snapshot = NetworkSnapshot::new();
        for (u, v) in agent.topology().connections() {
            snapshot.insert_connection(u.clone(), v.clone(), EdgeMetrics::open(10, 10, 5).blocked());
        }
        agent.install_network(snapshot.with_connection("A", "B", EdgeMetrics::open(50, 20, 8)));
        agent
    }

    #[test]
    fn run_returns_best_and_logs() {
        let agent = agent();
        let response = route_request(
            &agent,
            "POST",
            "/api/run",
            br#"{"start":"A","dest":"B","model":"linear"}"#,
        );
        assert_eq!(response.status, 200);
        assert_eq!(response.body["best"]["path"], json!(["A", "B"]));
        assert_eq!(response.body["best"]["cost"], json!(25.6));
        assert!(response.body["logs"].as_array().is_some_and(|logs| !logs.is_empty()));
    }

    #[test]
    fn unreachable_route_has_null_best() {
        let agent = agent();
        let response = route_request(&agent, "POST", "/api/run", br#"{"start":"A","dest":"E"}"#);
        assert_eq!(response.status, 200);
        assert!(response.body["best"].is_null());
    }

    #[test]
    fn bad_requests_are_rejected_at_the_boundary() {
        let agent = agent();
        let cases: [&[u8]; 4] = [
            b"not json",
            br#"{"start":"A"}"#,
            br#"{"start":"A","dest":"B","model":"svm"}"#,
            br#"{"start":"A","dest":"Q"}"#,
        ];
        for body in cases {
            let response = route_request(&agent, "POST", "/api/run", body);
            assert_eq!(response.status, 400, "body={}", String::from_utf8_lossy(body));
            assert!(response.body["error"].is_string());
        }
    }

    #[test]
    fn randomize_bumps_generation() {
        let agent = agent();
        let before = agent.get_network_state().generation();
        let response = route_request(&agent, "GET", "/api/randomize", b"");
        assert_eq!(response.status, 200);
        assert_eq!(response.body["generation"], json!(before + 1));
    }

    #[test]
    fn network_view_lists_both_directions() {
        let agent = agent();
        let response = route_request(&agent, "GET", "/api/network", b"");
        assert_eq!(response.status, 200);
        assert_eq!(response.body["edges"]["A-B"]["distance"], json!(50));
        assert_eq!(response.body["edges"]["B-A"]["distance"], json!(50));
        assert_eq!(response.body["nodes"].as_array().map(Vec::len), Some(5));
    }

    #[test]
    fn models_route_reports_availability() {
        let agent = agent();
        let response = route_request(&agent, "GET", "/api/models", b"");
        assert_eq!(response.body["models"][0]["variant"], json!("linear"));
        assert_eq!(response.body["models"][0]["loaded"], json!(true));
        assert_eq!(response.body["models"][1]["loaded"], json!(false));
    }

    #[test]
    fn unknown_path_and_wrong_method() {
        let agent = agent();
        assert_eq!(route_request(&agent, "GET", "/nope", b"").status, 404);
        assert_eq!(route_request(&agent, "DELETE", "/api/run", b"").status, 405);
    }

    #[test]
    fn parses_request_with_body() {
        let raw = b"POST /api/run HTTP/1.1\r\nHost: x\r\nContent-Length: 7\r\n\r\n{\"a\":1}";
        let parsed = read_request(&mut &raw[..])
            .expect("parse")
            .expect("within limits");
        assert_eq!(parsed.method, "POST");
        assert_eq!(parsed.path, "/api/run");
        assert_eq!(parsed.body, b"{\"a\":1}");
    }

    #[test]
    fn oversized_body_is_refused() {
        let raw = format!(
            "POST /api/run HTTP/1.1\r\nContent-Length: {}\r\n\r\n",
            MAX_REQUEST_BYTES + 1
        );
        assert_eq!(read_request(&mut raw.as_bytes()).expect("parse"), None);
    }

    #[test]
    fn response_carries_status_and_length() {
        let mut out = Vec::new();
        write_response(&mut out, &HttpResponse::error(404, "missing")).expect("write");
        let text = String::from_utf8(out).expect("utf8");
        assert!(text.starts_with("HTTP/1.1 404 Not Found\r\n"));
        assert!(text.contains("Content-Length: 19\r\n"));
    }
}
