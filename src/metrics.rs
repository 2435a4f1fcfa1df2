use const_format::concatcp;
use hyper::{
    header::CONTENT_TYPE,
    service::{make_service_fn, service_fn},
    Body, Method, Request, Response, Server, StatusCode,
};
use lazy_static::lazy_static;
use prometheus::{register_counter_vec, register_gauge, register_histogram};
use prometheus::{CounterVec, Encoder, Gauge, Histogram, TextEncoder};
use std::net::SocketAddr;
use tracing::{error, info};

/// Prefix of every metric the operator exports.
pub const METRICS_PREFIX: &str = "kindop_";

/// Path the scrape endpoint is served on.
pub const METRICS_PATH: &str = "/metrics";

lazy_static! {
    static ref HTTP_COUNTER: CounterVec = register_counter_vec!(
        concatcp!(METRICS_PREFIX, "http_requests_total"),
        "Number of HTTP requests made to the metrics server, by status code.",
        &["code"]
    )
    .unwrap();
    static ref HTTP_BODY_GAUGE: Gauge = register_gauge!(
        concatcp!(METRICS_PREFIX, "http_response_size_bytes"),
        "Size of the last metrics response in bytes."
    )
    .unwrap();
    static ref HTTP_REQ_HISTOGRAM: Histogram = register_histogram!(
        concatcp!(METRICS_PREFIX, "http_request_duration_seconds"),
        "Metrics server HTTP request latencies in seconds."
    )
    .unwrap();
}

/// Text exposition of every registered metric, with its content type.
fn render() -> Result<(String, Vec<u8>), prometheus::Error> {
    let encoder = TextEncoder::new();
    let mut buffer = vec![];
    encoder.encode(&prometheus::gather(), &mut buffer)?;
    Ok((encoder.format_type().to_owned(), buffer))
}

fn empty(code: StatusCode) -> Response<Body> {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = code;
    response
}

fn respond(req: &Request<Body>) -> Response<Body> {
    if req.method() != Method::GET || req.uri().path() != METRICS_PATH {
        return empty(StatusCode::NOT_FOUND);
    }
    match render() {
        Ok((content_type, body)) => {
            HTTP_BODY_GAUGE.set(body.len() as f64);
            let mut response = Response::new(Body::from(body));
            if let Ok(value) = content_type.parse() {
                response.headers_mut().insert(CONTENT_TYPE, value);
            }
            response
        }
        Err(err) => {
            error!(%err, "failed to encode metrics");
            empty(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

async fn serve_req(req: Request<Body>) -> Result<Response<Body>, hyper::Error> {
    let timer = HTTP_REQ_HISTOGRAM.start_timer();
    let response = respond(&req);
    HTTP_COUNTER
        .with_label_values(&[response.status().as_str()])
        .inc();
    timer.observe_duration();
    Ok(response)
}

/// Serves the prometheus scrape endpoint on `port`. Never returns: the
/// process exits if the server stops.
pub async fn run_server(port: u16) {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, path = METRICS_PATH, "metrics server listening");

    let server = Server::bind(&addr).serve(make_service_fn(|_| async {
        Ok::<_, hyper::Error>(service_fn(serve_req))
    }));

    match server.await {
        Ok(()) => error!("metrics server exited"),
        Err(err) => error!(%err, "metrics server failed"),
    }
    std::process::exit(1);
}
