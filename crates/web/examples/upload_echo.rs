//! Routes an upload to a handler that pumps the request body into the response.
//!
//! There is no transport here: the "engine" is the code in `main`, which builds the request
//! head, attaches a body read from memory, and dispatches it.

use http::{Method, Request, StatusCode};
use sluice_http::protocol::{MemoryResponse, RawResponse, RequestHead};
use sluice_stream::io::AsyncReadStream;
use sluice_stream::{Callback, DEFAULT_READ_CHUNK_SIZE, Pump, ReadStream};
use sluice_web::router::RouteMatcher;
use sluice_web::{Dispatch, HttpServer, ServerRequest, ServerResponse, handler_fn};
use std::io::Cursor;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::Notify;
use tracing::{Level, error, info, warn};
use tracing_subscriber::FmtSubscriber;

/// Answers with an empty body.
fn reply(response: &ServerResponse, status: StatusCode) {
    if let Err(e) = response.set_status(status) {
        error!(cause = %e, "failed to set status");
    }
    if let Err(e) = response.end() {
        error!(cause = %e, "failed to end response");
    }
}

fn echo_upload(request: ServerRequest, done: Arc<Notify>) {
    let response = request.response().clone();
    let Some(body) = request.body() else {
        warn!(path = request.path(), "upload without a body");
        reply(&response, StatusCode::BAD_REQUEST);
        done.notify_one();
        return;
    };

    let name = request.params().map(|params| params["name"].clone()).unwrap_or_default();
    info!(name, "receiving upload");
    if let Err(e) = response.put_headers([("content-type", "application/octet-stream"), ("x-upload-name", name.as_str())]) {
        error!(cause = %e, "failed to set headers");
    }

    let pump = Arc::new(Mutex::new(Some(Pump::new(Arc::clone(&body), response.raw()).with_write_queue_max_size(16 * 1024))));
    let end_pump = Arc::clone(&pump);
    body.end_handler(Some(Callback::new(move |()| {
        let Some(mut pump) = end_pump.lock().unwrap_or_else(PoisonError::into_inner).take() else {
            return;
        };
        pump.stop();
        info!(bytes = pump.bytes_pumped(), chunks = pump.chunks_pumped(), "upload finished");

        if let Err(e) = response.put_trailer("x-upload-bytes", &pump.bytes_pumped().to_string()) {
            error!(cause = %e, "failed to set trailer");
        }
        if let Err(e) = response.end() {
            error!(cause = %e, "failed to end response");
        }
        done.notify_one();
    })));

    if let Some(pump) = pump.lock().unwrap_or_else(PoisonError::into_inner).as_mut() {
        if let Err(e) = pump.start() {
            error!(cause = %e, "failed to start pump");
        }
    }
}

#[tokio::main]
async fn main() {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::DEBUG).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let done = Arc::new(Notify::new());

    let mut matcher = RouteMatcher::new();
    let upload_done = Arc::clone(&done);
    matcher
        .put("/upload/:name", handler_fn(move |request: ServerRequest| echo_upload(request, Arc::clone(&upload_done))))
        .expect("valid route");
    let not_found_done = Arc::clone(&done);
    matcher.no_match(handler_fn(move |request: ServerRequest| {
        warn!(path = request.path(), "no route for request");
        reply(request.response(), StatusCode::NOT_FOUND);
        not_found_done.notify_one();
    }));

    let server = HttpServer::new();
    server.request_handler(matcher);

    let payload: Vec<u8> = b"sluice ".iter().copied().cycle().take(100 * 1024).collect();
    let body = AsyncReadStream::spawn(Cursor::new(payload), DEFAULT_READ_CHUNK_SIZE);
    let response = Arc::new(MemoryResponse::new());
    let request = Request::builder().method(Method::PUT).uri("/upload/report.txt").body(()).expect("valid request");
    let head = RequestHead::new(request, Arc::clone(&response) as Arc<dyn RawResponse>).with_body(body);

    let dispatch = server.dispatch(Arc::new(head));
    info!(?dispatch, "request dispatched");
    if dispatch == Dispatch::Unhandled {
        return;
    }

    done.notified().await;
    info!(
        status = %response.status(),
        body_len = response.body().len(),
        trailers = ?response.trailers(),
        "response complete"
    );
}
