//! The dispatch entry point for an HTTP engine.

use crate::handler::{Dispatch, Handler};
use crate::request::ServerRequest;
use arc_swap::ArcSwapOption;
use sluice_http::protocol::RawRequest;
use std::sync::Arc;
use tracing::{trace, warn};

/// Forwards inbound requests to the installed [`Handler`].
///
/// An engine calls [`dispatch`](HttpServer::dispatch) for every request it has parsed. The
/// handler can be replaced at any time, requests already dispatched keep the handler they
/// were given.
#[derive(Debug, Default)]
pub struct HttpServer {
    handler: ArcSwapOption<Handler>,
}

impl HttpServer {
    pub fn new() -> Self {
        Self { handler: ArcSwapOption::empty() }
    }

    /// Installs `handler`, replacing the previous one.
    pub fn request_handler(&self, handler: impl Into<Handler>) -> &Self {
        self.handler.store(Some(Arc::new(handler.into())));
        self
    }

    pub fn has_handler(&self) -> bool {
        self.handler.load().is_some()
    }

    /// Hands `raw` to the installed handler.
    pub fn dispatch(&self, raw: Arc<dyn RawRequest>) -> Dispatch {
        let Some(handler) = self.handler.load_full() else {
            warn!(method = %raw.method(), path = raw.path(), "no request handler installed");
            return Dispatch::Unhandled;
        };

        match handler.as_ref() {
            Handler::Direct(handler) => {
                trace!(method = %raw.method(), path = raw.path(), "dispatching to request handler");
                handler.dispatch(ServerRequest::new(raw))
            }
            Handler::Matcher(matcher) => matcher.handle(raw),
        }
    }
}
