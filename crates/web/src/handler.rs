use crate::request::ServerRequest;
use crate::router::RouteMatcher;
use std::fmt;
use std::sync::Arc;

/// Handles one inbound request.
///
/// The handler owns the request and answers through
/// [`ServerRequest::response`]; nothing is returned to the caller.
pub trait RequestHandler: Send + Sync {
    fn handle(&self, request: ServerRequest);

    /// Handles `request` and reports whether anything took it.
    ///
    /// Handlers that route further, like a nested [`RouteMatcher`], override this so a miss
    /// deeper down reaches the engine as [`Dispatch::Unhandled`].
    fn dispatch(&self, request: ServerRequest) -> Dispatch {
        self.handle(request);
        Dispatch::Handled
    }
}

/// a `Fn(ServerRequest)` holder that acts as a [`RequestHandler`]
pub struct FnHandler<F> {
    f: F,
}

impl<F> FnHandler<F>
where
    F: Fn(ServerRequest) + Send + Sync,
{
    fn new(f: F) -> Self {
        Self { f }
    }
}

pub fn handler_fn<F>(f: F) -> FnHandler<F>
where
    F: Fn(ServerRequest) + Send + Sync,
{
    FnHandler::new(f)
}

impl<F> RequestHandler for FnHandler<F>
where
    F: Fn(ServerRequest) + Send + Sync,
{
    fn handle(&self, request: ServerRequest) {
        (self.f)(request);
    }
}

impl<F> fmt::Debug for FnHandler<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnHandler").finish_non_exhaustive()
    }
}

/// What a server forwards its requests to.
#[derive(Clone)]
pub enum Handler {
    /// Every request is wrapped into a [`ServerRequest`] and passed to the handler.
    Direct(Arc<dyn RequestHandler>),
    /// Every request goes to the matcher, which wraps it after routing.
    Matcher(Arc<RouteMatcher>),
}

impl From<RouteMatcher> for Handler {
    fn from(matcher: RouteMatcher) -> Self {
        Self::Matcher(Arc::new(matcher))
    }
}

impl From<Arc<RouteMatcher>> for Handler {
    fn from(matcher: Arc<RouteMatcher>) -> Self {
        Self::Matcher(matcher)
    }
}

impl<F> From<FnHandler<F>> for Handler
where
    F: Fn(ServerRequest) + Send + Sync + 'static,
{
    fn from(handler: FnHandler<F>) -> Self {
        Self::Direct(Arc::new(handler))
    }
}

impl From<Arc<dyn RequestHandler>> for Handler {
    fn from(handler: Arc<dyn RequestHandler>) -> Self {
        Self::Direct(handler)
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Direct(_) => f.write_str("Handler::Direct"),
            Self::Matcher(matcher) => f.debug_tuple("Handler::Matcher").field(matcher).finish(),
        }
    }
}

/// How a request was dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// A direct handler took the request.
    Handled,
    /// A route rule matched and its handler took the request.
    Matched,
    /// No route matched, the fallback handler took the request.
    NoMatch,
    /// Nothing took the request. The engine should apply its default response.
    Unhandled,
}

impl Dispatch {
    #[inline]
    pub fn is_handled(self) -> bool {
        !matches!(self, Self::Unhandled)
    }
}
