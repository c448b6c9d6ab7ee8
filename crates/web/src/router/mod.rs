//! Ordered route matching.
//!
//! A [`RouteMatcher`] keeps its rules in one list, in registration order. Each rule applies to
//! one HTTP method or, when registered through [`all`](RouteMatcher::all), to every method. The
//! first rule whose method and pattern match the request handles it; there is no specificity
//! ranking and method-independent rules get no lower priority.
//!
//! Three kinds of patterns are supported:
//!
//! - literal: `/static/index.html` matches that path only
//! - parameterized: `/users/:id/posts/:post` binds each `:name` segment
//! - regex (the `*_regex` registrations): the expression must match the whole path; named
//!   groups bind by name, unnamed groups as `param0`, `param1`, ...
//!
//! ```
//! use sluice_web::{handler_fn, ServerRequest};
//! use sluice_web::router::RouteMatcher;
//! use http::Method;
//!
//! # fn main() -> Result<(), sluice_web::router::RouteError> {
//! let mut matcher = RouteMatcher::new();
//! matcher
//!     .get("/users/:id", handler_fn(|_request: ServerRequest| {}))?
//!     .get_regex(r"/files/(.+)", handler_fn(|_request: ServerRequest| {}))?;
//!
//! let matched = matcher.at(&Method::GET, "/users/42").unwrap();
//! assert_eq!(matched.params(), &[("id".to_string(), "42".to_string())]);
//!
//! let matched = matcher.at(&Method::GET, "/files/a/b.txt").unwrap();
//! assert_eq!(matched.params(), &[("param0".to_string(), "a/b.txt".to_string())]);
//!
//! assert!(matcher.at(&Method::POST, "/users/42").is_none());
//! # Ok(())
//! # }
//! ```

mod pattern;

use crate::handler::{Dispatch, RequestHandler};
use crate::request::ServerRequest;
use http::Method;
use pattern::Pattern;
use sluice_http::protocol::{Entries, RawRequest};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, trace};

/// Errors reported when registering a route.
#[derive(Error, Debug)]
pub enum RouteError {
    #[error("invalid route pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("invalid route regex '{pattern}': {source}")]
    InvalidRegex {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

impl RouteError {
    pub fn invalid_pattern<S: ToString>(pattern: &str, reason: S) -> Self {
        Self::InvalidPattern { pattern: pattern.to_owned(), reason: reason.to_string() }
    }

    pub fn invalid_regex(pattern: &str, source: regex::Error) -> Self {
        Self::InvalidRegex { pattern: pattern.to_owned(), source }
    }
}

struct Route {
    method: Option<Method>,
    pattern: Pattern,
    handler: Arc<dyn RequestHandler>,
}

/// The handler chosen for a request, with the parameters its pattern bound.
pub struct RouteMatch<'matcher> {
    handler: &'matcher Arc<dyn RequestHandler>,
    params: Entries,
}

impl Route {
    fn applies_to(&self, method: &Method) -> bool {
        self.method.as_ref().is_none_or(|m| m == method)
    }
}

impl<'matcher> RouteMatch<'matcher> {
    pub fn handler(&self) -> &'matcher Arc<dyn RequestHandler> {
        self.handler
    }

    /// Bound path parameters, in pattern order.
    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }

    pub fn into_params(self) -> Entries {
        self.params
    }
}

impl fmt::Debug for RouteMatch<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteMatch").field("params", &self.params).finish_non_exhaustive()
    }
}

/// Routes requests to handlers by method and path. See the [module docs](self).
#[derive(Default)]
pub struct RouteMatcher {
    routes: Vec<Route>,
    no_match: Option<Arc<dyn RequestHandler>>,
}

macro_rules! method_routes {
    ($($method:ident, $method_regex:ident => $http_method:ident;)+) => {
        $(
            #[doc = concat!("Routes `", stringify!($http_method), "` requests whose path matches `pattern`.")]
            pub fn $method<H: RequestHandler + 'static>(&mut self, pattern: &str, handler: H) -> Result<&mut Self, RouteError> {
                self.on(Method::$http_method, pattern, handler)
            }

            #[doc = concat!("Routes `", stringify!($http_method), "` requests whose path matches the regex `pattern`.")]
            pub fn $method_regex<H: RequestHandler + 'static>(&mut self, pattern: &str, handler: H) -> Result<&mut Self, RouteError> {
                self.on_regex(Method::$http_method, pattern, handler)
            }
        )+
    };
}

impl RouteMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a rule for `method`.
    pub fn on<H: RequestHandler + 'static>(&mut self, method: Method, pattern: &str, handler: H) -> Result<&mut Self, RouteError> {
        let pattern = Pattern::parse(pattern)?;
        self.push(Some(method), pattern, Arc::new(handler));
        Ok(self)
    }

    /// Appends a regex rule for `method`.
    pub fn on_regex<H: RequestHandler + 'static>(
        &mut self,
        method: Method,
        pattern: &str,
        handler: H,
    ) -> Result<&mut Self, RouteError> {
        let pattern = Pattern::regex(pattern)?;
        self.push(Some(method), pattern, Arc::new(handler));
        Ok(self)
    }

    /// Appends a rule for any method.
    pub fn all<H: RequestHandler + 'static>(&mut self, pattern: &str, handler: H) -> Result<&mut Self, RouteError> {
        let pattern = Pattern::parse(pattern)?;
        self.push(None, pattern, Arc::new(handler));
        Ok(self)
    }

    pub fn all_regex<H: RequestHandler + 'static>(&mut self, pattern: &str, handler: H) -> Result<&mut Self, RouteError> {
        let pattern = Pattern::regex(pattern)?;
        self.push(None, pattern, Arc::new(handler));
        Ok(self)
    }

    method_routes! {
        get, get_regex => GET;
        put, put_regex => PUT;
        post, post_regex => POST;
        delete, delete_regex => DELETE;
        options, options_regex => OPTIONS;
        head, head_regex => HEAD;
        trace, trace_regex => TRACE;
        connect, connect_regex => CONNECT;
        patch, patch_regex => PATCH;
    }

    /// Sets the handler for requests no rule matches, replacing the previous one.
    pub fn no_match<H: RequestHandler + 'static>(&mut self, handler: H) -> &mut Self {
        self.no_match = Some(Arc::new(handler));
        self
    }

    fn push(&mut self, method: Option<Method>, pattern: Pattern, handler: Arc<dyn RequestHandler>) {
        trace!(method = ?method, pattern = ?pattern, "route registered");
        self.routes.push(Route { method, pattern, handler });
    }

    /// Number of registered rules, the fallback not included.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Finds the first rule matching `method` and `path`.
    pub fn at(&self, method: &Method, path: &str) -> Option<RouteMatch<'_>> {
        self.routes.iter().filter(|route| route.applies_to(method)).find_map(|route| {
            route.pattern.matches(path).map(|params| RouteMatch { handler: &route.handler, params })
        })
    }

    /// Routes `raw` to the first matching rule, or to the fallback.
    ///
    /// When the matching rule's handler is itself a matcher that takes nothing, the request
    /// falls through to this matcher's fallback.
    pub fn handle(&self, raw: Arc<dyn RawRequest>) -> Dispatch {
        let Some(matched) = self.at(raw.method(), raw.path()) else {
            return self.fallback(raw);
        };

        trace!(method = %raw.method(), path = raw.path(), params = ?matched.params(), "route matched");
        let handler = Arc::clone(matched.handler());
        match handler.dispatch(ServerRequest::with_path_params(Arc::clone(&raw), matched.into_params())) {
            Dispatch::Unhandled => {
                debug!(method = %raw.method(), path = raw.path(), "nested route matched nothing");
                self.fallback(raw)
            }
            Dispatch::NoMatch => Dispatch::NoMatch,
            Dispatch::Handled | Dispatch::Matched => Dispatch::Matched,
        }
    }

    fn fallback(&self, raw: Arc<dyn RawRequest>) -> Dispatch {
        match &self.no_match {
            Some(no_match) => {
                debug!(method = %raw.method(), path = raw.path(), "no route matched, using fallback");
                no_match.handle(ServerRequest::new(raw));
                Dispatch::NoMatch
            }
            None => {
                debug!(method = %raw.method(), path = raw.path(), "no route matched");
                Dispatch::Unhandled
            }
        }
    }
}

impl RequestHandler for RouteMatcher {
    fn handle(&self, request: ServerRequest) {
        RouteMatcher::handle(self, Arc::clone(request.raw()));
    }

    fn dispatch(&self, request: ServerRequest) -> Dispatch {
        RouteMatcher::handle(self, Arc::clone(request.raw()))
    }
}

impl fmt::Debug for RouteMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let routes = self
            .routes
            .iter()
            .map(|route| (route.method.as_ref().map_or("*", Method::as_str), &route.pattern))
            .collect::<Vec<_>>();
        f.debug_struct("RouteMatcher").field("routes", &routes).field("no_match", &self.no_match.is_some()).finish()
    }
}
