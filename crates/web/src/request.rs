//! The request handed to request handlers.
//!
//! A [`ServerRequest`] is built once per inbound request. Its header and parameter maps are
//! materialized from the raw request the first time they are asked for and cached for the
//! rest of the request's life.

use crate::lazy_map::{LazyMap, ParamMap};
use crate::response::ServerResponse;
use http::{Method, Uri};
use sluice_http::protocol::{Entries, HttpError, RawRequest};
use sluice_stream::ReadStream;
use std::fmt;
use std::sync::Arc;

pub struct ServerRequest {
    raw: Arc<dyn RawRequest>,
    path_params: Entries,
    headers: LazyMap,
    params: LazyMap,
    response: ServerResponse,
}

impl ServerRequest {
    pub fn new(raw: Arc<dyn RawRequest>) -> Self {
        Self::with_path_params(raw, Vec::new())
    }

    /// Creates a request whose [`params`](ServerRequest::params) start with `path_params`.
    pub fn with_path_params(raw: Arc<dyn RawRequest>, path_params: Entries) -> Self {
        let response = ServerResponse::new(raw.response());
        Self { raw, path_params, headers: LazyMap::new(), params: LazyMap::new(), response }
    }

    pub fn method(&self) -> &Method {
        self.raw.method()
    }

    pub fn uri(&self) -> &Uri {
        self.raw.uri()
    }

    pub fn path(&self) -> &str {
        self.raw.path()
    }

    /// Parameters bound by the matched route pattern.
    pub fn path_params(&self) -> &[(String, String)] {
        &self.path_params
    }

    /// The request headers, loaded on first call.
    pub fn headers(&self) -> Result<&ParamMap, HttpError> {
        self.headers.get_or_load(|| self.raw.all_headers())
    }

    /// Path parameters followed by query parameters, loaded on first call.
    ///
    /// A path parameter wins over a query parameter of the same name.
    pub fn params(&self) -> Result<&ParamMap, HttpError> {
        self.params.get_or_load(|| merge_params(&self.path_params, self.raw.as_ref()))
    }

    pub fn put_header(&mut self, name: impl Into<String>, value: impl Into<String>) -> Result<Option<String>, HttpError> {
        let raw = &self.raw;
        self.headers.put(name.into(), value.into(), || raw.all_headers())
    }

    pub fn put_param(&mut self, name: impl Into<String>, value: impl Into<String>) -> Result<Option<String>, HttpError> {
        let (raw, path_params) = (&self.raw, &self.path_params);
        self.params.put(name.into(), value.into(), || merge_params(path_params, raw.as_ref()))
    }

    /// The request body, for requests that carry one.
    pub fn body(&self) -> Option<Arc<dyn ReadStream>> {
        self.raw.body()
    }

    pub fn response(&self) -> &ServerResponse {
        &self.response
    }

    pub fn raw(&self) -> &Arc<dyn RawRequest> {
        &self.raw
    }
}

fn merge_params(path_params: &[(String, String)], raw: &dyn RawRequest) -> Result<Entries, HttpError> {
    let query = raw.all_params()?;
    let mut entries = Vec::with_capacity(path_params.len() + query.len());
    entries.extend_from_slice(path_params);
    entries.extend(query.into_iter().filter(|(name, _)| !path_params.iter().any(|(bound, _)| bound == name)));
    Ok(entries)
}

impl fmt::Debug for ServerRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerRequest")
            .field("method", self.method())
            .field("uri", self.uri())
            .field("path_params", &self.path_params)
            .finish_non_exhaustive()
    }
}
