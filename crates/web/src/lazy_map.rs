//! Maps materialized from an entry provider on first use.

use indexmap::IndexMap;
use once_cell::sync::OnceCell;
use sluice_http::protocol::{Entries, HttpError};

/// Single-valued view of provider entries, in first-seen key order.
pub type ParamMap = IndexMap<String, String>;

/// A [`ParamMap`] computed at most once per owner.
///
/// The first successful [`get_or_load`](LazyMap::get_or_load) collects the provider's entries
/// and caches the result; every later call returns the cached map without consulting the
/// provider again. A failed load caches nothing.
#[derive(Debug, Default)]
pub struct LazyMap {
    cell: OnceCell<ParamMap>,
}

impl LazyMap {
    pub const fn new() -> Self {
        Self { cell: OnceCell::new() }
    }

    /// Returns the cached map, loading it from `load` on first use.
    ///
    /// On a repeated key the last value wins and the key keeps the position of its first
    /// occurrence.
    pub fn get_or_load<F>(&self, load: F) -> Result<&ParamMap, HttpError>
    where
        F: FnOnce() -> Result<Entries, HttpError>,
    {
        self.cell.get_or_try_init(|| load().map(collect))
    }

    /// Sets `key` to `value` in the cached map, loading it first if needed.
    ///
    /// Returns the value previously stored under `key`. The provider is not updated.
    pub fn put<F>(&mut self, key: String, value: String, load: F) -> Result<Option<String>, HttpError>
    where
        F: FnOnce() -> Result<Entries, HttpError>,
    {
        let mut map = match self.cell.take() {
            Some(map) => map,
            None => collect(load()?),
        };
        let previous = map.insert(key, value);
        self.cell = OnceCell::from(map);
        Ok(previous)
    }

    #[inline]
    pub fn is_loaded(&self) -> bool {
        self.cell.get().is_some()
    }
}

fn collect(entries: Entries) -> ParamMap {
    entries.into_iter().collect()
}
