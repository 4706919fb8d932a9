use std::fmt;

use http::{HeaderName, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::debug;

use crate::{
    error::Error,
    exchange::Exchange,
    rewrite::{FieldOverwrite, rewrite},
    serializer::indent_json,
};

/// A step applied to the captured response after the real call and before
/// serialization.
pub trait ResponseFilter {
    fn apply(&mut self, exchange: &mut Exchange) -> Result<(), Error>;

    fn name(&self) -> &'static str {
        "custom"
    }
}

impl<F> ResponseFilter for F
where
    F: FnMut(&mut Exchange) -> Result<(), Error>,
{
    fn apply(&mut self, exchange: &mut Exchange) -> Result<(), Error> {
        self(exchange)
    }
}

/// Indent JSON bodies. A `204 No Content` response passes through untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrettyJson;

impl ResponseFilter for PrettyJson {
    fn apply(&mut self, exchange: &mut Exchange) -> Result<(), Error> {
        if exchange.status == StatusCode::NO_CONTENT {
            return Ok(());
        }
        if !exchange.is_json() {
            return Err(Error::NotJson {
                content_type: exchange.content_type().to_string(),
            });
        }
        let body = indent_json(&exchange.body)?;
        exchange.set_body(body);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "pretty_json"
    }
}

/// Overwrite fields of a JSON object body, then re-encode it compactly.
#[derive(Debug, Clone)]
pub struct ModifyJson {
    overwrite: FieldOverwrite,
}

impl ModifyJson {
    pub fn new(overwrite: FieldOverwrite) -> Self {
        Self { overwrite }
    }
}

impl ResponseFilter for ModifyJson {
    fn apply(&mut self, exchange: &mut Exchange) -> Result<(), Error> {
        let mut object: Map<String, Value> = exchange.json()?;
        rewrite(&mut object, &self.overwrite)?;
        let body = serde_json::to_vec(&object).map_err(|source| Error::InvalidJson {
            context: "rewritten response body",
            source,
        })?;
        exchange.set_body(body);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "modify_json"
    }
}

/// Decode the body into a caller-owned value for later steps of a scenario.
pub struct Capture<'a, T> {
    destination: &'a mut T,
}

impl<'a, T> Capture<'a, T> {
    pub fn new(destination: &'a mut T) -> Self {
        Self { destination }
    }
}

impl<T> fmt::Debug for Capture<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Capture")
            .field("type", &std::any::type_name::<T>())
            .finish()
    }
}

impl<T: DeserializeOwned> ResponseFilter for Capture<'_, T> {
    fn apply(&mut self, exchange: &mut Exchange) -> Result<(), Error> {
        *self.destination = exchange.json()?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "capture"
    }
}

/// Drop response headers whose values change between runs.
#[derive(Debug, Clone)]
pub struct RemoveHeaders {
    names: Vec<String>,
}

impl RemoveHeaders {
    pub fn new<S: Into<String>, I: IntoIterator<Item = S>>(names: I) -> Self {
        Self {
            names: names
                .into_iter()
                .map(|name| name.into().to_ascii_lowercase())
                .collect(),
        }
    }
}

impl ResponseFilter for RemoveHeaders {
    fn apply(&mut self, exchange: &mut Exchange) -> Result<(), Error> {
        for name in &self.names {
            if let Ok(name) = HeaderName::from_bytes(name.as_bytes()) {
                exchange.headers.remove(name);
            }
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "remove_headers"
    }
}

/// Ordered filters; each one sees the exchange left by the previous one.
#[derive(Default)]
pub struct FilterChain<'a> {
    filters: Vec<Box<dyn ResponseFilter + 'a>>,
}

impl<'a> FilterChain<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<F: ResponseFilter + 'a>(mut self, filter: F) -> Self {
        self.filters.push(Box::new(filter));
        self
    }

    pub fn pretty_json(self) -> Self {
        self.with(PrettyJson)
    }

    pub fn modify_json(self, overwrite: FieldOverwrite) -> Self {
        self.with(ModifyJson::new(overwrite))
    }

    pub fn capture<T: DeserializeOwned + 'a>(self, destination: &'a mut T) -> Self {
        self.with(Capture::new(destination))
    }

    pub fn remove_headers<S: Into<String>, I: IntoIterator<Item = S>>(self, names: I) -> Self {
        self.with(RemoveHeaders::new(names))
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn apply(&mut self, exchange: &mut Exchange) -> Result<(), Error> {
        for filter in &mut self.filters {
            debug!(filter = filter.name(), "applying response filter");
            filter.apply(exchange)?;
        }
        Ok(())
    }
}

impl fmt::Debug for FilterChain<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.filters.iter().map(|filter| filter.name()))
            .finish()
    }
}
