use bytes::Bytes;
use http::{HeaderName, HeaderValue, Method, Request, header::CONTENT_TYPE};
use serde::Serialize;

use crate::error::Error;

/// Builder for the request sent to the handler under test.
#[derive(Debug, Clone)]
pub struct TestRequest {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    headers: Vec<(String, String)>,
    body: Bytes,
}

impl TestRequest {
    /// `target` may already carry a query string; [`TestRequest::query`] adds to it.
    pub fn new(method: Method, target: impl AsRef<str>) -> Self {
        let target = target.as_ref();
        let (path, query) = match target.split_once('?') {
            Some((path, query)) => (
                path.to_string(),
                serde_urlencoded::from_str(query).unwrap_or_default(),
            ),
            None => (target.to_string(), Vec::new()),
        };
        Self {
            method,
            path,
            query,
            headers: Vec::new(),
            body: Bytes::new(),
        }
    }

    pub fn get(target: impl AsRef<str>) -> Self {
        Self::new(Method::GET, target)
    }

    pub fn post(target: impl AsRef<str>) -> Self {
        Self::new(Method::POST, target)
    }

    pub fn put(target: impl AsRef<str>) -> Self {
        Self::new(Method::PUT, target)
    }

    pub fn patch(target: impl AsRef<str>) -> Self {
        Self::new(Method::PATCH, target)
    }

    pub fn delete(target: impl AsRef<str>) -> Self {
        Self::new(Method::DELETE, target)
    }

    pub fn query<I, V>(mut self, key: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        let key = key.into();
        self.query
            .extend(values.into_iter().map(|value| (key.clone(), value.into())));
        self
    }

    /// Set a header, replacing earlier values of the same name.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        self.headers
            .retain(|(existing, _)| !existing.eq_ignore_ascii_case(&name));
        self.headers.push((name, value.into()));
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Encode `value` as the JSON request body.
    pub fn json<T: Serialize + ?Sized>(mut self, value: &T) -> Result<Self, Error> {
        let body = serde_json::to_vec(value).map_err(|source| Error::InvalidJson {
            context: "request body",
            source,
        })?;
        self.body = Bytes::from(body);
        if !self
            .headers
            .iter()
            .any(|(name, _)| name.eq_ignore_ascii_case(CONTENT_TYPE.as_str()))
        {
            self.headers
                .push((CONTENT_TYPE.to_string(), "application/json".into()));
        }
        Ok(self)
    }

    pub fn build(self) -> Result<Request<Bytes>, Error> {
        let uri = if self.query.is_empty() {
            self.path
        } else {
            let mut pairs = self.query;
            // sorted by key, values of one key keep their order
            pairs.sort_by(|a, b| a.0.cmp(&b.0));
            let encoded = serde_urlencoded::to_string(&pairs)
                .map_err(|err| Error::Request(err.to_string()))?;
            format!("{}?{}", self.path, encoded)
        };

        let mut builder = Request::builder().method(self.method).uri(uri);
        for (name, value) in &self.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|err| Error::Request(format!("header {name:?}: {err}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|err| Error::Request(format!("header {name}: {err}")))?;
            builder = builder.header(name, value);
        }
        Ok(builder.body(self.body)?)
    }
}
