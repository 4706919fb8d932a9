use std::fmt;

use axum::body::Body;
use bytes::Bytes;
use http::{Request, Response};
use tokio::runtime::{Builder, Runtime};
use tower::{Service, ServiceExt};

use crate::error::{BoxError, Error};

/// The handler under test: one request in, one response out, synchronously.
pub trait Handler {
    fn handle(&self, request: Request<Bytes>) -> Result<Response<Bytes>, Error>;
}

impl<H: Handler + ?Sized> Handler for &H {
    fn handle(&self, request: Request<Bytes>) -> Result<Response<Bytes>, Error> {
        (**self).handle(request)
    }
}

impl<H: Handler + ?Sized> Handler for std::sync::Arc<H> {
    fn handle(&self, request: Request<Bytes>) -> Result<Response<Bytes>, Error> {
        (**self).handle(request)
    }
}

/// Adapt a plain function into a [`Handler`].
pub fn handler_fn<F>(f: F) -> HandlerFn<F>
where
    F: Fn(Request<Bytes>) -> Response<Bytes>,
{
    HandlerFn { f }
}

#[derive(Clone)]
pub struct HandlerFn<F> {
    f: F,
}

impl<F> fmt::Debug for HandlerFn<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerFn").finish_non_exhaustive()
    }
}

impl<F> Handler for HandlerFn<F>
where
    F: Fn(Request<Bytes>) -> Response<Bytes>,
{
    fn handle(&self, request: Request<Bytes>) -> Result<Response<Bytes>, Error> {
        Ok((self.f)(request))
    }
}

/// Drives a tower service such as an axum `Router` on a private current-thread
/// runtime. Must not be called from inside another tokio runtime.
pub struct ServiceHandler<S> {
    service: S,
    runtime: Runtime,
}

impl<S> ServiceHandler<S> {
    pub fn new(service: S) -> Result<Self, Error> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(Error::Runtime)?;
        Ok(Self { service, runtime })
    }
}

impl<S> fmt::Debug for ServiceHandler<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceHandler").finish_non_exhaustive()
    }
}

impl<S> Handler for ServiceHandler<S>
where
    S: Service<Request<Body>, Response = Response<Body>> + Clone,
    S::Error: Into<BoxError>,
{
    fn handle(&self, request: Request<Bytes>) -> Result<Response<Bytes>, Error> {
        let service = self.service.clone();
        self.runtime.block_on(async move {
            let response = service
                .oneshot(request.map(Body::from))
                .await
                .map_err(|err| Error::Handler(err.into()))?;
            let (parts, body) = response.into_parts();
            let body = axum::body::to_bytes(body, usize::MAX)
                .await
                .map_err(|err| Error::Handler(Box::new(err)))?;
            Ok(Response::from_parts(parts, body))
        })
    }
}
