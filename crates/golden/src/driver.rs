use bytes::Bytes;
use http::{Request, StatusCode};
use tracing::{info, info_span, warn};

use crate::{
    case::TestCase,
    config::RunConfig,
    diff,
    error::Error,
    exchange::Exchange,
    filter::FilterChain,
    golden::GoldenStore,
    handler::Handler,
    serializer::{dump, indent_json},
};

/// Runs exchanges against one handler and checks them against golden files.
#[derive(Debug)]
pub struct Driver<H> {
    handler: H,
    config: RunConfig,
    store: GoldenStore,
}

impl<H: Handler> Driver<H> {
    pub fn new(handler: H, config: RunConfig) -> Self {
        let store = GoldenStore::new(config.testdata_dir.clone());
        Self {
            handler,
            config,
            store,
        }
    }

    /// Build a driver with [`RunConfig::load`].
    pub fn from_env(handler: H) -> Result<Self, Error> {
        Ok(Self::new(handler, RunConfig::load()?))
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn store(&self) -> &GoldenStore {
        &self.store
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    /// Send `request`, check the status code, run `filters`, then compare the
    /// serialized response with the golden file named after `case` (or overwrite
    /// it in update mode).
    ///
    /// Status and body mismatches are recorded on `case`. Anything else aborts
    /// before the golden file is written; the error is recorded on `case` as
    /// fatal and also returned.
    pub fn run(
        &self,
        case: &mut TestCase,
        request: Request<Bytes>,
        want: StatusCode,
        filters: FilterChain<'_>,
    ) -> Result<(), Error> {
        let span = info_span!("golden", case = %case.name());
        let _entered = span.enter();

        let result = self.check(case, request, want, filters);
        if let Err(err) = &result {
            case.fatal(err);
        }
        result
    }

    fn check(
        &self,
        case: &mut TestCase,
        request: Request<Bytes>,
        want: StatusCode,
        mut filters: FilterChain<'_>,
    ) -> Result<(), Error> {
        info!(">>> {} {}", request.method(), request.uri());
        let mut exchange = self.dispatch(request)?;

        if exchange.status != want {
            case.error(format!(
                "HTTP StatusCode: {}, want: {}",
                exchange.status.as_u16(),
                want.as_u16()
            ));
        }

        if self.config.dump_raw {
            info!("Raw response:\n{}", raw_response(&exchange));
        }

        filters.apply(&mut exchange)?;
        let got = dump(&exchange, true);

        let path = self.store.path_for(case.name());
        if self.config.update_golden {
            self.store.write(case.name(), &got)?;
        } else {
            let want = self.store.read(case.name())?;
            if want != got {
                case.error(format!(
                    "HTTP Response mismatch ({path}):\n{}",
                    diff::render(&want, &got)
                ));
            }
        }

        info!("<<< {path}");
        Ok(())
    }

    fn dispatch(&self, request: Request<Bytes>) -> Result<Exchange, Error> {
        // the handler consumes the request; keep what the exchange records
        let mut snapshot = Request::builder()
            .method(request.method().clone())
            .uri(request.uri().clone())
            .version(request.version())
            .body(request.body().clone())?;
        *snapshot.headers_mut() = request.headers().clone();

        let response = self.handler.handle(request)?;
        Ok(Exchange::new(&snapshot, response))
    }
}

/// Pre-filter response as logged in diagnostic mode. JSON bodies of `200` and
/// `201` responses are indented.
fn raw_response(exchange: &Exchange) -> String {
    let head = String::from_utf8_lossy(&dump(exchange, false)).into_owned();
    let indent = exchange.is_json()
        && matches!(exchange.status, StatusCode::OK | StatusCode::CREATED);
    let body = if indent {
        match indent_json(&exchange.body) {
            Ok(body) => body,
            Err(err) => {
                warn!(error = %err, "raw response body is not valid JSON");
                exchange.body.to_vec()
            }
        }
    } else {
        exchange.body.to_vec()
    };
    format!("{head}{}", String::from_utf8_lossy(&body))
}
