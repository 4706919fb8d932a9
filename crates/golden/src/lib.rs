pub mod case;
pub mod config;
pub mod diff;
pub mod driver;
pub mod error;
pub mod exchange;
pub mod filter;
pub mod golden;
pub mod handler;
pub mod request;
pub mod rewrite;
pub mod serializer;
pub mod telemetry;

pub use case::{TestCase, api_test_name};
pub use config::RunConfig;
pub use driver::Driver;
pub use error::{Error, Failure};
pub use exchange::Exchange;
pub use filter::{Capture, FilterChain, ModifyJson, PrettyJson, RemoveHeaders, ResponseFilter};
pub use golden::{GoldenRecord, GoldenStore};
pub use handler::{Handler, HandlerFn, ServiceHandler, handler_fn};
pub use request::TestRequest;
pub use rewrite::{FieldOverwrite, Overwrite, RewriteError, rewrite};
