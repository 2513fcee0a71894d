//! Tool invoker adapters

#[cfg(feature = "http")]
mod http;
mod static_fixtures;

#[cfg(feature = "http")]
pub use http::HttpToolInvoker;
pub use static_fixtures::{FixtureError, StaticToolInvoker, ToolFixture};
