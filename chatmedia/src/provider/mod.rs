//! External capabilities consumed by the scheduler.
//!
//! - [`ResourceLocator`] maps a logical image and tier to a fetchable URL.
//! - [`ByteFetcher`] performs the network load of one URL.
//!
//! Both are traits so the scheduler can be driven by mocks in tests.
//!
//! ```ignore
//! use chatmedia::provider::{ReqwestFetcher, SharedCredential, TemplateLocator};
//!
//! let credential = SharedCredential::new();
//! credential.set("session-token");
//! let locator = TemplateLocator::new("https://media.example.com/attachments", credential);
//! let fetcher = ReqwestFetcher::new()?;
//! ```

mod http;
mod locator;

pub use http::{BoxFuture, ByteFetcher, ReqwestFetcher};
pub use locator::{ResourceLocator, SharedCredential, TemplateLocator};

#[cfg(test)]
pub use http::tests::MockFetcher;
