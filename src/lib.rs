//! Listing and stream extraction for a single upstream video site.
//!
//! [`catalog::CatalogExtractor`] turns a listing page into [`catalog::VideoSummary`]
//! entries, [`extractor::StreamResolver`] turns a detail page into a
//! [`extractor::StreamDescriptor`], and [`api::Dispatcher`] fronts both with a
//! JSON request/response envelope.

pub mod api;
pub mod catalog;
pub mod config;
pub mod error;
pub mod extractor;
pub mod http;
pub mod utils;

pub use api::{Dispatcher, Request, Response};
pub use catalog::{CatalogExtractor, VideoSummary};
pub use config::{Settings, Source};
pub use error::{ErrorKind, ExtractError, FetchFailure};
pub use extractor::{StreamDescriptor, StreamResolver};
pub use http::{HttpFetcher, PageFetcher, PageRequest};
