//! Client for the vendor cost API: transport, retry loop, and pagination.

pub mod http;
pub mod models;
pub mod pager;

pub use http::{Config, HttpClient, DEFAULT_BASE_URL};
pub use models::{CostRow, ForecastPage, ForecastRow, Page, Query};
pub use pager::Pager;
