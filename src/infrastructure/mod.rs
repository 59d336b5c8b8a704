//! Infrastructure Layer - External concerns and implementations
//!
//! HTTP gateways for NVD, EPSS and KEV, the retry executor they share, and
//! the file-backed analysis cache.

pub mod api_clients;
pub mod cache;
pub mod resilience;

pub use api_clients::{
    EpssClient, EpssGateway, KevClient, KevGateway, NvdClient, NvdGateway, RawNvdCve,
};
pub use cache::*;
pub use resilience::*;
