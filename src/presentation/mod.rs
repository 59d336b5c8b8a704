//! Presentation Layer - Web API and HTTP handling
//!
//! Axum router, controllers, DTOs and middleware. Handlers translate DTOs to
//! service calls and map `ApplicationError` onto HTTP status codes.

pub mod controllers;
pub mod middleware;
pub mod models;
pub mod routes;


pub use controllers::*;
pub use middleware::*;
pub use models::*;
pub use routes::*;
