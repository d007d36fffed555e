//! Boundary layer for Taskiant's presentation tier.
//!
//! Owns the data layer's single store handle and exposes its operations as
//! typed calls ([`TaskiantApi`]) and as a JSON dispatcher ([`ApiRequest`]).

pub mod api;
pub mod dispatch;

pub use api::{ApiResponse, AuthStatus, LoginResponse, StoreStatus, TaskiantApi};
pub use dispatch::ApiRequest;
