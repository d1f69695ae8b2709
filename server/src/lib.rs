//! Authgate Server
//!
//! Fail-closed, Redis-backed rate limiting for authentication endpoints:
//! login, token refresh and Auth0 authorization URL issuance.

pub mod api;
pub mod auth;
pub mod config;
pub mod ratelimit;
