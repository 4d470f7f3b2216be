#![forbid(unsafe_code)]
//! Authentication and authorization hooks for an npm-style registry gateway.
//!
//! The host server calls [`auth::Authenticator`] on login and
//! [`authz::Authorizer`] on every package request. Read decisions are made
//! against the package document served by the front door, never against what
//! the client sent.

pub mod auth;
pub mod authz;
pub mod config;
pub mod error;
pub mod gate;
pub mod models;
pub mod observability;
pub mod request;
pub mod resolver;

pub use auth::{Authenticator, StaticAuthenticator};
pub use authz::{Authorizer, FrontDoorAuthorizer};
pub use error::{AuthError, FetchError};
pub use gate::TrustBoundary;
pub use request::AuthorizationRequest;
