//! Authenticator cache
//!
//! A concurrent, hot-swappable mapping from [`AuthenticatorId`] to a live
//! authenticator plugin. The reconciliation layer stores and deletes
//! entries; the credential exchange and the impersonation proxy resolve an
//! authenticator through the cache on every request.
//!
//! [`AuthenticatorId`]: authn_cache_sdk::AuthenticatorId
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod cache;

pub use cache::AuthenticatorCache;
