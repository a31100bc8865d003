//! Mnemo Provider — external semantic-search provider abstraction.
//!
//! The knowledge base delegates actual embedding search to an external
//! provider when one is available. This crate defines the contract that
//! provider must satisfy, an HTTP implementation against an
//! OpenAI-compatible `vector_stores` API, and a scripted mock for tests.
//!
//! The error taxonomy is deliberately small: a provider call either
//! succeeds, fails transiently (worth retrying), or reveals that the
//! capability is structurally absent (never worth retrying). The caller
//! decides what to do with each class; this crate never retries on its own.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod http;
pub mod mock;
pub mod provider;

pub use error::{ProviderError, Result};
pub use http::{HttpProviderConfig, HttpSearchProvider};
pub use mock::{MockOutcome, MockSearchProvider};
pub use provider::{RemoteFile, RemoteStore, SearchProvider};
