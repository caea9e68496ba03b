//! Server-side rendition of a single-page assistant form: one prompt field,
//! one backend HTTP call per submit, and light post-processing that rewrites
//! embedded citation markers into file links.
//!
//! The two pieces with behavior worth naming are [`format::format_response`]
//! (raw backend text to text-and-link segments) and
//! [`controller::Controller`] (the idle → loading → succeeded/failed round
//! lifecycle). Everything else is the web and CLI surface around them.

pub mod backend;
pub mod config;
pub mod controller;
pub mod format;
pub mod web;

pub use backend::{BackendClient, BackendError};
pub use config::RelayConfig;
pub use controller::{Controller, RequestState, classify};
pub use format::{Formatted, Segment, format_response};
