//! Client library for the marketing-automation SOAP API (mktows 2_0).
//!
//! This library provides lead retrieval, lead upsert and campaign enrollment,
//! including request signing, attribute coercion and reply normalization.
//! The SOAP envelope itself is produced by a [`transport::Transport`]
//! collaborator.
//!
//! # Modules
//!
//! - `core`: Marshaling and signing layer.
//! - `integrations`: External collaborators (transport, trace log).
//! - `auth`: Per-call signed authentication header.
//! - `client`: One method per remote operation, fault classification.
//! - `codec`: Attribute list encoding and decoding.
//! - `config`: Configuration management.
//! - `errors`: Error handling types.
//! - `models`: Request, reply and value models.
//! - `normalizer`: Single-or-many reply normalization.
//! - `trace_log`: Debug tracing of raw payloads.
//! - `transport`: Transport trait and gateway transport.

pub mod core;
pub mod integrations;

pub mod auth;
pub mod client;
pub mod codec;
pub mod config;
pub mod errors;
pub mod models;
pub mod normalizer;
pub mod trace_log;
pub mod transport;

pub use client::MktowsClient;
pub use errors::ClientError;
