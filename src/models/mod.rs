//! Data models for API keys, settings, and generation payloads.
//!
//! This module contains the persisted record shapes and the request/response
//! structures exchanged over the HTTP surface.

/// API key records and key management responses
pub mod api_key;
/// Generation request/response payloads
pub mod generation;
/// Resource-strategy settings and update payloads
pub mod settings;
