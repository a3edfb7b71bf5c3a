//! HTTP request handlers (route handlers).
//!
//! Each handler is an async function that:
//! 1. Receives HTTP request data (JSON body, URL params, multipart forms)
//! 2. Performs business logic (store operations, dispatch, validation)
//! 3. Returns HTTP response (JSON, status code, file bytes)
/// Admin key and settings management endpoints
pub mod admin;
/// Health check endpoint
pub mod health;
/// Generation and download endpoints
pub mod images;
