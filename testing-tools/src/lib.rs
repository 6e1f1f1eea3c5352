// Testing Tools Library
//
// This crate provides integration testing utilities for the stream hub.
// Currently includes:
// - sse-test-client: end-to-end scenarios against a running server

pub mod api_client;
pub mod auth;
pub mod output;
pub mod scenarios;
pub mod sse_client;
