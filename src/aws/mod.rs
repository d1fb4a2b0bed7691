//! AWS Lambda API interaction module
//!
//! This module provides the remote side of the provider: the request
//! catalogue, the API seam resource code talks to, credential resolution
//! with request signing, and the HTTP client.
//!
//! # Module Structure
//!
//! - [`api`] - [`LambdaApi`](api::LambdaApi) trait, error classification, cancellable calls
//! - [`auth`] - Credential and region resolution, Signature Version 4
//! - [`client`] - Main Lambda client for making API requests
//! - [`http`] - HTTP utilities for REST API calls
//! - [`request`] - One request variant per remote operation
//!
//! # Example
//!
//! ```ignore
//! use lambda_provider::aws::client::LambdaClient;
//! use lambda_provider::aws::request::LambdaRequest;
//! use lambda_provider::aws::api::LambdaApi;
//!
//! async fn example(client: &LambdaClient) -> anyhow::Result<()> {
//!     let function = client
//!         .send(LambdaRequest::GetFunction { function_name: "orders".into() })
//!         .await?;
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod auth;
pub mod client;
pub mod http;
pub mod request;
