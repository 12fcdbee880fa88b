//! HTTP client for the form service.

pub mod client;

pub use client::{Client, Error};
