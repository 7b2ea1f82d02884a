//! HTTP route handlers

pub mod convert;
pub mod proxy;
