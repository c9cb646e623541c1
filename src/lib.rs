//! Mirror sequencing-run files listed on a vendor web page into S3.
//!
//! Pipeline: listing page → [`links`] → [`plan`] (keys from [`identifiers`])
//! → [`transfer`] → [`transfer::RunSummary`].

pub mod app;
pub mod config;
pub mod domain;
pub mod error;
pub mod http;
pub mod identifiers;
pub mod links;
pub mod output;
pub mod plan;
pub mod s3;
pub mod transfer;
