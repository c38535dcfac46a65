pub mod app;
pub mod config;
pub mod domain;
pub mod error;
pub mod output;
pub mod scratch;
pub mod transcripts;
pub mod transfer;
