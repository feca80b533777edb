// src/pipeline.rs
pub mod chain;
pub mod config;
pub mod context;
pub mod filter;
pub mod grok;
pub mod stream;
