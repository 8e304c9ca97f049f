//! Gmail inbox processor: store messages locally and apply label rules.

pub mod auth;
pub mod config;
pub mod dates;
pub mod db;
pub mod error;
pub mod gmail;
pub mod models;
pub mod pipeline;
pub mod report;
pub mod rules;
