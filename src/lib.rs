//! Pulls Gmail messages into a local SQLite store and applies user-defined rules to them.

pub mod actions;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod gmail;
pub mod ingest;
pub mod models;
pub mod rules;
