pub mod auth;
pub mod cache;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod models;
pub mod remote;
pub mod security;
pub mod validation;
