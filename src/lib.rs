//! # LifeFlow
//!
//! Blood-donation coordination between donors and hospitals.
//!
//! This crate provides:
//! - ABO/Rh red-cell compatibility lookups
//! - Donor eligibility screening and donation-interval arithmetic
//! - Donor, hospital, inventory, request, donation and notification records
//!   persisted in SQLite
//!
//! ## Architecture
//!
//! The crate follows Hexagonal Architecture:
//! - `domain`: Core business types and pure rules (no I/O)
//! - `ports`: Trait definitions for persistence
//! - `adapters`: Concrete implementations (SQLite, log sanitizing)
//! - `application`: Use cases orchestrating domain and ports
//! - `config`: Layered runtime configuration

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;

pub use domain::{BloodType, Donor, EligibilityReport};

/// Result type for LifeFlow operations
pub type Result<T> = std::result::Result<T, LifeflowError>;

/// Main error type for LifeFlow
#[derive(Debug, thiserror::Error)]
pub enum LifeflowError {
    #[error("Storage operation failed: {0}")]
    Store(#[from] adapters::StoreError),

    #[error("Access denied: {0}")]
    Access(#[from] application::AccessError),

    #[error(transparent)]
    Token(#[from] domain::ParseTokenError),

    #[error("Donor is not eligible: {}", .0.join("; "))]
    Ineligible(Vec<String>),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ::config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
