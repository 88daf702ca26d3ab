//! Route modules for Coffer Server

pub mod files;
pub mod health;
pub mod upload;
