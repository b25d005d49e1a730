// LexMedica Client - Library root for testing

pub mod config;
pub mod error;
pub mod auth;
pub mod api;
pub mod models;
