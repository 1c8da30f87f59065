//! Web front-end for a single blob storage container: lists objects, accepts
//! uploads and deletes objects, on top of a local SQLite/disk store or Azure
//! Blob Storage.

pub mod config;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;
pub mod views;
