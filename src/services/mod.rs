pub mod azure;
pub mod backend;
pub mod listing;
pub mod local_store;
pub mod storage_service;
