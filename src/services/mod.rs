pub mod blob_store;
pub mod catalog;
pub mod key_registry;
pub mod permissions;
pub mod storage_service;
