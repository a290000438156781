pub mod file_service;
pub mod manifest;
pub mod storage;
