pub mod manifest;
pub mod storage;
