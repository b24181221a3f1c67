pub mod defaults;

mod storage_config;

pub use storage_config::StorageConfig;
