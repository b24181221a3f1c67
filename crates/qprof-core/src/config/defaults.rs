//! Default values for configuration structs.

pub const DEFAULT_DB_FILENAME: &str = "qprof.db";
pub const DEFAULT_WAL_MODE: bool = true;
pub const DEFAULT_MMAP_SIZE: u64 = 67_108_864; // 64MB
pub const DEFAULT_CACHE_SIZE: i64 = -16_000; // 16MB
pub const DEFAULT_BUSY_TIMEOUT_MS: u32 = 5_000;
pub const DEFAULT_READ_POOL_SIZE: usize = 4;
