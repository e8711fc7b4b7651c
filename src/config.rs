use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub server: ServerConfig,
    pub cache: CacheConfig,
    pub upload: UploadConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    pub db_path: PathBuf,
    pub dir: PathBuf,
    pub ttl_minutes: i64,
    pub cleanup_interval_minutes: u64,
    pub max_size_mb: i64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UploadConfig {
    pub max_size_mb: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        Ok(Config {
            server: ServerConfig {
                host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env::var("PORT")
                    .unwrap_or_else(|_| "8080".to_string())
                    .parse()?,
            },
            cache: CacheConfig {
                db_path: PathBuf::from(
                    env::var("CACHE_DB_PATH").unwrap_or_else(|_| "./data/cache.db".to_string()),
                ),
                dir: PathBuf::from(
                    env::var("CACHE_DIR").unwrap_or_else(|_| "./data/cache".to_string()),
                ),
                ttl_minutes: env::var("CACHE_TTL_MINUTES")
                    .unwrap_or_else(|_| "120".to_string())
                    .parse()?,
                cleanup_interval_minutes: env::var("CACHE_CLEANUP_INTERVAL_MINUTES")
                    .unwrap_or_else(|_| "60".to_string())
                    .parse()?,
                max_size_mb: env::var("CACHE_MAX_SIZE_MB")
                    .unwrap_or_else(|_| "0".to_string())
                    .parse()?,
            },
            upload: UploadConfig {
                max_size_mb: env::var("UPLOAD_MAX_SIZE_MB")
                    .unwrap_or_else(|_| "100".to_string())
                    .parse()?,
            },
        })
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.ttl_minutes)
    }

    pub fn max_size_bytes(&self) -> i64 {
        if self.max_size_mb <= 0 {
            0
        } else {
            self.max_size_mb * 1024 * 1024
        }
    }
}

impl UploadConfig {
    pub fn max_size_bytes(&self) -> u64 {
        self.max_size_mb * 1024 * 1024
    }
}
