// src/config/mod.rs
pub mod resolver;

pub use resolver::{
    ApiConfig, CacheConfig, CatalogConfig, ClassifierConfig, Protocol, ResolverConfig,
    DEFAULT_BATCH_CONCURRENCY, DEFAULT_CONFIG_PATH, DEFAULT_MAX_BATCH_ITEMS, ENV_CONFIG_PATH,
};
