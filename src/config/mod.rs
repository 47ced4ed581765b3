//! Configuration module for kc-certcrawl
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//! Every key has a default, so the crawler also runs without a file.
//!
//! # Example
//!
//! ```no_run
//! use kc_certcrawl::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("certcrawl.toml")).unwrap();
//! println!("Crawler will use {} workers", config.crawler.workers);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    BrowserConfig, Config, CrawlerConfig, OutputConfig, SchemaConfig, SiteConfig, MAX_WORKERS,
};

// Re-export parser functions
pub use parser::{compute_config_hash, default_config, load_config, load_config_with_hash};
