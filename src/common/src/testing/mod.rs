//! Test utilities for dumprotate.
//!
//! This module is only available when the `testing` feature is enabled or during tests:
//!
//! ```toml
//! [dev-dependencies]
//! common = { path = "../common", features = ["testing"] }
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use common::testing::TestConfigBuilder;
//!
//! let config = TestConfigBuilder::new()
//!     .with_backup_dir(temp_dir.path())
//!     .with_keep("0,7,4,12,-1")
//!     .build();
//! ```

mod config_builder;

pub use config_builder::TestConfigBuilder;
