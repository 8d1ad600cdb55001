pub mod app;
pub mod client;
pub mod config;
pub mod domain;
pub mod error;
pub mod example_config;
pub mod fs_util;
pub mod materialize;
pub mod output;
pub mod poll;
pub mod prompt;
pub mod response;
pub mod resume;
pub mod stats;
pub mod submit;
