pub mod app;
pub mod config;
pub mod domain;
pub mod ena;
pub mod error;
pub mod fetch;
pub mod fs_util;
pub mod output;
pub mod process;
pub mod sra;
pub mod toolkit;
