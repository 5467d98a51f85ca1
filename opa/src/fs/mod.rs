//! Filesystem helpers.

pub mod dir_info;
pub mod links;

pub use dir_info::{dir_info, last_change, DirInfo};
