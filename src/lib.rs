pub mod app;
pub mod config;
pub mod dataset;
pub mod decompress;
pub mod domain;
pub mod download;
pub mod error;
pub mod eutils;
pub mod formatter;
pub mod fs_util;
pub mod output;
pub mod sequence;
