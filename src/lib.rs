#![forbid(unsafe_code)]

pub mod build;
pub mod clean;
pub mod cli;
pub mod config;
pub mod corpus;
pub mod crawl;
pub mod extract;
pub mod fetch;
pub mod formats;
pub mod generate;
pub mod images;
pub mod linkmap;
pub mod logging;
pub mod relink;
pub mod render;
pub mod scope;
