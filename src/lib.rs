pub mod analyzers;
pub mod config;
pub mod output;
pub mod pipeline;
pub mod reader;
pub mod record;
pub mod stats;
