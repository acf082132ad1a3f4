// Utils

pub mod prometheus_metrics;
pub mod text;

pub use text::{extract_json_block, split_text_into_parts};
