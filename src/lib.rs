#![allow(non_snake_case)]
#![allow(clippy::too_many_arguments)]

// Declare the modules that form the library's public API (or internal structure)
// Using `pub mod` makes them accessible from the binaries using `use QuizForge::module_name;`
pub mod broker;
pub mod config;
pub mod data_model;
pub mod error;
pub mod generator;
pub mod llm;
pub mod pdf;
pub mod server;
pub mod store;
pub mod utils;

pub use error::{Result, WorkerError};
