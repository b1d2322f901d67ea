pub mod api_connection;
pub mod cli;
pub mod config;
pub mod errors;
pub mod generation;
pub mod ingestor;
pub mod prompts;
pub mod quantity_parser;
pub mod ranker;
pub mod recipe;
pub mod scaling;
pub mod store;
