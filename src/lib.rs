pub mod analysis;
pub mod calculators;
pub mod chat;
pub mod client;
pub mod config;
pub mod export;
pub mod filter;
pub mod history;
pub mod ingest;
pub mod normalize;
