pub mod bus;
pub mod candle;
pub mod config;
pub mod engine;
pub mod error;
pub mod event;
pub mod feed;
pub mod indicator;
pub mod ingest;
pub mod model;
pub mod ranker;
pub mod runtime;
pub mod scorer;
pub mod stats;
pub mod trend;
