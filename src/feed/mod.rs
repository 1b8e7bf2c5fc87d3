pub mod backoff;
pub mod binance;
pub mod replay;
pub mod types;
