pub mod ema;
pub mod hull;
pub mod kama;
pub mod momentum;
pub mod rsi;
pub mod sma;
pub mod wma;

pub use ema::Ema;
pub use hull::HullMa;
pub use kama::Kama;
pub use momentum::MomentumTracker;
pub use rsi::{Rsi, RSI_NEUTRAL};
pub use sma::Sma;
pub use wma::Wma;
