pub mod alpha_vantage;
pub mod util;

pub use alpha_vantage::AlphaVantageProvider;
