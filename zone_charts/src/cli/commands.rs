use std::path::PathBuf;

use clap::{ArgGroup, Parser};
use zone_store::config::InstrumentFamily;

#[derive(Debug, Parser)]
#[command(name = "zone-charts", author, version, about = "Render zone and dashboard charts from market data")]
#[command(group(ArgGroup::new("target").required(true).args(["symbol", "all_stocks"])))]
pub struct Cli {
    /// Ticker to chart (e.g. "AAPL", "BTC/USD")
    pub symbol: Option<String>,

    /// Days of history for timeframes without their own lookback
    #[arg(long)]
    pub days: Option<u32>,

    /// Generate a dashboard for every symbol of the family
    #[arg(long, alias = "all")]
    pub all_stocks: bool,

    /// Read the crypto family instead of stocks
    #[arg(long)]
    pub crypto: bool,

    /// Write to the local output directory instead of uploading
    #[arg(long)]
    pub skip_upload: bool,

    /// Path to a TOML config file; built-in defaults otherwise
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

impl Cli {
    pub fn family(&self) -> InstrumentFamily {
        if self.crypto {
            InstrumentFamily::Crypto
        } else {
            InstrumentFamily::Stocks
        }
    }
}
