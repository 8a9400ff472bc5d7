use clap::Parser;
use rust_decimal::Decimal;
use std::path::PathBuf;
use std::str::FromStr;

/// Watches one stock quote and raises take-profit / stop-loss alerts.
#[derive(Parser, Debug)]
#[command(name = "stockwatch", version)]
pub struct Cli {
    /// Ticker to monitor, e.g. PETR4
    pub symbol: String,

    /// Price at or above which a take-profit alert fires
    #[arg(value_parser = parse_threshold)]
    pub take_profit: Decimal,

    /// Price at or below which a stop-loss alert fires
    #[arg(value_parser = parse_threshold)]
    pub stop_loss: Decimal,

    /// Use the symbol as given instead of the B3 (".SA") listing
    #[arg(long)]
    pub non_br: bool,

    /// Path to the JSON configuration file
    #[arg(short, long, default_value = "config.json")]
    pub config: PathBuf,
}

impl Cli {
    pub fn stock_symbol(&self) -> String {
        normalize_symbol(&self.symbol, self.non_br)
    }
}

pub fn normalize_symbol(raw: &str, non_br: bool) -> String {
    let symbol = raw.trim().to_uppercase();
    if non_br {
        symbol
    } else {
        format!("{}.SA", symbol)
    }
}

fn parse_threshold(raw: &str) -> Result<Decimal, String> {
    let value = Decimal::from_str(raw.trim()).map_err(|e| format!("not a decimal: {}", e))?;
    if value.is_sign_negative() && !value.is_zero() {
        return Err("threshold must not be negative".to_string());
    }
    Ok(value)
}
