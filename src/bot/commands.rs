//! Chat command parsing.
//!
//! `/scan [symbol] [timeframe] [top]` accepts 0-3 arguments:
//! - `/scan`: 1h, default top-N
//! - `/scan 4h`: timeframe only
//! - `/scan 4h 100` or `/scan 4h full`: timeframe + universe
//! - `/scan BTCUSDT 4h full`: explicit symbol (universe ignored)

use crate::types::{ScanError, Symbol, Timeframe, UniverseSelector};

pub const USAGE: &str = "Invalid arguments. Use: /scan [symbol] [timeframe] [top] \
(e.g., /scan 4h 100, /scan 4h full, or /scan BTCUSDT 4h full)";

/// Parsed `/scan` parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanArgs {
    pub symbol: Option<Symbol>,
    pub timeframe: Timeframe,
    pub selector: UniverseSelector,
}

impl Default for ScanArgs {
    fn default() -> Self {
        Self {
            symbol: None,
            timeframe: Timeframe::OneHour,
            selector: UniverseSelector::Default,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Start,
    Help,
    Scan(ScanArgs),
}

/// Parse a chat message. `None` for plain text and unknown commands.
pub fn parse(text: &str, quote_asset: &str) -> Option<Result<Command, ScanError>> {
    let mut words = text.split_whitespace();
    let head = words.next()?.strip_prefix('/')?;
    // Group chats address commands as `/scan@SomeBot`.
    let name = head.split('@').next().unwrap_or(head).to_lowercase();
    let args: Vec<&str> = words.collect();

    match name.as_str() {
        "start" => Some(Ok(Command::Start)),
        "help" => Some(Ok(Command::Help)),
        "scan" => Some(parse_scan_args(&args, quote_asset).map(Command::Scan)),
        _ => None,
    }
}

fn parse_scan_args(args: &[&str], quote_asset: &str) -> Result<ScanArgs, ScanError> {
    let (symbol, timeframe, top) = match *args {
        [] => (None, None, None),
        [tf] => (None, Some(tf), None),
        [tf, top] => (None, Some(tf), Some(top)),
        [symbol, tf, top] => (Some(symbol), Some(tf), Some(top)),
        _ => return Err(ScanError::InvalidRequest(USAGE.into())),
    };

    let timeframe = match timeframe {
        Some(tf) => tf.parse::<Timeframe>()?,
        None => Timeframe::OneHour,
    };
    let selector = match top {
        Some(top) => parse_selector(top)?,
        None => UniverseSelector::Default,
    };
    let symbol = symbol
        .map(|s| Symbol::parse(s, quote_asset))
        .transpose()?;

    Ok(ScanArgs {
        symbol,
        timeframe,
        selector,
    })
}

fn parse_selector(top: &str) -> Result<UniverseSelector, ScanError> {
    if top.eq_ignore_ascii_case("full") {
        return Ok(UniverseSelector::Full);
    }
    match top.parse::<i64>() {
        Ok(n) if n > 0 => Ok(UniverseSelector::Top(n as usize)),
        _ => Err(ScanError::InvalidRequest(
            "Top must be a positive number or 'full'".into(),
        )),
    }
}

/// Acknowledgement sent before a manual scan starts.
pub fn ack_text(args: &ScanArgs, default_top: usize) -> String {
    let target = args
        .symbol
        .as_ref()
        .map(|s| s.to_string())
        .unwrap_or_else(|| "coins".to_string());
    let scope = match args.selector {
        UniverseSelector::Top(n) => format!(" (top {n} by market cap)"),
        UniverseSelector::Full => " (all coins)".to_string(),
        UniverseSelector::Default => format!(" (top {default_top} by market cap)"),
    };
    format!("Scanning volume anomalies for {target} on {}{scope}...", args.timeframe)
}

/// Reply to `/start` and `/help`.
pub fn welcome_text(default_top: usize, scheduled: &[Timeframe]) -> String {
    let schedule = if scheduled.is_empty() {
        "Scheduled scans are disabled.".to_string()
    } else {
        let tfs: Vec<&str> = scheduled.iter().map(|tf| tf.as_str()).collect();
        format!("Scanning volume anomalies ({}) every hour.", tfs.join(", "))
    };

    format!(
        "Welcome to the Volume Anomaly Scanner!\n\
         Commands:\n\
         /scan [symbol] [timeframe] [top] - Scan volume anomalies manually \
         (e.g., /scan 4h 100, /scan 4h full, or /scan BTCUSDT 4h full)\n\
         /help - Show this message\n\n\
         Default: Scans top {default_top} coins by market cap unless 'full' is specified.\n\
         {schedule}"
    )
}
