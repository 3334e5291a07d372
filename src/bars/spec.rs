//! Bar-spec grammar: `<family>_<param>`.
//!
//! `family in {tick, volume, dollar, time, tib, vib, dib, trb, vrb, drb}`.
//! Time param suffixes: `s, m, h, d`. Unparseable specs are fatal input
//! errors (exit code 2 at the command surface).

use rust_decimal::Decimal;

use crate::error::ArcanaError;

/// A parsed, validated bar specification.
#[derive(Debug, Clone, PartialEq)]
pub enum BarSpec {
    Tick { n: u64 },
    Volume { v: Decimal },
    Dollar { d: Decimal },
    /// Fixed clock period, in whole seconds.
    Time { period_secs: i64 },
    Tib { window: u32 },
    Vib { window: u32 },
    Dib { window: u32 },
    Trb { window: u32 },
    Vrb { window: u32 },
    Drb { window: u32 },
}

impl BarSpec {
    /// Canonical `bar_type` string, matching the table-naming identifier
    /// used by the store.
    pub fn bar_type(&self) -> String {
        match self {
            BarSpec::Tick { n } => format!("tick_{n}"),
            BarSpec::Volume { v } => format!("volume_{v}"),
            BarSpec::Dollar { d } => format!("dollar_{d}"),
            BarSpec::Time { period_secs } => format!("time_{}", format_time_param(*period_secs)),
            BarSpec::Tib { window } => format!("tib_{window}"),
            BarSpec::Vib { window } => format!("vib_{window}"),
            BarSpec::Dib { window } => format!("dib_{window}"),
            BarSpec::Trb { window } => format!("trb_{window}"),
            BarSpec::Vrb { window } => format!("vrb_{window}"),
            BarSpec::Drb { window } => format!("drb_{window}"),
        }
    }
}

fn format_time_param(period_secs: i64) -> String {
    if period_secs % 86400 == 0 {
        format!("{}d", period_secs / 86400)
    } else if period_secs % 3600 == 0 {
        format!("{}h", period_secs / 3600)
    } else if period_secs % 60 == 0 {
        format!("{}m", period_secs / 60)
    } else {
        format!("{period_secs}s")
    }
}

fn parse_time_param(param: &str) -> Result<i64, ArcanaError> {
    let (digits, suffix) = param.split_at(param.len().saturating_sub(1));
    let n: i64 = digits
        .parse()
        .map_err(|_| ArcanaError::Input(format!("invalid time bar param '{param}'")))?;
    let multiplier = match suffix {
        "s" => 1,
        "m" => 60,
        "h" => 3600,
        "d" => 86400,
        _ => return Err(ArcanaError::Input(format!("invalid time bar suffix in '{param}'"))),
    };
    Ok(n * multiplier)
}

/// Parse a `<family>_<param>` spec string. Accepts decimal params with
/// embedded underscores by splitting only on the first `_`.
pub fn parse_bar_spec(spec: &str) -> Result<BarSpec, ArcanaError> {
    let (family, param) = spec
        .split_once('_')
        .ok_or_else(|| ArcanaError::Input(format!("malformed bar spec '{spec}'")))?;

    let bad = |msg: &str| ArcanaError::Input(format!("invalid bar spec '{spec}': {msg}"));

    match family {
        "tick" => Ok(BarSpec::Tick {
            n: param.parse().map_err(|_| bad("expected an integer tick count"))?,
        }),
        "volume" => Ok(BarSpec::Volume {
            v: param.parse().map_err(|_| bad("expected a decimal volume threshold"))?,
        }),
        "dollar" => Ok(BarSpec::Dollar {
            d: param.parse().map_err(|_| bad("expected a decimal dollar threshold"))?,
        }),
        "time" => Ok(BarSpec::Time {
            period_secs: parse_time_param(param).map_err(|_| bad("expected e.g. 30s, 5m, 1h, 1d"))?,
        }),
        "tib" => Ok(BarSpec::Tib {
            window: param.parse().map_err(|_| bad("expected an integer EWMA window"))?,
        }),
        "vib" => Ok(BarSpec::Vib {
            window: param.parse().map_err(|_| bad("expected an integer EWMA window"))?,
        }),
        "dib" => Ok(BarSpec::Dib {
            window: param.parse().map_err(|_| bad("expected an integer EWMA window"))?,
        }),
        "trb" => Ok(BarSpec::Trb {
            window: param.parse().map_err(|_| bad("expected an integer EWMA window"))?,
        }),
        "vrb" => Ok(BarSpec::Vrb {
            window: param.parse().map_err(|_| bad("expected an integer EWMA window"))?,
        }),
        "drb" => Ok(BarSpec::Drb {
            window: param.parse().map_err(|_| bad("expected an integer EWMA window"))?,
        }),
        other => Err(bad(&format!("unknown family '{other}'"))),
    }
}
