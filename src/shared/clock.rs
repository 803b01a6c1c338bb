use chrono::{SecondsFormat, Utc};

pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn compact_utc_timestamp() -> String {
    Utc::now().format("%Y%m%dT%H%M%SZ").to_string()
}
