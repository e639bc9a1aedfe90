use serde_json::json;

use super::result_document;

/// Encoded `BacktestResult` packet with one line series.
#[must_use]
pub fn backtest_packet(chart: &str, series: &str, points: &[(i64, i64)], progress: f64) -> Vec<u8> {
    json!({
        "eType": "BacktestResult",
        "oResults": result_document(chart, series, points),
        "dProgress": progress,
        "sName": "Smooth Blue Owl",
        "sProjectName": "Fixture Project",
    })
    .to_string()
    .into_bytes()
}

/// Encoded `LiveResult` packet with one line series.
#[must_use]
pub fn live_packet(chart: &str, series: &str, points: &[(i64, i64)]) -> Vec<u8> {
    json!({
        "eType": "LiveResult",
        "oResults": result_document(chart, series, points),
    })
    .to_string()
    .into_bytes()
}

/// Encoded `Log` packet.
#[must_use]
pub fn log_packet(message: &str) -> Vec<u8> {
    json!({ "eType": "Log", "sMessage": message }).to_string().into_bytes()
}

/// Encoded `Debug` packet.
#[must_use]
pub fn debug_packet(message: &str) -> Vec<u8> {
    json!({ "eType": "Debug", "sMessage": message }).to_string().into_bytes()
}

/// Packet of a type the monitor does not handle.
#[must_use]
pub fn unknown_packet() -> Vec<u8> {
    json!({ "eType": "SecurityTypes", "aTypes": [] }).to_string().into_bytes()
}
