//! Human-readable formatting for dwell durations.

/// Format a dwell time in minutes as `"Xh Ym"` (or just `"Ym"` under
/// an hour). Negative or non-finite inputs render as `"0m"`.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn format_dwell(minutes: f64) -> String {
    if !minutes.is_finite() || minutes <= 0.0 {
        return "0m".to_owned();
    }

    let total = minutes.round() as u64;
    let hours = total / 60;
    let mins = total % 60;

    if hours > 0 {
        format!("{hours}h {mins}m")
    } else {
        format!("{mins}m")
    }
}
