use crate::forecast::time_slot::parse_slot_start;
use crate::ridership::Sample;
use std::collections::HashMap;
use time::Time;

/// Label of the per-month aggregate rows carried over from the workbook.
pub const TOTAL_LABEL: &str = "TOTAL";

/// Mean riders (entries + exits) across every sample sharing one time-slot label.
#[derive(Debug, Clone, PartialEq)]
pub struct HourlyAverage {
    pub label: String,
    pub slot_start: Time,
    pub mean_riders: f64,
}

/// Average samples per time-slot label, sorted by slot start.
///
/// Samples without a label or labelled `TOTAL` (any case) are skipped.
pub fn hourly_averages(samples: &[Sample]) -> Vec<HourlyAverage> {
    let mut totals: HashMap<&str, (f64, u32)> = HashMap::new();
    for sample in samples {
        let Some(label) = sample.time.as_deref() else {
            continue;
        };
        if label.trim().eq_ignore_ascii_case(TOTAL_LABEL) {
            continue;
        }
        let entry = totals.entry(label).or_insert((0.0, 0));
        entry.0 += sample.total_riders();
        entry.1 += 1;
    }

    let mut averages: Vec<HourlyAverage> = totals
        .into_iter()
        .map(|(label, (sum, count))| HourlyAverage {
            label: label.to_string(),
            slot_start: parse_slot_start(label),
            mean_riders: sum / f64::from(count),
        })
        .collect();
    averages.sort_by(|a, b| {
        a.slot_start
            .cmp(&b.slot_start)
            .then_with(|| a.label.cmp(&b.label))
    });
    averages
}

/// Trailing moving average: element `i` averages `values[i + 1 - window ..= i]`,
/// truncated at the start of the series.
pub fn smooth(values: &[f64], window: usize) -> Vec<f64> {
    if window == 0 || values.len() < window {
        return values.to_vec();
    }
    (0..values.len())
        .map(|i| {
            let start = (i + 1).saturating_sub(window);
            let slice = &values[start..=i];
            slice.iter().sum::<f64>() / slice.len() as f64
        })
        .collect()
}

/// `(y1, y2, y3)` ending at `index`; missing predecessors collapse onto the
/// earliest value available.
pub fn trailing_triple(values: &[f64], index: usize) -> (f64, f64, f64) {
    let start = index.saturating_sub(2);
    let recent = &values[start..=index];
    let len = recent.len();
    (
        recent[len.saturating_sub(3)],
        recent[len.saturating_sub(2)],
        recent[len - 1],
    )
}

pub fn min_max(values: &[f64]) -> Option<(f64, f64)> {
    values.iter().fold(None, |acc, &v| match acc {
        None => Some((v, v)),
        Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
    })
}
