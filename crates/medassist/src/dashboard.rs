//! Summary of the severity trend for the dashboard view.

use std::fmt;

/// Latest severity above this needs attention.
const STABLE_MAX: u32 = 2;

/// Widest bar drawn; longer series are scaled down to fit.
const BAR_WIDTH: u32 = 40;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    Stable,
    NeedsAttention,
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HealthStatus::Stable => f.write_str("Stable"),
            HealthStatus::NeedsAttention => f.write_str("Needs Attention"),
        }
    }
}

/// Figures derived from a non-empty trend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrendSummary {
    pub consultations: usize,
    pub latest: u32,
    pub status: HealthStatus,
    pub severity: Vec<u32>,
    pub cumulative: Vec<u32>,
}

impl TrendSummary {
    /// `None` when there is no data yet.
    pub fn from_trend(trend: &[u32]) -> Option<Self> {
        let latest = *trend.last()?;
        let cumulative = trend
            .iter()
            .scan(0u32, |total, &count| {
                *total = total.saturating_add(count);
                Some(*total)
            })
            .collect();
        Some(Self {
            consultations: trend.len(),
            latest,
            status: if latest <= STABLE_MAX {
                HealthStatus::Stable
            } else {
                HealthStatus::NeedsAttention
            },
            severity: trend.to_vec(),
            cumulative,
        })
    }
}

impl fmt::Display for TrendSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Total consultations: {}", self.consultations)?;
        writeln!(f, "Latest severity:     {}", self.latest)?;
        writeln!(f, "Health status:       {}", self.status)?;
        writeln!(f)?;
        writeln!(f, "Symptom severity over time")?;
        write_series(f, &self.severity)?;
        writeln!(f)?;
        writeln!(f, "Cumulative health load")?;
        write_series(f, &self.cumulative)
    }
}

fn write_series(f: &mut fmt::Formatter<'_>, series: &[u32]) -> fmt::Result {
    let max = series.iter().copied().max().unwrap_or(0);
    for (i, &value) in series.iter().enumerate() {
        let bar = "#".repeat(bar_len(value, max));
        writeln!(f, "{:>4} | {} {}", i + 1, bar, value)?;
    }
    Ok(())
}

/// Bar length for `value` in a series peaking at `max`. Values are drawn 1:1
/// until the peak exceeds [`BAR_WIDTH`]; non-zero values keep at least one mark.
fn bar_len(value: u32, max: u32) -> usize {
    if max <= BAR_WIDTH {
        return value as usize;
    }
    let scaled = u64::from(value) * u64::from(BAR_WIDTH) / u64::from(max);
    if value > 0 { scaled.max(1) as usize } else { 0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_trend_has_no_summary() {
        assert!(TrendSummary::from_trend(&[]).is_none());
    }

    #[test]
    fn summary_figures() {
        let summary = TrendSummary::from_trend(&[2, 0, 3]).unwrap();
        assert_eq!(summary.consultations, 3);
        assert_eq!(summary.latest, 3);
        assert_eq!(summary.status, HealthStatus::NeedsAttention);
        assert_eq!(summary.cumulative, vec![2, 2, 5]);
    }

    #[test]
    fn low_latest_is_stable() {
        let summary = TrendSummary::from_trend(&[5, 2]).unwrap();
        assert_eq!(summary.status, HealthStatus::Stable);
    }

    #[test]
    fn renders_one_row_per_visit() {
        let rendered = TrendSummary::from_trend(&[1, 3]).unwrap().to_string();
        assert!(rendered.contains("Health status:       Needs Attention"));
        assert!(rendered.contains("   2 | ### 3"));
        assert!(rendered.contains("   2 | #### 4"));
    }

    #[test]
    fn bars_are_scaled_to_fixed_width() {
        assert_eq!(bar_len(3, 10), 3);
        assert_eq!(bar_len(80, 80), BAR_WIDTH as usize);
        assert_eq!(bar_len(40, 80), 20);
        assert_eq!(bar_len(1, 4_000_000_000), 1);
        assert_eq!(bar_len(0, 4_000_000_000), 0);
    }

    #[test]
    fn huge_values_render_bounded_rows() {
        let rendered = TrendSummary::from_trend(&[4_000_000_000, 1])
            .unwrap()
            .to_string();
        let widest = rendered
            .lines()
            .filter_map(|line| line.split_once(" | "))
            .map(|(_, rest)| rest.chars().take_while(|&c| c == '#').count())
            .max()
            .unwrap();
        assert_eq!(widest, BAR_WIDTH as usize);
    }
}
