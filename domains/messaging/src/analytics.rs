//! Derived statistics, computed from the ledger on every call

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::entities::{SentimentLabel, SentimentRecord};
use crate::repository::MessageCounts;

/// How many sentiment records a summary looks at
pub const SENTIMENT_WINDOW: i64 = 50;

/// Share a label needs, strictly exceeded, to be the overall sentiment
const DOMINANT_SHARE: f64 = 0.4;

/// Records compared at each end when computing the trend
const TREND_SPAN: usize = 5;

/// Delivery statistics for one phone, or across every phone when `phone` is `None`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeadStats {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub total_messages: i64,
    /// Outbound messages
    pub sent_count: i64,
    /// Inbound messages
    pub received_count: i64,
    /// Status delivered or read
    pub delivered_count: i64,
    pub read_count: i64,
    pub failed_count: i64,
    /// `None` when nothing was sent
    pub delivery_rate_percent: Option<f64>,
    pub read_rate_percent: Option<f64>,
    pub last_activity: Option<DateTime<Utc>>,
}

/// Percentage rounded to two decimals, `None` for an empty denominator
pub fn rate_percent(part: i64, whole: i64) -> Option<f64> {
    if whole <= 0 {
        return None;
    }
    let percent = part as f64 / whole as f64 * 100.0;
    Some((percent * 100.0).round() / 100.0)
}

impl LeadStats {
    pub fn from_counts(phone: Option<String>, counts: &MessageCounts) -> Self {
        LeadStats {
            phone,
            total_messages: counts.total_messages,
            sent_count: counts.outbound_count,
            received_count: counts.inbound_count,
            delivered_count: counts.delivered_count,
            read_count: counts.read_count,
            failed_count: counts.failed_count,
            delivery_rate_percent: rate_percent(counts.delivered_count, counts.outbound_count),
            read_rate_percent: rate_percent(counts.read_count, counts.outbound_count),
            last_activity: counts.last_activity,
        }
    }

    /// All-zero entry for a phone with no ledger rows
    pub fn empty(phone: &str) -> Self {
        Self::from_counts(Some(phone.to_string()), &MessageCounts::default())
    }
}

/// Sum per-phone counters into one
pub fn total_counts(rows: &[MessageCounts]) -> MessageCounts {
    rows.iter().fold(MessageCounts::default(), |mut acc, row| {
        acc.total_messages += row.total_messages;
        acc.outbound_count += row.outbound_count;
        acc.inbound_count += row.inbound_count;
        acc.delivered_count += row.delivered_count;
        acc.read_count += row.read_count;
        acc.failed_count += row.failed_count;
        acc.last_activity = acc.last_activity.max(row.last_activity);
        acc
    })
}

/// Stats for every phone plus the overall entry
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsReport {
    pub leads: Vec<LeadStats>,
    pub overall: LeadStats,
}

impl StatsReport {
    pub fn from_rows(rows: &[MessageCounts]) -> Self {
        StatsReport {
            leads: rows
                .iter()
                .map(|row| LeadStats::from_counts(Some(row.phone.clone()), row))
                .collect(),
            overall: LeadStats::from_counts(None, &total_counts(rows)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SentimentTrend {
    Improving,
    Declining,
    Stable,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SentimentCounts {
    pub positive: usize,
    pub negative: usize,
    pub neutral: usize,
    pub mixed: usize,
}

impl SentimentCounts {
    fn add(&mut self, label: SentimentLabel) {
        match label {
            SentimentLabel::Positive => self.positive += 1,
            SentimentLabel::Negative => self.negative += 1,
            SentimentLabel::Neutral => self.neutral += 1,
            SentimentLabel::Mixed => self.mixed += 1,
        }
    }

    fn get(&self, label: SentimentLabel) -> usize {
        match label {
            SentimentLabel::Positive => self.positive,
            SentimentLabel::Negative => self.negative,
            SentimentLabel::Neutral => self.neutral,
            SentimentLabel::Mixed => self.mixed,
        }
    }

    fn total(&self) -> usize {
        self.positive + self.negative + self.neutral + self.mixed
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SentimentSummary {
    pub phone: String,
    pub sample_size: usize,
    pub counts: SentimentCounts,
    pub overall: SentimentLabel,
    pub most_recent: Option<SentimentLabel>,
    pub trend: SentimentTrend,
}

impl SentimentSummary {
    /// Summarize records ordered newest first
    pub fn from_records(phone: &str, records: &[SentimentRecord]) -> Self {
        let mut counts = SentimentCounts::default();
        for record in records {
            counts.add(record.label);
        }

        SentimentSummary {
            phone: phone.to_string(),
            sample_size: records.len(),
            counts,
            overall: overall_label(&counts),
            most_recent: records.first().map(|r| r.label),
            trend: trend(records),
        }
    }
}

fn overall_label(counts: &SentimentCounts) -> SentimentLabel {
    let total = counts.total();
    if total == 0 {
        return SentimentLabel::Neutral;
    }
    // First label wins ties
    let mut leader = SentimentLabel::ALL[0];
    for label in SentimentLabel::ALL {
        if counts.get(label) > counts.get(leader) {
            leader = label;
        }
    }
    if counts.get(leader) as f64 / total as f64 > DOMINANT_SHARE {
        leader
    } else {
        SentimentLabel::Mixed
    }
}

fn trend(records: &[SentimentRecord]) -> SentimentTrend {
    if records.len() <= 2 {
        return SentimentTrend::Stable;
    }
    let positives = |slice: &[SentimentRecord]| {
        slice
            .iter()
            .filter(|r| r.label == SentimentLabel::Positive)
            .count()
    };
    let recent = positives(&records[..TREND_SPAN.min(records.len())]);
    let older = positives(&records[records.len().saturating_sub(TREND_SPAN)..]);

    match recent.cmp(&older) {
        std::cmp::Ordering::Greater => SentimentTrend::Improving,
        std::cmp::Ordering::Less => SentimentTrend::Declining,
        std::cmp::Ordering::Equal => SentimentTrend::Stable,
    }
}
