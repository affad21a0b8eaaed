//! Analytics report types

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use thiserror::Error;

use super::breakdown::CategoryCount;
use super::timeline::TimelinePoint;
use crate::models::ViewEvent;

/// Read percentage at or above which a view counts as a completed read
pub const COMPLETION_THRESHOLD: i64 = 80;

pub const MAX_WINDOW_DAYS: u32 = 365;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("window must be between 1 and 365 days, got {0}")]
pub struct InvalidWindow(pub i64);

/// Number of days covered by an analytics report, within `1..=365`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowDays(u32);

impl WindowDays {
    pub const DEFAULT: WindowDays = WindowDays(30);

    pub fn get(self) -> u32 {
        self.0
    }

    /// The window `[now - days, now]`
    pub fn range_ending_at(self, now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        (now - Duration::days(i64::from(self.0)), now)
    }
}

impl TryFrom<i64> for WindowDays {
    type Error = InvalidWindow;

    fn try_from(days: i64) -> Result<Self, Self::Error> {
        if (1..=i64::from(MAX_WINDOW_DAYS)).contains(&days) {
            Ok(WindowDays(days as u32))
        } else {
            Err(InvalidWindow(days))
        }
    }
}

impl Default for WindowDays {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Total and daily series of one engagement kind
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetricSeries {
    pub total: u64,
    pub timeline: Vec<TimelinePoint>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ReadTimeStats {
    pub average_percentage: f64,
    pub completion_rate: f64,
}

impl ReadTimeStats {
    /// Stats over the events that received a read-progress report. Events never
    /// reported are excluded from both numerator and denominator.
    pub fn from_events(events: &[ViewEvent]) -> Self {
        let reported: Vec<i64> = events.iter().filter_map(|e| e.read_percentage).collect();
        if reported.is_empty() {
            return Self::default();
        }

        let n = reported.len() as f64;
        let sum: i64 = reported.iter().sum();
        let completed = reported
            .iter()
            .filter(|&&p| p >= COMPLETION_THRESHOLD)
            .count();

        Self {
            average_percentage: sum as f64 / n,
            completion_rate: completed as f64 / n * 100.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostAnalytics {
    pub views: MetricSeries,
    pub likes: MetricSeries,
    pub comments: MetricSeries,
    pub sources: Vec<CategoryCount>,
    pub devices: Vec<CategoryCount>,
    pub countries: Vec<CategoryCount>,
    pub read_time: ReadTimeStats,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopPost {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub views: u64,
    pub likes: u64,
    pub comments: u64,
    /// Falls back to the creation time for posts never published
    pub published_at: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UserAnalytics {
    pub total_posts: u64,
    pub total_views: u64,
    pub total_likes: u64,
    pub total_comments: u64,
    pub posts_timeline: Vec<TimelinePoint>,
    pub views_timeline: Vec<TimelinePoint>,
    pub likes_timeline: Vec<TimelinePoint>,
    pub comments_timeline: Vec<TimelinePoint>,
    pub top_posts: Vec<TopPost>,
}
