//! Dense per-day timelines

use chrono::{DateTime, NaiveDate};
use serde::Serialize;

use crate::models::{Comment, Like, Post, ViewEvent};

/// Count of records on one calendar day (UTC)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimelinePoint {
    pub date: NaiveDate,
    pub count: u64,
}

/// Records carrying a creation timestamp in Unix seconds
pub trait Dated {
    fn created_at(&self) -> i64;
}

impl Dated for ViewEvent {
    fn created_at(&self) -> i64 {
        self.created_at
    }
}

impl Dated for Like {
    fn created_at(&self) -> i64 {
        self.created_at
    }
}

impl Dated for Comment {
    fn created_at(&self) -> i64 {
        self.created_at
    }
}

impl Dated for Post {
    fn created_at(&self) -> i64 {
        self.created_at
    }
}

/// Build a timeline over `[start, end]` using each record's creation time.
pub fn daily_timeline<T: Dated>(records: &[T], start: NaiveDate, end: NaiveDate) -> Vec<TimelinePoint> {
    build_timeline(records, start, end, |r| Some(r.created_at()))
}

/// Build a gap-filled timeline with one point per day in `[start, end]`.
///
/// `date_of` selects the timestamp (Unix seconds) to bucket by. Records whose
/// timestamp is absent, invalid, or outside the range are ignored. Returns an
/// empty timeline when `start > end`.
pub fn build_timeline<T, F>(
    records: &[T],
    start: NaiveDate,
    end: NaiveDate,
    date_of: F,
) -> Vec<TimelinePoint>
where
    F: Fn(&T) -> Option<i64>,
{
    if start > end {
        return Vec::new();
    }

    let span = (end - start).num_days() as usize + 1;
    let mut counts = vec![0u64; span];

    for record in records {
        let Some(day) = date_of(record)
            .and_then(|ts| DateTime::from_timestamp(ts, 0))
            .map(|dt| dt.date_naive())
        else {
            continue;
        };

        if day < start || day > end {
            continue;
        }
        counts[(day - start).num_days() as usize] += 1;
    }

    start
        .iter_days()
        .zip(counts)
        .map(|(date, count)| TimelinePoint { date, count })
        .collect()
}
