//! Post and author analytics assembled from raw engagement records
//!
//! The service reads already-filtered records from an [`AnalyticsStore`] and
//! aggregates them in memory. It never touches the live counters on posts
//! except through `record_view`, so the totals reported here cover only the
//! requested window and may differ from `views_count` / `likes_count` /
//! `comments_count` on the post itself.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use super::breakdown::{breakdown, country_key, device_key, source_key};
use super::clock::Clock;
use super::models::{
    MetricSeries, PostAnalytics, ReadTimeStats, TopPost, UserAnalytics, WindowDays,
};
use super::store::{AnalyticsStore, EventFilter};
use super::timeline::{build_timeline, daily_timeline};
use crate::models::{NewViewEvent, ViewEvent};
use crate::storage::StorageError;

/// Number of posts listed in an author's `top_posts`
pub const TOP_POSTS_LIMIT: usize = 5;

#[derive(Debug, Error)]
pub enum AnalyticsError {
    #[error("post not found")]
    NotFound,
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// A page view as reported by a client
#[derive(Debug, Clone)]
pub struct ViewReport {
    pub post_id: i64,
    pub user_id: Option<i64>,
    pub ip_address: String,
    pub user_agent: String,
    pub referrer: Option<String>,
    pub country: Option<String>,
    pub device: Option<String>,
}

pub struct AnalyticsService {
    store: Arc<dyn AnalyticsStore>,
    clock: Arc<dyn Clock>,
}

impl AnalyticsService {
    pub fn new(store: Arc<dyn AnalyticsStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Append a view event stamped with the current time
    pub async fn record_view(&self, report: ViewReport) -> Result<ViewEvent, AnalyticsError> {
        let event = NewViewEvent {
            post_id: report.post_id,
            user_id: report.user_id,
            ip_address: report.ip_address,
            user_agent: report.user_agent,
            referrer: report.referrer,
            country: report.country,
            device: report.device,
            created_at: self.clock.now().timestamp(),
        };
        let stored = self.store.insert_view_event(&event).await?;
        debug!(post_id = stored.post_id, view_id = stored.id, "recorded view");
        Ok(stored)
    }

    /// Attach a read percentage to the visitor's most recent view of the post
    pub async fn record_read_progress(
        &self,
        post_id: i64,
        user_id: Option<i64>,
        ip_address: &str,
        read_percentage: u8,
    ) -> Result<(), AnalyticsError> {
        let pct = i64::from(read_percentage.min(100));
        let updated = self
            .store
            .update_latest_read_percentage(post_id, user_id, ip_address, pct)
            .await?;
        if updated {
            Ok(())
        } else {
            Err(AnalyticsError::NotFound)
        }
    }

    pub async fn get_post_analytics(
        &self,
        post_id: i64,
        window: WindowDays,
    ) -> Result<PostAnalytics, AnalyticsError> {
        if self.store.find_post_by_id(post_id).await?.is_none() {
            return Err(AnalyticsError::NotFound);
        }

        let (start, end) = window.range_ending_at(self.clock.now());
        let filter = EventFilter::for_post(post_id, start.timestamp(), end.timestamp());

        let views = self.store.find_view_events(&filter).await?;
        let likes = self.store.find_likes(&filter).await?;
        let comments = self.store.find_comments(&filter).await?;

        debug!(
            post_id,
            days = window.get(),
            views = views.len(),
            likes = likes.len(),
            comments = comments.len(),
            "aggregating post analytics"
        );

        let (first_day, last_day) = (start.date_naive(), end.date_naive());

        Ok(PostAnalytics {
            views: MetricSeries {
                total: views.len() as u64,
                timeline: daily_timeline(&views, first_day, last_day),
            },
            likes: MetricSeries {
                total: likes.len() as u64,
                timeline: daily_timeline(&likes, first_day, last_day),
            },
            comments: MetricSeries {
                total: comments.len() as u64,
                timeline: daily_timeline(&comments, first_day, last_day),
            },
            sources: breakdown(&views, source_key),
            devices: breakdown(&views, device_key),
            countries: breakdown(&views, country_key),
            read_time: ReadTimeStats::from_events(&views),
        })
    }

    pub async fn get_user_analytics(
        &self,
        author_id: i64,
        window: WindowDays,
    ) -> Result<UserAnalytics, AnalyticsError> {
        let posts = self.store.find_posts_by_author(author_id).await?;
        if posts.is_empty() {
            return Ok(UserAnalytics::default());
        }

        let (start, end) = window.range_ending_at(self.clock.now());
        let filter = EventFilter {
            post_ids: posts.iter().map(|p| p.id).collect(),
            start: start.timestamp(),
            end: end.timestamp(),
        };

        let views = self.store.find_view_events(&filter).await?;
        let likes = self.store.find_likes(&filter).await?;
        let comments = self.store.find_comments(&filter).await?;

        debug!(
            author_id,
            posts = posts.len(),
            days = window.get(),
            "aggregating user analytics"
        );

        let (first_day, last_day) = (start.date_naive(), end.date_naive());

        let view_counts = count_by_post(views.iter().map(|v| v.post_id));
        let like_counts = count_by_post(likes.iter().map(|l| l.post_id));
        let comment_counts = count_by_post(comments.iter().map(|c| c.post_id));

        let mut ranked: Vec<TopPost> = posts
            .iter()
            .map(|post| TopPost {
                id: post.id,
                title: post.title.clone(),
                slug: post.slug.clone(),
                views: view_counts.get(&post.id).copied().unwrap_or(0),
                likes: like_counts.get(&post.id).copied().unwrap_or(0),
                comments: comment_counts.get(&post.id).copied().unwrap_or(0),
                published_at: post.published_at.unwrap_or(post.created_at),
            })
            .collect();
        // Stable: equal view counts keep retrieval order.
        ranked.sort_by(|a, b| b.views.cmp(&a.views));
        ranked.truncate(TOP_POSTS_LIMIT);

        Ok(UserAnalytics {
            total_posts: posts.len() as u64,
            total_views: views.len() as u64,
            total_likes: likes.len() as u64,
            total_comments: comments.len() as u64,
            posts_timeline: build_timeline(&posts, first_day, last_day, |p| p.published_at),
            views_timeline: daily_timeline(&views, first_day, last_day),
            likes_timeline: daily_timeline(&likes, first_day, last_day),
            comments_timeline: daily_timeline(&comments, first_day, last_day),
            top_posts: ranked,
        })
    }
}

fn count_by_post(post_ids: impl Iterator<Item = i64>) -> HashMap<i64, u64> {
    let mut counts = HashMap::new();
    for id in post_ids {
        *counts.entry(id).or_insert(0) += 1;
    }
    counts
}
