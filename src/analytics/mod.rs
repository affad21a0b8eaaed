//! View and engagement analytics
//!
//! Raw view events, likes and comments are turned into dense daily
//! timelines, categorical breakdowns (traffic source, device, country) and
//! read-completion statistics for a single post or for all posts of an
//! author.

pub mod breakdown;
pub mod clock;
pub mod ip_extractor;
pub mod models;
pub mod referrer;
pub mod service;
pub mod store;
pub mod timeline;

pub use breakdown::CategoryCount;
pub use clock::{Clock, FixedClock, SystemClock};
pub use ip_extractor::extract_client_ip;
pub use models::{
    InvalidWindow, MetricSeries, PostAnalytics, ReadTimeStats, TopPost, UserAnalytics, WindowDays,
};
pub use referrer::classify_referrer;
pub use service::{AnalyticsError, AnalyticsService, ViewReport};
pub use store::{AnalyticsStore, EventFilter};
pub use timeline::{build_timeline, TimelinePoint};
