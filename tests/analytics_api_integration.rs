//! Integration tests for the analytics endpoints
//!
//! Views and read progress are recorded through the public endpoints and the
//! aggregated reports are read back as the post's author.

mod common;

use axum::http::StatusCode;
use common::{json_body, request, spawn_app, test_config, TestApp};
use quill::config::AuthMode;
use quill::storage::Storage;
use serde_json::{json, Value};

async fn publish(app: &TestApp, author: i64, title: &str) -> Value {
    let category = match app.storage.list_categories().await.unwrap().first() {
        Some(existing) => existing.id,
        None => app.create_category("Technology").await,
    };
    json_body(
        app.send(request(
            "POST",
            "/api/posts",
            Some(author),
            Some(json!({
                "title": title,
                "content": "body",
                "excerpt": "x",
                "category_id": category
            })),
        ))
        .await,
    )
    .await
}

fn count_of(breakdown: &Value, key: &str) -> Option<u64> {
    breakdown
        .as_array()
        .unwrap()
        .iter()
        .find(|entry| entry["key"] == key)
        .and_then(|entry| entry["count"].as_u64())
}

fn timeline_sum(timeline: &Value) -> u64 {
    timeline
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["count"].as_u64().unwrap())
        .sum()
}

#[tokio::test]
async fn test_post_analytics_end_to_end() {
    let app = spawn_app(test_config(AuthMode::None)).await;
    let author = app.create_user("Ada").await;
    let reader = app.create_user("Bob").await;
    publish(&app, author, "Tracked").await;

    let hn = "/api/analytics/view/tracked?referrer=https%3A%2F%2Fnews.ycombinator.com%2Fitem&device=mobile&country=US";
    for _ in 0..3 {
        let response = app.send(request("POST", hn, None, None)).await;
        assert_eq!(response.status(), StatusCode::OK);
    }
    let response = app
        .send(request("POST", "/api/analytics/view/tracked", Some(reader), None))
        .await;
    assert_eq!(
        json_body(response).await["message"],
        "View recorded successfully"
    );

    let response = app
        .send(request(
            "POST",
            "/api/analytics/read-progress/tracked?read_percentage=90",
            Some(reader),
            None,
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    app.send(request("POST", "/api/posts/tracked/like", Some(reader), None))
        .await;

    let response = app
        .send(request(
            "GET",
            "/api/analytics/posts/tracked?days=7",
            Some(author),
            None,
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let analytics = json_body(response).await;

    assert_eq!(analytics["views"]["total"], 4);
    assert_eq!(analytics["views"]["timeline"].as_array().unwrap().len(), 8);
    assert_eq!(timeline_sum(&analytics["views"]["timeline"]), 4);
    assert_eq!(analytics["likes"]["total"], 1);
    assert_eq!(analytics["comments"]["total"], 0);

    assert_eq!(count_of(&analytics["sources"], "news.ycombinator.com"), Some(3));
    assert_eq!(count_of(&analytics["sources"], "direct"), Some(1));
    assert_eq!(count_of(&analytics["devices"], "mobile"), Some(3));
    assert_eq!(count_of(&analytics["devices"], "unknown"), Some(1));
    // Views without a country are dropped from the country breakdown
    assert_eq!(analytics["countries"], json!([{"key": "US", "count": 3}]));

    assert_eq!(analytics["read_time"]["average_percentage"], 90.0);
    assert_eq!(analytics["read_time"]["completion_rate"], 100.0);
}

#[tokio::test]
async fn test_post_analytics_access_rules() {
    let app = spawn_app(test_config(AuthMode::None)).await;
    let author = app.create_user("Ada").await;
    let other = app.create_user("Bob").await;
    publish(&app, author, "Private Stats").await;

    let uri = "/api/analytics/posts/private-stats";
    let response = app.send(request("GET", uri, None, None)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app.send(request("GET", uri, Some(other), None)).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .send(request("GET", "/api/analytics/posts/nope", Some(author), None))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    for days in ["0", "366", "-3"] {
        let response = app
            .send(request("GET", &format!("{uri}?days={days}"), Some(author), None))
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "days={days}");
    }

    // Default window is 30 days, inclusive of both ends
    let analytics = json_body(app.send(request("GET", uri, Some(author), None)).await).await;
    assert_eq!(analytics["views"]["timeline"].as_array().unwrap().len(), 31);
    assert_eq!(analytics["views"]["total"], 0);
    assert_eq!(analytics["read_time"]["average_percentage"], 0.0);
    assert_eq!(analytics["sources"], json!([]));
}

#[tokio::test]
async fn test_read_progress_errors() {
    let app = spawn_app(test_config(AuthMode::None)).await;
    let author = app.create_user("Ada").await;
    publish(&app, author, "Unread").await;

    let response = app
        .send(request(
            "POST",
            "/api/analytics/read-progress/unread?read_percentage=50",
            None,
            None,
        ))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .send(request(
            "POST",
            "/api/analytics/read-progress/unread?read_percentage=101",
            None,
            None,
        ))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .send(request("POST", "/api/analytics/view/ghost", None, None))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_user_analytics() {
    let app = spawn_app(test_config(AuthMode::None)).await;
    let author = app.create_user("Ada").await;
    let newcomer = app.create_user("Bob").await;

    publish(&app, author, "Quiet").await;
    publish(&app, author, "Popular").await;
    for _ in 0..2 {
        app.send(request("POST", "/api/analytics/view/popular", None, None))
            .await;
    }
    app.send(request("POST", "/api/analytics/view/quiet", None, None))
        .await;

    let response = app
        .send(request("GET", "/api/analytics/user", Some(author), None))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let analytics = json_body(response).await;

    assert_eq!(analytics["total_posts"], 2);
    assert_eq!(analytics["total_views"], 3);
    assert_eq!(analytics["views_timeline"].as_array().unwrap().len(), 31);
    assert_eq!(timeline_sum(&analytics["posts_timeline"]), 2);

    let top = analytics["top_posts"].as_array().unwrap();
    assert_eq!(top[0]["slug"], "popular");
    assert_eq!(top[0]["views"], 2);
    assert_eq!(top[1]["slug"], "quiet");

    // An author without posts gets an empty report
    let empty = json_body(
        app.send(request("GET", "/api/analytics/user", Some(newcomer), None))
            .await,
    )
    .await;
    assert_eq!(empty["total_posts"], 0);
    assert_eq!(empty["top_posts"], json!([]));
    assert_eq!(empty["views_timeline"], json!([]));

    let response = app
        .send(request("GET", "/api/analytics/user?days=400", Some(author), None))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
