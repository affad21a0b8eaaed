use crate::analytics::{AnalyticsStore, EventFilter};
use crate::models::{
    Category, Comment, CreatePostRequest, Credentials, Like, LikeOutcome, NewUser, NewViewEvent,
    Post, PostFilter, PostSummary, SortOrder, UpdateUserRequest, User, UserComment, ViewEvent,
};
use crate::storage::{PostChanges, Storage, StorageError, StorageResult};
use anyhow::Result;
use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use std::sync::Arc;

const POST_COLUMNS: &str = "id, author_id, category_id, title, slug, content, excerpt, cover_image, \
     published, views_count, likes_count, comments_count, published_at, created_at, updated_at";

const USER_COLUMNS: &str = "id, name, email, bio, avatar, created_at";

const VIEW_COLUMNS: &str = "id, post_id, user_id, ip_address, user_agent, referrer, country, device, \
     read_percentage, created_at";

fn now_secs() -> i64 {
    chrono::Utc::now().timestamp()
}

pub struct SqliteStorage {
    pool: Arc<SqlitePool>,
}

impl SqliteStorage {
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self {
            pool: Arc::new(pool),
        })
    }

    async fn insert_user(&self, user: &NewUser, password_hash: Option<&str>) -> StorageResult<User> {
        let created = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (name, email, bio, avatar, password_hash, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.bio)
        .bind(&user.avatar)
        .bind(password_hash)
        .bind(now_secs())
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(created)
    }

    async fn replace_tags(
        tx: &mut sqlx::Transaction<'_, Sqlite>,
        post_id: i64,
        tags: &[String],
    ) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM post_tags WHERE post_id = ?")
            .bind(post_id)
            .execute(&mut **tx)
            .await?;

        for tag in tags.iter().map(|t| t.trim()).filter(|t| !t.is_empty()) {
            sqlx::query("INSERT OR IGNORE INTO post_tags (post_id, tag) VALUES (?, ?)")
                .bind(post_id)
                .bind(tag)
                .execute(&mut **tx)
                .await?;
        }
        Ok(())
    }

    /// `SELECT <columns> FROM <table> WHERE post_id IN (...) AND created_at BETWEEN ...`
    fn event_query<'a>(columns: &str, table: &str, filter: &'a EventFilter) -> QueryBuilder<'a, Sqlite> {
        let mut qb = QueryBuilder::new(format!("SELECT {columns} FROM {table} WHERE post_id IN ("));
        let mut ids = qb.separated(", ");
        for id in &filter.post_ids {
            ids.push_bind(*id);
        }
        qb.push(") AND created_at >= ")
            .push_bind(filter.start)
            .push(" AND created_at <= ")
            .push_bind(filter.end)
            .push(" ORDER BY created_at ASC, id ASC");
        qb
    }
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn init(&self) -> Result<()> {
        let statements = [
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                email TEXT NOT NULL UNIQUE,
                bio TEXT NOT NULL DEFAULT '',
                avatar TEXT,
                password_hash TEXT,
                created_at INTEGER NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS categories (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                slug TEXT NOT NULL UNIQUE,
                created_at INTEGER NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS posts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                author_id INTEGER NOT NULL,
                category_id INTEGER NOT NULL,
                title TEXT NOT NULL,
                slug TEXT NOT NULL UNIQUE,
                content TEXT NOT NULL,
                excerpt TEXT NOT NULL,
                cover_image TEXT,
                published INTEGER NOT NULL DEFAULT 1,
                views_count INTEGER NOT NULL DEFAULT 0,
                likes_count INTEGER NOT NULL DEFAULT 0,
                comments_count INTEGER NOT NULL DEFAULT 0,
                published_at INTEGER,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            )
            "#,
            "CREATE INDEX IF NOT EXISTS idx_posts_author ON posts(author_id)",
            "CREATE INDEX IF NOT EXISTS idx_posts_category ON posts(category_id)",
            "CREATE INDEX IF NOT EXISTS idx_posts_published_at ON posts(published_at)",
            r#"
            CREATE TABLE IF NOT EXISTS post_tags (
                post_id INTEGER NOT NULL,
                tag TEXT NOT NULL,
                PRIMARY KEY (post_id, tag)
            )
            "#,
            "CREATE INDEX IF NOT EXISTS idx_post_tags_tag ON post_tags(tag)",
            r#"
            CREATE TABLE IF NOT EXISTS likes (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                post_id INTEGER NOT NULL,
                user_id INTEGER NOT NULL,
                created_at INTEGER NOT NULL,
                UNIQUE (post_id, user_id)
            )
            "#,
            "CREATE INDEX IF NOT EXISTS idx_likes_user ON likes(user_id)",
            r#"
            CREATE TABLE IF NOT EXISTS comments (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                post_id INTEGER NOT NULL,
                user_id INTEGER NOT NULL,
                content TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            )
            "#,
            "CREATE INDEX IF NOT EXISTS idx_comments_post ON comments(post_id)",
            "CREATE INDEX IF NOT EXISTS idx_comments_user ON comments(user_id)",
            r#"
            CREATE TABLE IF NOT EXISTS view_events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                post_id INTEGER NOT NULL,
                user_id INTEGER,
                ip_address TEXT NOT NULL,
                user_agent TEXT NOT NULL,
                referrer TEXT,
                country TEXT,
                device TEXT,
                read_percentage INTEGER,
                created_at INTEGER NOT NULL
            )
            "#,
            "CREATE INDEX IF NOT EXISTS idx_view_events_post ON view_events(post_id)",
            "CREATE INDEX IF NOT EXISTS idx_view_events_created_at ON view_events(created_at)",
        ];

        for statement in statements {
            sqlx::query(statement).execute(self.pool.as_ref()).await?;
        }

        Ok(())
    }

    async fn create_user(&self, user: &NewUser) -> StorageResult<User> {
        self.insert_user(user, None).await
    }

    async fn create_user_with_password(
        &self,
        user: &NewUser,
        password_hash: &str,
    ) -> StorageResult<User> {
        self.insert_user(user, Some(password_hash)).await
    }

    async fn get_user(&self, id: i64) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"))
            .bind(id)
            .fetch_optional(self.pool.as_ref())
            .await?;

        Ok(user)
    }

    async fn get_credentials(&self, email: &str) -> Result<Option<Credentials>> {
        let credentials = sqlx::query_as::<_, Credentials>(
            "SELECT id AS user_id, password_hash FROM users WHERE email = ?",
        )
        .bind(email)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(credentials)
    }

    async fn update_user(&self, id: i64, changes: &UpdateUserRequest) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users SET
                name = COALESCE(?, name),
                bio = COALESCE(?, bio),
                avatar = COALESCE(?, avatar)
            WHERE id = ?
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(&changes.name)
        .bind(&changes.bio)
        .bind(&changes.avatar)
        .bind(id)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(user)
    }

    async fn create_category(&self, name: &str, slug: &str) -> StorageResult<Category> {
        let category = sqlx::query_as::<_, Category>(
            r#"
            INSERT INTO categories (name, slug, created_at)
            VALUES (?, ?, ?)
            RETURNING id, name, slug, created_at
            "#,
        )
        .bind(name)
        .bind(slug)
        .bind(now_secs())
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(category)
    }

    async fn get_category(&self, id: i64) -> Result<Option<Category>> {
        let category = sqlx::query_as::<_, Category>(
            "SELECT id, name, slug, created_at FROM categories WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(category)
    }

    async fn list_categories(&self) -> Result<Vec<Category>> {
        let categories = sqlx::query_as::<_, Category>(
            "SELECT id, name, slug, created_at FROM categories ORDER BY name ASC",
        )
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(categories)
    }

    async fn slug_exists(&self, slug: &str, exclude_id: Option<i64>) -> Result<bool> {
        let found: Option<i64> = sqlx::query_scalar(
            "SELECT id FROM posts WHERE slug = ? AND (? IS NULL OR id != ?) LIMIT 1",
        )
        .bind(slug)
        .bind(exclude_id)
        .bind(exclude_id)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(found.is_some())
    }

    async fn create_post(
        &self,
        author_id: i64,
        request: &CreatePostRequest,
        slug: &str,
    ) -> StorageResult<Post> {
        let now = now_secs();
        let published_at = request.published.then_some(now);

        let mut tx = self.pool.begin().await?;

        let post = sqlx::query_as::<_, Post>(&format!(
            r#"
            INSERT INTO posts (author_id, category_id, title, slug, content, excerpt, cover_image,
                               published, published_at, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING {POST_COLUMNS}
            "#
        ))
        .bind(author_id)
        .bind(request.category_id)
        .bind(&request.title)
        .bind(slug)
        .bind(&request.content)
        .bind(&request.excerpt)
        .bind(&request.cover_image)
        .bind(request.published)
        .bind(published_at)
        .bind(now)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        Self::replace_tags(&mut tx, post.id, &request.tags).await?;
        tx.commit().await?;

        Ok(post)
    }

    async fn get_post(&self, id: i64) -> Result<Option<Post>> {
        let post = sqlx::query_as::<_, Post>(&format!("SELECT {POST_COLUMNS} FROM posts WHERE id = ?"))
            .bind(id)
            .fetch_optional(self.pool.as_ref())
            .await?;

        Ok(post)
    }

    async fn get_post_by_slug(&self, slug: &str) -> Result<Option<Post>> {
        let post =
            sqlx::query_as::<_, Post>(&format!("SELECT {POST_COLUMNS} FROM posts WHERE slug = ?"))
                .bind(slug)
                .fetch_optional(self.pool.as_ref())
                .await?;

        Ok(post)
    }

    async fn update_post(&self, id: i64, changes: PostChanges<'_>) -> StorageResult<Post> {
        let request = changes.request;
        let mut tx = self.pool.begin().await?;

        let post = sqlx::query_as::<_, Post>(&format!(
            r#"
            UPDATE posts SET
                title = COALESCE(?, title),
                slug = COALESCE(?, slug),
                content = COALESCE(?, content),
                excerpt = COALESCE(?, excerpt),
                category_id = COALESCE(?, category_id),
                cover_image = COALESCE(?, cover_image),
                published = COALESCE(?, published),
                published_at = COALESCE(published_at, ?),
                updated_at = ?
            WHERE id = ?
            RETURNING {POST_COLUMNS}
            "#
        ))
        .bind(&request.title)
        .bind(changes.slug)
        .bind(&request.content)
        .bind(&request.excerpt)
        .bind(request.category_id)
        .bind(&request.cover_image)
        .bind(request.published)
        .bind(changes.published_at)
        .bind(now_secs())
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(StorageError::NotFound)?;

        if let Some(tags) = &request.tags {
            Self::replace_tags(&mut tx, id, tags).await?;
        }
        tx.commit().await?;

        Ok(post)
    }

    async fn delete_post(&self, id: i64) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        for table in ["post_tags", "likes", "comments", "view_events"] {
            sqlx::query(&format!("DELETE FROM {table} WHERE post_id = ?"))
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }

        let result = sqlx::query("DELETE FROM posts WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    async fn get_tags(&self, post_id: i64) -> Result<Vec<String>> {
        let tags = sqlx::query_scalar::<_, String>(
            "SELECT tag FROM post_tags WHERE post_id = ? ORDER BY tag ASC",
        )
        .bind(post_id)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(tags)
    }

    async fn list_published_posts(&self, filter: &PostFilter) -> Result<Vec<Post>> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "SELECT {} FROM posts p WHERE p.published = 1",
            POST_COLUMNS
                .split(", ")
                .map(|c| format!("p.{}", c.trim()))
                .collect::<Vec<_>>()
                .join(", ")
        ));

        if let Some(search) = filter.search.as_deref().filter(|s| !s.is_empty()) {
            let pattern = format!("%{search}%");
            qb.push(" AND (p.title LIKE ")
                .push_bind(pattern.clone())
                .push(" OR p.excerpt LIKE ")
                .push_bind(pattern.clone())
                .push(" OR p.content LIKE ")
                .push_bind(pattern)
                .push(")");
        }

        if let Some(category) = filter.category_slug.as_deref() {
            qb.push(" AND p.category_id IN (SELECT id FROM categories WHERE slug = ")
                .push_bind(category.to_string())
                .push(")");
        }

        if let Some(tag) = filter.tag.as_deref() {
            qb.push(" AND EXISTS (SELECT 1 FROM post_tags t WHERE t.post_id = p.id AND t.tag = ")
                .push_bind(tag.to_string())
                .push(")");
        }

        let (cmp, direction) = match filter.sort {
            SortOrder::Desc => ("<", "DESC"),
            SortOrder::Asc => (">", "ASC"),
        };

        if let Some((published_at, id)) = filter.after {
            qb.push(format!(" AND (COALESCE(p.published_at, p.created_at), p.id) {cmp} ("))
                .push_bind(published_at)
                .push(", ")
                .push_bind(id)
                .push(")");
        }

        qb.push(format!(
            " ORDER BY COALESCE(p.published_at, p.created_at) {direction}, p.id {direction} LIMIT "
        ))
        .push_bind(filter.limit);

        let posts = qb
            .build_query_as::<Post>()
            .fetch_all(self.pool.as_ref())
            .await?;

        Ok(posts)
    }

    async fn list_posts_by_author(&self, author_id: i64) -> Result<Vec<Post>> {
        let posts = sqlx::query_as::<_, Post>(&format!(
            "SELECT {POST_COLUMNS} FROM posts WHERE author_id = ? ORDER BY created_at DESC, id DESC"
        ))
        .bind(author_id)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(posts)
    }

    async fn list_liked_posts(&self, user_id: i64) -> Result<Vec<Post>> {
        let columns = POST_COLUMNS
            .split(", ")
            .map(|c| format!("p.{}", c.trim()))
            .collect::<Vec<_>>()
            .join(", ");
        let posts = sqlx::query_as::<_, Post>(&format!(
            r#"
            SELECT {columns} FROM likes l
            JOIN posts p ON p.id = l.post_id
            WHERE l.user_id = ?
            ORDER BY l.created_at DESC, l.id DESC
            "#
        ))
        .bind(user_id)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(posts)
    }

    async fn has_liked(&self, post_id: i64, user_id: i64) -> Result<bool> {
        let found: Option<i64> =
            sqlx::query_scalar("SELECT id FROM likes WHERE post_id = ? AND user_id = ?")
                .bind(post_id)
                .bind(user_id)
                .fetch_optional(self.pool.as_ref())
                .await?;

        Ok(found.is_some())
    }

    async fn toggle_like(&self, post_id: i64, user_id: i64) -> StorageResult<LikeOutcome> {
        let mut tx = self.pool.begin().await?;

        let removed = sqlx::query("DELETE FROM likes WHERE post_id = ? AND user_id = ?")
            .bind(post_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?
            .rows_affected()
            > 0;

        let delta: i64 = if removed {
            -1
        } else {
            sqlx::query("INSERT INTO likes (post_id, user_id, created_at) VALUES (?, ?, ?)")
                .bind(post_id)
                .bind(user_id)
                .bind(now_secs())
                .execute(&mut *tx)
                .await?;
            1
        };

        let likes_count: i64 = sqlx::query_scalar(
            "UPDATE posts SET likes_count = MAX(likes_count + ?, 0) WHERE id = ? RETURNING likes_count",
        )
        .bind(delta)
        .bind(post_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(StorageError::NotFound)?;

        tx.commit().await?;

        Ok(LikeOutcome {
            liked: !removed,
            likes_count,
        })
    }

    async fn create_comment(
        &self,
        post_id: i64,
        user_id: i64,
        content: &str,
    ) -> StorageResult<Comment> {
        let now = now_secs();
        let mut tx = self.pool.begin().await?;

        let bumped = sqlx::query("UPDATE posts SET comments_count = comments_count + 1 WHERE id = ?")
            .bind(post_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        if bumped == 0 {
            return Err(StorageError::NotFound);
        }

        let comment = sqlx::query_as::<_, Comment>(
            r#"
            INSERT INTO comments (post_id, user_id, content, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            RETURNING id, post_id, user_id, content, created_at, updated_at
            "#,
        )
        .bind(post_id)
        .bind(user_id)
        .bind(content)
        .bind(now)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(comment)
    }

    async fn get_comment(&self, id: i64) -> Result<Option<Comment>> {
        let comment = sqlx::query_as::<_, Comment>(
            "SELECT id, post_id, user_id, content, created_at, updated_at FROM comments WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(comment)
    }

    async fn list_comments(&self, post_id: i64) -> Result<Vec<Comment>> {
        let comments = sqlx::query_as::<_, Comment>(
            r#"
            SELECT id, post_id, user_id, content, created_at, updated_at
            FROM comments
            WHERE post_id = ?
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(post_id)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(comments)
    }

    async fn list_comments_by_user(&self, user_id: i64) -> Result<Vec<UserComment>> {
        let rows = sqlx::query_as::<_, (i64, String, i64, i64, i64, String, String)>(
            r#"
            SELECT c.id, c.content, c.created_at, c.updated_at, p.id, p.title, p.slug
            FROM comments c
            JOIN posts p ON p.id = c.post_id
            WHERE c.user_id = ?
            ORDER BY c.created_at DESC, c.id DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(rows
            .into_iter()
            .map(
                |(id, content, created_at, updated_at, post_id, title, slug)| UserComment {
                    id,
                    content,
                    created_at,
                    updated_at,
                    post: PostSummary {
                        id: post_id,
                        title,
                        slug,
                    },
                },
            )
            .collect())
    }

    async fn update_comment(&self, id: i64, content: &str) -> Result<Option<Comment>> {
        let comment = sqlx::query_as::<_, Comment>(
            r#"
            UPDATE comments SET content = ?, updated_at = ?
            WHERE id = ?
            RETURNING id, post_id, user_id, content, created_at, updated_at
            "#,
        )
        .bind(content)
        .bind(now_secs())
        .bind(id)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(comment)
    }

    async fn delete_comment(&self, id: i64) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        let post_id: Option<i64> =
            sqlx::query_scalar("DELETE FROM comments WHERE id = ? RETURNING post_id")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;

        let Some(post_id) = post_id else {
            return Ok(false);
        };

        sqlx::query("UPDATE posts SET comments_count = MAX(comments_count - 1, 0) WHERE id = ?")
            .bind(post_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(true)
    }
}

#[async_trait]
impl AnalyticsStore for SqliteStorage {
    async fn find_post_by_id(&self, id: i64) -> StorageResult<Option<Post>> {
        Ok(self.get_post(id).await?)
    }

    async fn find_posts_by_author(&self, author_id: i64) -> StorageResult<Vec<Post>> {
        let posts = sqlx::query_as::<_, Post>(&format!(
            "SELECT {POST_COLUMNS} FROM posts WHERE author_id = ? ORDER BY id ASC"
        ))
        .bind(author_id)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(posts)
    }

    async fn find_view_events(&self, filter: &EventFilter) -> StorageResult<Vec<ViewEvent>> {
        if filter.post_ids.is_empty() {
            return Ok(Vec::new());
        }
        let events = Self::event_query(VIEW_COLUMNS, "view_events", filter)
            .build_query_as::<ViewEvent>()
            .fetch_all(self.pool.as_ref())
            .await?;

        Ok(events)
    }

    async fn find_likes(&self, filter: &EventFilter) -> StorageResult<Vec<Like>> {
        if filter.post_ids.is_empty() {
            return Ok(Vec::new());
        }
        let likes = Self::event_query("id, post_id, user_id, created_at", "likes", filter)
            .build_query_as::<Like>()
            .fetch_all(self.pool.as_ref())
            .await?;

        Ok(likes)
    }

    async fn find_comments(&self, filter: &EventFilter) -> StorageResult<Vec<Comment>> {
        if filter.post_ids.is_empty() {
            return Ok(Vec::new());
        }
        let comments = Self::event_query(
            "id, post_id, user_id, content, created_at, updated_at",
            "comments",
            filter,
        )
        .build_query_as::<Comment>()
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(comments)
    }

    async fn insert_view_event(&self, event: &NewViewEvent) -> StorageResult<ViewEvent> {
        let mut tx = self.pool.begin().await?;

        let stored = sqlx::query_as::<_, ViewEvent>(&format!(
            r#"
            INSERT INTO view_events (post_id, user_id, ip_address, user_agent, referrer, country,
                                     device, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING {VIEW_COLUMNS}
            "#
        ))
        .bind(event.post_id)
        .bind(event.user_id)
        .bind(&event.ip_address)
        .bind(&event.user_agent)
        .bind(&event.referrer)
        .bind(&event.country)
        .bind(&event.device)
        .bind(event.created_at)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("UPDATE posts SET views_count = views_count + 1 WHERE id = ?")
            .bind(event.post_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(stored)
    }

    async fn update_latest_read_percentage(
        &self,
        post_id: i64,
        user_id: Option<i64>,
        ip_address: &str,
        read_percentage: i64,
    ) -> StorageResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE view_events SET read_percentage = ?
            WHERE id = (
                SELECT id FROM view_events
                WHERE post_id = ? AND ip_address = ? AND (? IS NULL OR user_id = ?)
                ORDER BY created_at DESC, id DESC
                LIMIT 1
            )
            "#,
        )
        .bind(read_percentage)
        .bind(post_id)
        .bind(ip_address)
        .bind(user_id)
        .bind(user_id)
        .execute(self.pool.as_ref())
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
