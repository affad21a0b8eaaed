//! URL slugs for posts and categories

use anyhow::Result;
use tracing::debug;
use unicode_normalization::UnicodeNormalization;

use crate::models::{CreatePostRequest, Post};
use crate::storage::{Storage, StorageError, StorageResult};

/// Slug used when a title has no usable characters
const FALLBACK_SLUG: &str = "post";

/// Inserts attempted before a post creation gives up on slug races
const MAX_INSERT_ATTEMPTS: usize = 10;

/// Convert text into a lowercase, hyphen-separated slug.
///
/// Accented letters are decomposed and reduced to their ASCII base; other
/// non-ASCII characters are dropped. Keeps letters, digits, `_` and `-`, and
/// turns each run of whitespace and hyphens into a single `-`. Hyphens at either
/// end are kept.
pub fn slugify(text: &str) -> String {
    let kept: String = text
        .nfkd()
        .filter(char::is_ascii)
        .map(|ch| ch.to_ascii_lowercase())
        .filter(|ch| ch.is_ascii_alphanumeric() || *ch == '_' || *ch == '-' || ch.is_whitespace())
        .collect();

    let mut slug = String::with_capacity(kept.len());
    let mut in_separator = false;
    for ch in kept.trim().chars() {
        if ch == '-' || ch.is_whitespace() {
            if !in_separator {
                slug.push('-');
            }
            in_separator = true;
        } else {
            slug.push(ch);
            in_separator = false;
        }
    }

    slug
}

fn base_slug(title: &str) -> String {
    match slugify(title) {
        s if s.is_empty() => FALLBACK_SLUG.to_string(),
        s => s,
    }
}

/// Candidate slugs in the order they are tried: `base`, `base-1`, `base-2`, ...
pub fn slug_candidates(base: &str) -> impl Iterator<Item = String> + '_ {
    std::iter::once(base.to_string()).chain((1u64..).map(move |n| format!("{base}-{n}")))
}

async fn next_free_slug<I>(
    storage: &dyn Storage,
    candidates: &mut I,
    exclude_id: Option<i64>,
) -> StorageResult<String>
where
    I: Iterator<Item = String>,
{
    for candidate in candidates {
        if !storage.slug_exists(&candidate, exclude_id).await? {
            return Ok(candidate);
        }
    }

    unreachable!("slug candidates are unbounded")
}

/// First free slug derived from `title`, ignoring the post `exclude_id` so an
/// update can keep its own slug.
pub async fn resolve_unique_slug(
    storage: &dyn Storage,
    title: &str,
    exclude_id: Option<i64>,
) -> Result<String> {
    let base = base_slug(title);
    let mut candidates = slug_candidates(&base);
    let slug = next_free_slug(storage, &mut candidates, exclude_id).await?;
    Ok(slug)
}

/// Insert a post under the first free slug derived from its title.
///
/// A slug taken between the lookup and the insert moves on to the next
/// candidate. Returns `Conflict` only after `MAX_INSERT_ATTEMPTS` lost races.
pub async fn create_post_with_unique_slug(
    storage: &dyn Storage,
    author_id: i64,
    request: &CreatePostRequest,
) -> StorageResult<Post> {
    let base = base_slug(&request.title);
    let mut candidates = slug_candidates(&base);

    for _ in 0..MAX_INSERT_ATTEMPTS {
        let slug = next_free_slug(storage, &mut candidates, None).await?;
        match storage.create_post(author_id, request, &slug).await {
            Err(StorageError::Conflict) => {
                debug!(slug = %slug, "slug taken concurrently, trying the next candidate");
            }
            result => return result,
        }
    }

    Err(StorageError::Conflict)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CreatePostRequest, NewUser};
    use crate::storage::SqliteStorage;

    #[test]
    fn test_slugify_basic() {
        assert_eq!(slugify("Hello World"), "hello-world");
        assert_eq!(slugify("  Rust: Ownership & Borrowing!  "), "rust-ownership-borrowing");
        assert_eq!(slugify("a -- b\t\tc"), "a-b-c");
        assert_eq!(slugify("snake_case stays"), "snake_case-stays");
    }

    #[test]
    fn test_slugify_transliterates_accents() {
        assert_eq!(slugify("Zürich 2024"), "zurich-2024");
        assert_eq!(slugify("Crème Brûlée"), "creme-brulee");
        assert_eq!(slugify("ﬁne print"), "fine-print");
        // No ASCII decomposition
        assert_eq!(slugify("Ωmega 東京"), "mega");
        assert_eq!(slugify("!!!"), "");
    }

    #[test]
    fn test_slugify_keeps_edge_hyphens() {
        assert_eq!(slugify("-leading and trailing-"), "-leading-and-trailing-");
        assert_eq!(slugify("  padded  "), "padded");
        assert_eq!(slugify("! spaced punctuation !"), "spaced-punctuation");
    }

    #[test]
    fn test_candidates() {
        let c: Vec<String> = slug_candidates("post").take(3).collect();
        assert_eq!(c, vec!["post", "post-1", "post-2"]);
    }

    #[tokio::test]
    async fn test_resolve_unique_slug_appends_counter() {
        let storage = SqliteStorage::new("sqlite::memory:", 1).await.unwrap();
        storage.init().await.unwrap();
        let author = storage
            .create_user(&NewUser {
                name: "Ada".into(),
                email: "ada@example.com".into(),
                bio: String::new(),
                avatar: None,
            })
            .await
            .unwrap();
        let category = storage.create_category("Tech", "tech").await.unwrap();

        let request = CreatePostRequest {
            title: "Hello World".into(),
            content: "body".into(),
            excerpt: "ex".into(),
            category_id: category.id,
            tags: vec![],
            cover_image: None,
            published: true,
        };

        let first = resolve_unique_slug(&storage, &request.title, None).await.unwrap();
        assert_eq!(first, "hello-world");
        let post = storage.create_post(author.id, &request, &first).await.unwrap();

        let second = resolve_unique_slug(&storage, &request.title, None).await.unwrap();
        assert_eq!(second, "hello-world-1");

        // The owner of a slug may keep it
        let own = resolve_unique_slug(&storage, &request.title, Some(post.id))
            .await
            .unwrap();
        assert_eq!(own, "hello-world");

        assert_eq!(resolve_unique_slug(&storage, "???", None).await.unwrap(), "post");
    }

    #[tokio::test]
    async fn test_create_skips_slugs_taken_by_racing_inserts() {
        let storage = SqliteStorage::new("sqlite::memory:", 1).await.unwrap();
        storage.init().await.unwrap();
        let author = storage
            .create_user(&NewUser {
                name: "Grace".into(),
                email: "grace@example.com".into(),
                bio: String::new(),
                avatar: None,
            })
            .await
            .unwrap();
        let category = storage.create_category("Tech", "tech").await.unwrap();
        let request = CreatePostRequest {
            title: "Launch Day".into(),
            content: "body".into(),
            excerpt: "ex".into(),
            category_id: category.id,
            tags: vec![],
            cover_image: None,
            published: true,
        };

        // Interleaved creates race for the same base slug
        let (a, b, c, d) = tokio::join!(
            create_post_with_unique_slug(&storage, author.id, &request),
            create_post_with_unique_slug(&storage, author.id, &request),
            create_post_with_unique_slug(&storage, author.id, &request),
            create_post_with_unique_slug(&storage, author.id, &request),
        );

        let mut slugs: Vec<String> = [a, b, c, d]
            .into_iter()
            .map(|post| post.unwrap().slug)
            .collect();
        slugs.sort();
        assert_eq!(
            slugs,
            vec!["launch-day", "launch-day-1", "launch-day-2", "launch-day-3"]
        );
    }
}
