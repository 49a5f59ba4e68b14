use sqlx::SqlitePool;
use uuid::Uuid;

pub const MIN_LEN: usize = 3;
pub const MAX_LEN: usize = 30;

/// Slugs that would shadow a fixed route under `/api/public/`.
const RESERVED: &[&str] = &["leaderboard"];

/// Lowercase, keep `[a-z0-9_-]`, turn everything else into single dashes and
/// trim dashes at both ends.
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    for c in input.to_lowercase().chars() {
        let c = if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '-' };
        if c == '-' && slug.ends_with('-') {
            continue;
        }
        slug.push(c);
    }
    slug.trim_matches('-').to_string()
}

pub fn is_valid_slug(slug: &str) -> bool {
    (MIN_LEN..=MAX_LEN).contains(&slug.len())
        && slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
        && !RESERVED.contains(&slug)
}

pub async fn is_slug_taken(db: &SqlitePool, slug: &str) -> Result<bool, sqlx::Error> {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users WHERE slug = ?")
        .bind(slug)
        .fetch_one(db)
        .await?;
    Ok(count > 0)
}

/// Derive a free slug from `username`, appending `-1`, `-2`, ... on collision.
pub async fn generate_unique_slug(db: &SqlitePool, username: &str) -> Result<String, sqlx::Error> {
    let mut base = slugify(username);
    if base.len() < MIN_LEN {
        let filler = Uuid::new_v4().simple().to_string();
        base.push_str(&filler[..MIN_LEN]);
    }
    base.truncate(MAX_LEN);

    let mut candidate = base.clone();
    let mut counter = 1;
    while RESERVED.contains(&candidate.as_str()) || is_slug_taken(db, &candidate).await? {
        let suffix = format!("-{counter}");
        let keep = base.len().min(MAX_LEN - suffix.len());
        candidate = format!("{}{}", &base[..keep], suffix);
        counter += 1;
    }

    Ok(candidate)
}
