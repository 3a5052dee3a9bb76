//! Markdown rendering of a digest, one chunk at a time.
//!
//! A non-empty digest renders as an introduction followed by one numbered chunk
//! per article, in the order given. An empty digest renders as a single
//! "nothing found" chunk.

use crate::models::Article;
use crate::utils::truncate_chars;
use chrono::{DateTime, Utc};

/// Longest description shown in a chunk, in characters.
pub const DESCRIPTION_PREVIEW_CHARS: usize = 200;

pub const NO_RESULTS_MESSAGE: &str =
    "I couldn't find any recent news matching your request. Try different keywords or categories.";

/// Every content chunk for `articles`, relative times measured from `now`.
pub fn digest_chunks(articles: &[Article], now: DateTime<Utc>) -> Vec<String> {
    if articles.is_empty() {
        return vec![NO_RESULTS_MESSAGE.to_string()];
    }
    std::iter::once(intro(articles.len()))
        .chain(
            articles
                .iter()
                .enumerate()
                .map(|(i, a)| article_chunk(i + 1, a, now)),
        )
        .collect()
}

/// Leading chunk announcing how many articles follow.
///
/// # Returns
/// `📰 Found **N** recent articles:` followed by a blank line.
pub fn intro(count: usize) -> String {
    format!("📰 Found **{count}** recent articles:\n\n")
}

/// One numbered article.
///
/// ```text
/// **1.** **Title**
/// *Source* • 3 hours ago
/// First 200 characters of the description...
/// 🔗 [Read more](https://...)
/// ```
pub fn article_chunk(position: usize, article: &Article, now: DateTime<Utc>) -> String {
    let mut out = format!("**{position}.** **{}**\n*{}*", article.title, article.source);
    if let Some(published) = article.published_at {
        out.push_str(" • ");
        out.push_str(&time_ago(published, now));
    }
    out.push('\n');
    if !article.description.is_empty() {
        out.push_str(&truncate_chars(&article.description, DESCRIPTION_PREVIEW_CHARS));
        out.push('\n');
    }
    out.push_str(&format!("🔗 [Read more]({})\n\n", article.url));
    out
}

/// "N days ago", "N hours ago", "N minutes ago" or "just now".
///
/// Timestamps in the future count as "just now".
pub fn time_ago(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let delta = now.signed_duration_since(then);
    let (n, unit) = if delta.num_days() > 0 {
        (delta.num_days(), "day")
    } else if delta.num_hours() > 0 {
        (delta.num_hours(), "hour")
    } else if delta.num_minutes() > 0 {
        (delta.num_minutes(), "minute")
    } else {
        return "just now".to_string();
    };
    let plural = if n == 1 { "" } else { "s" };
    format!("{n} {unit}{plural} ago")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 3, 12, 0, 0).unwrap()
    }

    fn article(description: &str, published_at: Option<DateTime<Utc>>) -> Article {
        Article {
            title: "Bitcoin hits new high".into(),
            description: description.into(),
            url: "https://coindesk.com/a".into(),
            source: "CoinDesk".into(),
            published_at,
            author: None,
            image_url: None,
            category: None,
        }
    }

    #[test]
    fn relative_times() {
        let n = now();
        assert_eq!(time_ago(n - Duration::days(2), n), "2 days ago");
        assert_eq!(time_ago(n - Duration::hours(1), n), "1 hour ago");
        assert_eq!(time_ago(n - Duration::minutes(5), n), "5 minutes ago");
        assert_eq!(time_ago(n - Duration::seconds(10), n), "just now");
        assert_eq!(time_ago(n + Duration::hours(3), n), "just now");
    }

    #[test]
    fn article_chunk_layout() {
        let a = article("Prices rose.", Some(now() - Duration::hours(3)));
        assert_eq!(
            article_chunk(1, &a, now()),
            "**1.** **Bitcoin hits new high**\n*CoinDesk* • 3 hours ago\nPrices rose.\n🔗 [Read more](https://coindesk.com/a)\n\n"
        );
    }

    #[test]
    fn undated_article_has_no_time_and_long_description_is_cut() {
        let a = article(&"x".repeat(300), None);
        let chunk = article_chunk(2, &a, now());
        assert!(chunk.starts_with("**2.** **Bitcoin hits new high**\n*CoinDesk*\n"));
        assert!(chunk.contains(&format!("{}...", "x".repeat(200))));
        assert!(!chunk.contains(&"x".repeat(201)));
    }

    #[test]
    fn digest_has_intro_plus_one_chunk_per_article() {
        let articles = vec![article("", None), article("", None)];
        let chunks = digest_chunks(&articles, now());
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0], "📰 Found **2** recent articles:\n\n");
        assert!(chunks[2].starts_with("**2.**"));
    }

    #[test]
    fn empty_digest_is_one_message() {
        assert_eq!(digest_chunks(&[], now()), vec![NO_RESULTS_MESSAGE.to_string()]);
    }
}
