//! Syndication feed parsing (RSS 0.9x/2.0, RSS 1.0/RDF, Atom).
//!
//! `feed-rs` resolves the dialect and namespaces; each entry is then mapped to
//! a [`RawItem`]. The link is the first `alternate` (or untyped) link, falling
//! back to a URL-shaped guid. The image is the first image-typed media
//! content or enclosure, then a media thumbnail, then the first `<img>` in the
//! entry's HTML.

use super::RawItem;
use crate::error::FetchError;
use crate::models::{Article, SourceSpec};
use crate::utils::{scrub_html_entities_for_xml, truncate_for_log};
use feed_rs::model::{Entry, MediaObject};
use feed_rs::parser;
use tracing::debug;

impl From<Entry> for RawItem {
    fn from(entry: Entry) -> Self {
        let link = entry
            .links
            .iter()
            .find(|l| matches!(l.rel.as_deref(), None | Some("alternate")))
            .or_else(|| entry.links.first())
            .map(|l| l.href.clone())
            .or_else(|| guid_permalink(&entry.id));
        let content_html = entry.content.and_then(|c| c.body);
        RawItem {
            title: entry.title.map(|t| t.content),
            link,
            summary: entry.summary.map(|s| s.content).or_else(|| content_html.clone()),
            content_html,
            published: entry.published.or(entry.updated),
            author: entry.authors.into_iter().map(|p| p.name).find(|n| !n.trim().is_empty()),
            image_url: media_image(&entry.media),
        }
    }
}

/// RSS guids default to `isPermaLink="true"`; take the guid when it is a URL.
fn guid_permalink(id: &str) -> Option<String> {
    let id = id.trim();
    (id.starts_with("https://") || id.starts_with("http://")).then(|| id.to_string())
}

fn media_image(media: &[MediaObject]) -> Option<String> {
    let content = media
        .iter()
        .flat_map(|m| m.content.iter())
        .filter(|c| {
            c.content_type
                .as_ref()
                .is_none_or(|mime| mime.type_().as_str() == "image")
        })
        .find_map(|c| c.url.as_ref().map(|u| u.to_string()));
    content.or_else(|| {
        media
            .iter()
            .flat_map(|m| m.thumbnails.iter())
            .map(|t| t.image.uri.trim())
            .find(|uri| !uri.is_empty())
            .map(str::to_string)
    })
}

/// Parse a syndication feed body into at most `max_items` articles.
///
/// Only a document that is not a recognizable feed fails; entries missing a
/// title or URL are dropped one by one.
pub fn parse(body: &str, spec: &SourceSpec, max_items: usize) -> Result<Vec<Article>, FetchError> {
    let xml = scrub_html_entities_for_xml(body.trim_start_matches('\u{feff}'));
    let feed = parser::parse(xml.as_bytes()).map_err(|e| {
        debug!(error = %e, preview = %truncate_for_log(body, 200), "Unrecognised feed payload");
        FetchError::Malformed(format!("feed structure: {e}"))
    })?;

    let dialect = feed.feed_type;
    let total = feed.entries.len();
    let articles: Vec<Article> = feed
        .entries
        .into_iter()
        .take(max_items)
        .map(RawItem::from)
        .filter_map(|item| item.into_article(spec))
        .collect();
    debug!(?dialect, total, kept = articles.len(), "Parsed feed");
    Ok(articles)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Category;
    use chrono::{TimeZone, Utc};

    fn spec() -> SourceSpec {
        SourceSpec::feed("TechCrunch", "https://techcrunch.com/feed/", Category::Technology)
    }

    const RSS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:media="http://search.yahoo.com/mrss/" xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:content="http://purl.org/rss/1.0/modules/content/">
  <channel>
    <title>TechCrunch</title>
    <link>https://techcrunch.com</link>
    <item>
      <title>Startup raises&nbsp;$10M</title>
      <link>https://techcrunch.com/2024/01/03/startup/</link>
      <description><![CDATA[<p>Funding news</p>]]></description>
      <pubDate>Wed, 03 Jan 2024 10:00:00 +0000</pubDate>
      <dc:creator>Jane Doe</dc:creator>
      <media:content url="https://img.test/startup.jpg" medium="image"/>
      <category>Startups</category>
    </item>
    <item>
      <title>No link here</title>
      <description>dropped</description>
    </item>
    <item>
      <title>Enclosure image</title>
      <link>https://techcrunch.com/2024/01/01/enclosure/</link>
      <enclosure url="https://img.test/audio.mp3" type="audio/mpeg" length="1"/>
      <enclosure url="https://img.test/photo.png" type="image/png" length="1"/>
    </item>
  </channel>
</rss>"#;

    const ATOM: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>The Verge</title>
  <entry>
    <title type="html">Phone review</title>
    <link rel="alternate" type="text/html" href="https://www.theverge.com/review/1"/>
    <link rel="replies" href="https://www.theverge.com/review/1#comments"/>
    <published>2024-01-02T08:30:00-05:00</published>
    <updated>2024-01-02T09:00:00-05:00</updated>
    <author><name>Alex</name></author>
    <content type="html">&lt;p&gt;Great phone&lt;/p&gt;&lt;img src="https://img.test/phone.jpg"&gt;</content>
  </entry>
</feed>"#;

    const RDF: &str = r#"<?xml version="1.0"?>
<rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#" xmlns="http://purl.org/rss/1.0/" xmlns:dc="http://purl.org/dc/elements/1.1/">
  <channel rdf:about="https://example.org/"><title>Example</title></channel>
  <item rdf:about="https://example.org/1">
    <title>RDF story</title>
    <link>https://example.org/1</link>
    <dc:date>2024-01-01T00:00:00Z</dc:date>
  </item>
</rdf:RDF>"#;

    #[test]
    fn parses_rss_items_and_drops_incomplete_ones() {
        let articles = parse(RSS, &spec(), 25).unwrap();
        assert_eq!(articles.len(), 2);

        let first = &articles[0];
        assert_eq!(first.title, "Startup raises $10M");
        assert_eq!(first.description, "Funding news");
        assert_eq!(first.image_url.as_deref(), Some("https://img.test/startup.jpg"));
        assert_eq!(
            first.published_at,
            Some(Utc.with_ymd_and_hms(2024, 1, 3, 10, 0, 0).unwrap())
        );
        assert_eq!(first.source, "TechCrunch");

        let second = &articles[1];
        assert_eq!(second.image_url.as_deref(), Some("https://img.test/photo.png"));
        assert_eq!(second.published_at, None);
        assert_eq!(second.description, "");
    }

    #[test]
    fn max_items_caps_payload_items() {
        let articles = parse(RSS, &spec(), 1).unwrap();
        assert_eq!(articles.len(), 1);
    }

    #[test]
    fn parses_atom_entries() {
        let articles = parse(ATOM, &spec(), 25).unwrap();
        assert_eq!(articles.len(), 1);
        let a = &articles[0];
        assert_eq!(a.title, "Phone review");
        assert_eq!(a.url, "https://www.theverge.com/review/1");
        assert_eq!(a.description, "Great phone");
        assert_eq!(a.author.as_deref(), Some("Alex"));
        assert_eq!(a.image_url.as_deref(), Some("https://img.test/phone.jpg"));
        assert_eq!(
            a.published_at,
            Some(Utc.with_ymd_and_hms(2024, 1, 2, 13, 30, 0).unwrap())
        );
    }

    #[test]
    fn parses_rdf_items() {
        let articles = parse(RDF, &spec(), 25).unwrap();
        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0].title, "RDF story");
        assert_eq!(articles[0].url, "https://example.org/1");
    }

    #[test]
    fn rejects_non_feed_payloads() {
        assert!(matches!(
            parse("<html><body>nope</body></html>", &spec(), 25),
            Err(FetchError::Malformed(_))
        ));
        assert!(matches!(parse("", &spec(), 25), Err(FetchError::Malformed(_))));
    }

    fn rss_with_items(namespaces: &str, items: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" {namespaces}>
  <channel>
    <title>Fixture</title>
    <link>https://fixture.test</link>
    {items}
  </channel>
</rss>"#
        )
    }

    #[test]
    fn atom_link_inside_rss_item_does_not_shadow_the_item_link() {
        let xml = rss_with_items(
            r#"xmlns:atom="http://www.w3.org/2005/Atom" xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:media="http://search.yahoo.com/mrss/""#,
            r#"<item>
      <title>Senate passes budget</title>
      <link>https://www.nytimes.com/2024/01/03/us/politics/budget.html</link>
      <atom:link href="https://www.nytimes.com/2024/01/03/us/politics/budget.html" rel="standout"/>
      <description>The vote was close.</description>
      <dc:creator>Jane Doe</dc:creator>
      <guid isPermaLink="true">https://www.nytimes.com/2024/01/03/us/politics/budget.html</guid>
      <pubDate>Wed, 03 Jan 2024 10:00:00 +0000</pubDate>
      <media:content height="151" medium="image" url="https://static01.nyt.com/images/budget.jpg" width="151"/>
    </item>"#,
        );
        let articles = parse(&xml, &spec(), 25).unwrap();
        assert_eq!(articles.len(), 1);
        let a = &articles[0];
        assert_eq!(a.title, "Senate passes budget");
        assert_eq!(a.url, "https://www.nytimes.com/2024/01/03/us/politics/budget.html");
        assert_eq!(a.description, "The vote was close.");
        assert_eq!(a.image_url.as_deref(), Some("https://static01.nyt.com/images/budget.jpg"));
        assert_eq!(
            a.published_at,
            Some(Utc.with_ymd_and_hms(2024, 1, 3, 10, 0, 0).unwrap())
        );
    }

    #[test]
    fn repeated_item_elements_are_tolerated() {
        let xml = rss_with_items(
            r#"xmlns:dc="http://purl.org/dc/elements/1.1/""#,
            r#"<item>
      <title>Two bylines</title>
      <link>https://fixture.test/two-bylines</link>
      <dc:creator>Jane Doe</dc:creator>
      <dc:creator>John Roe</dc:creator>
    </item>
    <item>
      <title>Second story</title>
      <link>https://fixture.test/second</link>
    </item>"#,
        );
        let articles = parse(&xml, &spec(), 25).unwrap();
        let titles: Vec<_> = articles.iter().map(|a| a.title.as_str()).collect();
        assert_eq!(titles, ["Two bylines", "Second story"]);
    }

    #[test]
    fn permalink_guid_stands_in_for_a_missing_link() {
        let xml = rss_with_items(
            "",
            r#"<item>
      <title>Guid only</title>
      <guid isPermaLink="true">https://fixture.test/guid-only</guid>
    </item>
    <item>
      <title>Opaque guid</title>
      <guid isPermaLink="false">tag:fixture.test,2024:42</guid>
    </item>"#,
        );
        let articles = parse(&xml, &spec(), 25).unwrap();
        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0].url, "https://fixture.test/guid-only");
    }

    #[test]
    fn html_named_entities_in_titles_do_not_reject_the_feed() {
        let xml = rss_with_items(
            "",
            r#"<item>
      <title>AT&amp;T &rsquo;deal&rsquo; caf&eacute; &euro;5 &pound;4 &trade;</title>
      <link>https://fixture.test/entities</link>
    </item>"#,
        );
        let articles = parse(&xml, &spec(), 25).unwrap();
        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0].title, "AT&T \u{2019}deal\u{2019} caf\u{e9} \u{20ac}5 \u{a3}4 \u{2122}");
    }

    #[test]
    fn empty_channel_is_not_an_error() {
        let xml = r#"<rss version="2.0"><channel><title>Quiet</title></channel></rss>"#;
        assert_eq!(parse(xml, &spec(), 25).unwrap(), vec![]);
    }
}
