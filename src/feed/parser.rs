use chrono::{DateTime, SubsecRound, Utc};
use feed_rs::parser;
use quick_xml::events::Event;
use quick_xml::Reader;

use super::FetchError;

/// One entry of a parsed feed, before placeholder substitution.
///
/// Every field is optional; missing and blank values are both `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedEntry {
    pub title: Option<String>,
    /// Publication date exactly as written in the source.
    pub published: Option<String>,
    pub link: Option<String>,
    pub summary: Option<String>,
    /// Publication date truncated to whole seconds.
    pub published_parsed: Option<DateTime<Utc>>,
}

/// Parse an RSS/Atom document into its entries, in document order.
///
/// `feed-rs` supplies the structured fields. It does not keep the source
/// date text, so a second pass over the XML collects it per entry.
///
/// # Errors
///
/// [`FetchError::Parse`] when the body is not a recognizable feed.
pub fn parse_feed(bytes: &[u8]) -> Result<Vec<FeedEntry>, FetchError> {
    let feed = parser::parse(bytes).map_err(|e| FetchError::Parse(e.to_string()))?;
    let raw_dates = raw_dates_for(bytes, feed.entries.len());

    let entries = feed
        .entries
        .into_iter()
        .zip(raw_dates)
        .map(|(entry, raw_date)| {
            let published_at = entry.published.map(|dt| dt.trunc_subsecs(0));
            let summary = entry
                .summary
                .map(|s| s.content)
                .or_else(|| entry.content.and_then(|c| c.body));

            FeedEntry {
                title: non_blank(entry.title.map(|t| t.content)),
                published: raw_date.or_else(|| published_at.map(|dt| dt.to_rfc2822())),
                link: non_blank(entry.links.into_iter().next().map(|l| l.href)),
                summary: non_blank(summary),
                published_parsed: published_at,
            }
        })
        .collect();

    Ok(entries)
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

/// Raw date text for each of the `expected` entries.
///
/// Falls back to all-`None` when the scan disagrees with `feed-rs` on the
/// number of entries, so dates are never attached to the wrong item.
fn raw_dates_for(bytes: &[u8], expected: usize) -> Vec<Option<String>> {
    match scan_raw_dates(bytes) {
        Ok(dates) if dates.len() == expected => dates,
        Ok(dates) => {
            tracing::warn!(
                scanned = dates.len(),
                parsed = expected,
                "Entry count mismatch while reading raw dates"
            );
            vec![None; expected]
        }
        Err(e) => {
            tracing::warn!(error = %e, "Could not scan raw entry dates");
            vec![None; expected]
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DateField {
    /// RSS `pubDate`, Atom `published`
    Published,
    /// Dublin Core `dc:date`
    DcDate,
}

impl DateField {
    fn from_element(name: &[u8], local: &[u8]) -> Option<Self> {
        match (name, local) {
            (b"dc:date", _) => Some(Self::DcDate),
            (_, b"pubDate") | (_, b"published") => Some(Self::Published),
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
struct RawDates {
    published: Option<String>,
    dc_date: Option<String>,
}

impl RawDates {
    fn set(&mut self, field: DateField, text: &str) {
        let slot = match field {
            DateField::Published => &mut self.published,
            DateField::DcDate => &mut self.dc_date,
        };
        let text = text.trim();
        if slot.is_none() && !text.is_empty() {
            *slot = Some(text.to_string());
        }
    }

    fn best(self) -> Option<String> {
        self.published.or(self.dc_date)
    }
}

/// Walks `<item>`/`<entry>` elements and records the text of their direct
/// date children.
fn scan_raw_dates(bytes: &[u8]) -> Result<Vec<Option<String>>, quick_xml::Error> {
    let mut reader = Reader::from_reader(bytes);
    let mut buf = Vec::new();
    let mut dates: Vec<RawDates> = Vec::new();
    // Element depth inside the current entry; 0 = outside any entry.
    let mut depth = 0usize;
    let mut field: Option<DateField> = None;
    let mut text = String::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => {
                if depth == 0 {
                    if matches!(e.local_name().as_ref(), b"item" | b"entry") {
                        dates.push(RawDates::default());
                        depth = 1;
                    }
                } else {
                    depth += 1;
                    if depth == 2 {
                        field =
                            DateField::from_element(e.name().as_ref(), e.local_name().as_ref());
                        text.clear();
                    }
                }
            }
            // `<item/>` still counts as an entry for feed-rs
            Event::Empty(e) if depth == 0 => {
                if matches!(e.local_name().as_ref(), b"item" | b"entry") {
                    dates.push(RawDates::default());
                }
            }
            Event::End(_) if depth > 0 => {
                if depth == 2 {
                    if let (Some(f), Some(slot)) = (field.take(), dates.last_mut()) {
                        slot.set(f, &text);
                    }
                }
                depth -= 1;
            }
            Event::Text(t) if field.is_some() => {
                let decoded = t.unescape().map_err(quick_xml::Error::from)?;
                text.push_str(&decoded);
            }
            Event::CData(c) if field.is_some() => {
                text.push_str(&String::from_utf8_lossy(&c));
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(dates.into_iter().map(RawDates::best).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const RSS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0"><channel>
    <title>Yle Uutiset</title>
    <item>
        <title>First</title>
        <link>https://yle.fi/a/1</link>
        <description>Summary one</description>
        <pubDate>Wed, 03 Jan 2024 10:15:30 +0200</pubDate>
    </item>
    <item>
        <title>Second</title>
    </item>
</channel></rss>"#;

    #[test]
    fn test_parse_rss_fields() {
        let entries = parse_feed(RSS.as_bytes()).unwrap();
        assert_eq!(entries.len(), 2);

        let first = &entries[0];
        assert_eq!(first.title.as_deref(), Some("First"));
        assert_eq!(first.link.as_deref(), Some("https://yle.fi/a/1"));
        assert_eq!(first.summary.as_deref(), Some("Summary one"));
        assert_eq!(
            first.published_parsed,
            Some(Utc.with_ymd_and_hms(2024, 1, 3, 8, 15, 30).unwrap())
        );
        assert_eq!(
            first.published.as_deref(),
            Some("Wed, 03 Jan 2024 10:15:30 +0200")
        );
    }

    #[test]
    fn test_unparseable_date_kept_verbatim() {
        let rss = r#"<?xml version="1.0"?>
<rss version="2.0"><channel>
    <item><title>A</title><pubDate>Wed, 03 Jan 2024 10:15:30 +0200</pubDate></item>
    <item><title>B</title><pubDate>3.1.2024 klo 10.15</pubDate></item>
</channel></rss>"#;
        let entries = parse_feed(rss.as_bytes()).unwrap();
        assert_eq!(entries.len(), 2);

        assert_eq!(
            entries[0].published.as_deref(),
            Some("Wed, 03 Jan 2024 10:15:30 +0200")
        );
        assert!(entries[0].published_parsed.is_some());

        assert_eq!(entries[1].published.as_deref(), Some("3.1.2024 klo 10.15"));
        assert!(entries[1].published_parsed.is_none());
    }

    #[test]
    fn test_dates_stay_with_their_entries() {
        // Middle item has no date; the channel-level pubDate must not leak into it.
        let rss = r#"<?xml version="1.0"?>
<rss version="2.0" xmlns:dc="http://purl.org/dc/elements/1.1/"><channel>
    <pubDate>Mon, 01 Jan 2024 00:00:00 +0000</pubDate>
    <item><title>one</title><pubDate> Tue, 02 Jan 2024 08:00:00 GMT </pubDate></item>
    <item><title>two</title></item>
    <item><title>three</title><dc:date>2024-01-04T09:30:00+02:00</dc:date></item>
</channel></rss>"#;
        let entries = parse_feed(rss.as_bytes()).unwrap();
        let published: Vec<Option<&str>> =
            entries.iter().map(|e| e.published.as_deref()).collect();
        assert_eq!(
            published,
            vec![
                Some("Tue, 02 Jan 2024 08:00:00 GMT"),
                None,
                Some("2024-01-04T09:30:00+02:00"),
            ]
        );
    }

    #[test]
    fn test_scan_handles_cdata_and_atom_published() {
        let atom = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
    <entry><title>x</title><published><![CDATA[2024-01-02T12:00:00+02:00]]></published></entry>
</feed>"#;
        let dates = scan_raw_dates(atom.as_bytes()).unwrap();
        assert_eq!(dates, vec![Some("2024-01-02T12:00:00+02:00".to_string())]);
    }

    #[test]
    fn test_missing_fields_are_none() {
        let entries = parse_feed(RSS.as_bytes()).unwrap();
        let second = &entries[1];
        assert_eq!(second.title.as_deref(), Some("Second"));
        assert!(second.link.is_none());
        assert!(second.summary.is_none());
        assert!(second.published.is_none());
        assert!(second.published_parsed.is_none());
    }

    #[test]
    fn test_blank_title_is_none() {
        let rss = r#"<?xml version="1.0"?>
<rss version="2.0"><channel>
    <item><title>   </title><link>https://yle.fi/a/2</link></item>
</channel></rss>"#;
        let entries = parse_feed(rss.as_bytes()).unwrap();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].title.is_none());
    }

    #[test]
    fn test_atom_content_used_when_no_summary() {
        let atom = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
    <title>Example</title>
    <id>urn:example</id>
    <updated>2024-01-02T00:00:00Z</updated>
    <entry>
        <title>Atom entry</title>
        <id>urn:example:1</id>
        <link href="https://example.com/1"/>
        <published>2024-01-02T12:00:00Z</published>
        <updated>2024-01-02T12:00:00Z</updated>
        <content type="text">Body text</content>
    </entry>
</feed>"#;
        let entries = parse_feed(atom.as_bytes()).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].summary.as_deref(), Some("Body text"));
        assert_eq!(entries[0].link.as_deref(), Some("https://example.com/1"));
        assert!(entries[0].published_parsed.is_some());
    }

    #[test]
    fn test_empty_channel_has_no_entries() {
        let rss = r#"<?xml version="1.0"?>
<rss version="2.0"><channel></channel></rss>"#;
        assert!(parse_feed(rss.as_bytes()).unwrap().is_empty());
    }

    #[test]
    fn test_malformed_body_is_parse_error() {
        let result = parse_feed(b"<not valid xml");
        assert!(matches!(result, Err(FetchError::Parse(_))));
    }
}
