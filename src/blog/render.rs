//! HTML rendering for the blog teaser grid.
//!
//! Every interpolated value goes through `escape_html`, including the
//! permalink placed in the card's `href`.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};

use crate::config::TagRule;
use crate::models::{BlogPost, Language};
use crate::utils::escape_html;

/// Posts shown in the teaser grid.
pub const MAX_RENDERED_POSTS: usize = 2;

/// Tags shown per card.
pub const MAX_TAGS: usize = 4;

const ITALIAN_MONTHS: [&str; 12] = [
    "gennaio", "febbraio", "marzo", "aprile", "maggio", "giugno",
    "luglio", "agosto", "settembre", "ottobre", "novembre", "dicembre",
];

fn parse_post_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.date_naive());
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
        .ok()
        .map(|dt| dt.date())
}

/// Long-form localized date, or a "recent" placeholder when the date is
/// missing or unparseable.
pub fn format_blog_date(date: Option<&str>, lang: Language) -> String {
    match date.and_then(parse_post_date) {
        Some(date) => match lang {
            Language::En => date.format("%B %-d, %Y").to_string(),
            Language::It => format!(
                "{} {} {}",
                date.day(),
                ITALIAN_MONTHS[date.month0() as usize],
                date.year()
            ),
        },
        None => match lang {
            Language::En => "Recent".to_string(),
            Language::It => "Recente".to_string(),
        },
    }
}

/// Explicit tags when the post has a tag list, otherwise tags inferred from
/// the keyword table. Capped at `MAX_TAGS` either way.
pub fn resolve_tags(post: &BlogPost, rules: &[TagRule]) -> Vec<String> {
    if let Some(ref tags) = post.tags {
        return tags.iter().take(MAX_TAGS).cloned().collect();
    }

    let text = post.inference_text().to_lowercase();
    rules
        .iter()
        .filter(|rule| rule.matches(&text))
        .map(|rule| rule.label.clone())
        .take(MAX_TAGS)
        .collect()
}

pub fn empty_state_message(lang: Language) -> &'static str {
    match lang {
        Language::En => "No articles available at the moment.",
        Language::It => "Nessun articolo disponibile al momento.",
    }
}

pub fn render_empty_state(lang: Language) -> String {
    format!(
        "<div class=\"blog-card blog-empty\"><div class=\"blog-title\">{}</div></div>",
        escape_html(empty_state_message(lang))
    )
}

pub fn render_post_card(post: &BlogPost, lang: Language, rules: &[TagRule]) -> String {
    let date = format_blog_date(post.date.as_deref(), lang);
    let tags: String = resolve_tags(post, rules)
        .iter()
        .map(|tag| format!("<span class=\"blog-tag\">{}</span>", escape_html(tag)))
        .collect();

    format!(
        "<a href=\"{}\" class=\"blog-card\">\
         <div class=\"blog-date\">{}</div>\
         <div class=\"blog-title\">{}</div>\
         <div class=\"blog-summary\">{}</div>\
         <div class=\"blog-tags\">{}</div>\
         </a>",
        escape_html(&post.permalink),
        escape_html(&date),
        escape_html(&post.title),
        escape_html(&post.summary),
        tags
    )
}

/// Markup for the whole grid: the first `MAX_RENDERED_POSTS` cards, or the
/// empty state when there is nothing to show.
pub fn render_blog_grid(posts: &[BlogPost], lang: Language, rules: &[TagRule]) -> String {
    if posts.is_empty() {
        return render_empty_state(lang);
    }
    posts
        .iter()
        .take(MAX_RENDERED_POSTS)
        .map(|post| render_post_card(post, lang, rules))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn post(title: &str) -> BlogPost {
        BlogPost {
            title: title.to_string(),
            summary: "Summary".to_string(),
            permalink: "https://example.org/post/".to_string(),
            date: None,
            tags: None,
            content: None,
        }
    }

    #[test]
    fn test_format_blog_date() {
        assert_eq!(format_blog_date(Some("2025-03-07"), Language::En), "March 7, 2025");
        assert_eq!(format_blog_date(Some("2025-03-07"), Language::It), "7 marzo 2025");
        assert_eq!(
            format_blog_date(Some("2024-12-01T09:30:00+01:00"), Language::En),
            "December 1, 2024"
        );
        assert_eq!(format_blog_date(None, Language::En), "Recent");
        assert_eq!(format_blog_date(Some(""), Language::It), "Recente");
        assert_eq!(format_blog_date(Some("last tuesday"), Language::En), "Recent");
    }

    #[test]
    fn test_explicit_tags_are_capped() {
        let rules = Config::default().tag_keywords;
        let mut p = post("Rust");
        p.tags = Some(vec!["a", "b", "c", "d", "e"].into_iter().map(String::from).collect());
        assert_eq!(resolve_tags(&p, &rules), vec!["a", "b", "c", "d"]);

        // An explicit empty list wins over inference
        p.tags = Some(Vec::new());
        assert!(resolve_tags(&p, &rules).is_empty());
    }

    #[test]
    fn test_inferred_tags_follow_table_order() {
        let rules = Config::default().tag_keywords;
        let p = post("Streaming into Apache Iceberg with Rust for data engineers");
        assert_eq!(
            resolve_tags(&p, &rules),
            vec!["Rust", "Data Engineering", "Streaming", "Apache Iceberg"]
        );
        assert!(resolve_tags(&post("Gardening notes"), &rules).is_empty());

        let mut with_content = post("Untitled");
        with_content.content = Some("A deep dive into RUST lifetimes".to_string());
        assert_eq!(resolve_tags(&with_content, &rules), vec!["Rust"]);
    }

    #[test]
    fn test_script_title_renders_as_text() {
        let rules = Config::default().tag_keywords;
        let mut p = post("<script>alert(1)</script>");
        p.permalink = "javascript:\"><script>".to_string();
        let html = render_post_card(&p, Language::En, &rules);

        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;alert(1)&lt;/script&gt;"));
        assert!(html.contains("href=\"javascript:&quot;&gt;&lt;script&gt;\""));
    }

    #[test]
    fn test_grid_shows_two_posts_or_empty_state() {
        let rules = Config::default().tag_keywords;
        let posts = vec![post("One"), post("Two"), post("Three")];
        let html = render_blog_grid(&posts, Language::En, &rules);
        assert_eq!(html.matches("class=\"blog-card\"").count(), 2);
        assert!(!html.contains("Three"));

        let empty = render_blog_grid(&[], Language::It, &rules);
        assert!(empty.contains("Nessun articolo disponibile al momento."));
    }
}
