use chrono::{ DateTime, Utc };

use super::front_matter::parse_date;
use crate::models::blog::BlogMeta;

struct Page {
    path: &'static str,
    change_frequency: &'static str,
    priority: &'static str,
}

const SITE_PAGES: [Page; 4] = [
    Page { path: "", change_frequency: "monthly", priority: "1.0" },
    Page { path: "/projects", change_frequency: "monthly", priority: "0.8" },
    Page { path: "/blog", change_frequency: "weekly", priority: "0.8" },
    Page { path: "/Contact", change_frequency: "yearly", priority: "0.5" },
];

fn escape_xml(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

fn push_url(out: &mut String, loc: &str, lastmod: &str, change_frequency: &str, priority: &str) {
    out.push_str("  <url>\n");
    out.push_str(&format!("    <loc>{}</loc>\n", escape_xml(loc)));
    out.push_str(&format!("    <lastmod>{}</lastmod>\n", lastmod));
    out.push_str(&format!("    <changefreq>{}</changefreq>\n", change_frequency));
    out.push_str(&format!("    <priority>{}</priority>\n", priority));
    out.push_str("  </url>\n");
}

pub fn render_sitemap(base_url: &str, blogs: &[BlogMeta], now: DateTime<Utc>) -> String {
    let base = base_url.trim_end_matches('/');
    let today = now.format("%Y-%m-%d").to_string();

    let mut out = String::from(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<urlset xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\">\n"
    );
    for page in SITE_PAGES.iter() {
        let loc = format!("{}{}", base, page.path);
        push_url(&mut out, &loc, &today, page.change_frequency, page.priority);
    }
    for blog in blogs {
        let loc = format!("{}/blog/{}", base, blog.slug);
        let lastmod = blog.date
            .as_deref()
            .and_then(parse_date)
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| today.clone());
        push_url(&mut out, &loc, &lastmod, "monthly", "0.6");
    }
    out.push_str("</urlset>\n");
    out
}
