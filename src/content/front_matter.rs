use chrono::{ DateTime, NaiveDate, NaiveDateTime };
use serde::Deserialize;
use serde_yaml_ng::Value as YamlValue;

use super::ContentError;
use crate::models::blog::BlogMeta;

#[derive(Deserialize, Default)]
struct RawMeta {
    title: Option<String>,
    slug: Option<String>,
    date: Option<YamlValue>,
    description: Option<String>,
    image: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
}

/// Splits a leading `---` fenced YAML block from the body. Text without an
/// opening fence is all body.
pub fn parse_front_matter(raw: &str) -> Result<(BlogMeta, String), ContentError> {
    let raw = raw.strip_prefix('\u{feff}').unwrap_or(raw);

    let Some((yaml, body)) = split_fences(raw)? else {
        return Ok((BlogMeta::default(), raw.to_string()));
    };

    let meta = if yaml.trim().is_empty() {
        RawMeta::default()
    } else {
        serde_yaml_ng::from_str::<RawMeta>(yaml).map_err(|e| ContentError::FrontMatter(e.to_string()))?
    };

    Ok((
        BlogMeta {
            title: meta.title,
            slug: meta.slug.unwrap_or_default(),
            date: meta.date.as_ref().and_then(date_text),
            description: meta.description,
            image: meta.image,
            tags: meta.tags,
        },
        body.to_string(),
    ))
}

fn split_fences(raw: &str) -> Result<Option<(&str, &str)>, ContentError> {
    let Some(rest) = raw.strip_prefix("---") else {
        return Ok(None);
    };
    let Some(newline) = rest.find('\n') else {
        return Ok(None);
    };
    if !rest[..newline].trim().is_empty() {
        return Ok(None);
    }

    let block = &rest[newline + 1..];
    let mut offset = 0;
    for line in block.split_inclusive('\n') {
        if line.trim_end() == "---" {
            return Ok(Some((&block[..offset], &block[offset + line.len()..])));
        }
        offset += line.len();
    }
    Err(ContentError::FrontMatter("front matter block is not closed".into()))
}

fn date_text(value: &YamlValue) -> Option<String> {
    match value {
        YamlValue::String(s) => Some(normalize_date(s)),
        YamlValue::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Timestamps collapse to their UTC calendar day; anything else is kept as
/// written.
pub fn normalize_date(raw: &str) -> String {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return ts.naive_utc().date().format("%Y-%m-%d").to_string();
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(ts) = NaiveDateTime::parse_from_str(raw, fmt) {
            return ts.date().format("%Y-%m-%d").to_string();
        }
    }
    raw.to_string()
}

pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(&normalize_date(raw), "%Y-%m-%d").ok()
}
