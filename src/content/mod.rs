pub mod cache;
pub mod front_matter;
pub mod sitemap;

use log::{ debug, info, warn };
use std::cmp::Ordering;
use std::io::ErrorKind;
use std::path::{ Path, PathBuf };
use thiserror::Error;

use self::cache::{ CachePolicy, ContentCache };
use self::front_matter::{ parse_date, parse_front_matter };
use crate::models::blog::{ Blog, BlogMeta };

const EXTENSIONS: [&str; 2] = ["mdx", "md"];

#[derive(Debug, Error)]
pub enum ContentError {
    #[error("blog '{0}' not found")]
    NotFound(String),
    #[error("failed to read '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid front matter: {0}")]
    FrontMatter(String),
}

/// Strips a trailing `.md` / `.mdx`, case-insensitively.
pub fn normalize_slug(slug: &str) -> &str {
    let lower = slug.to_ascii_lowercase();
    for ext in EXTENSIONS {
        if lower.ends_with(&format!(".{}", ext)) {
            return &slug[..slug.len() - ext.len() - 1];
        }
    }
    slug
}

fn is_safe_key(key: &str) -> bool {
    !key.is_empty() && !key.contains(['/', '\\']) && !key.contains("..")
}

fn has_content_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| EXTENSIONS.iter().any(|ext| e.eq_ignore_ascii_case(ext)))
        .unwrap_or(false)
}

/// Newest first; undated (or unparseable) posts go last, ties by slug.
fn compare_by_date(a: &BlogMeta, b: &BlogMeta) -> Ordering {
    let da = a.date.as_deref().and_then(parse_date);
    let db = b.date.as_deref().and_then(parse_date);
    let by_date = match (da, db) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };
    by_date.then_with(|| a.slug.cmp(&b.slug))
}

pub struct BlogStore {
    dir: PathBuf,
    cache: ContentCache<Blog>,
}

impl BlogStore {
    pub fn new(dir: impl Into<PathBuf>, policy: CachePolicy) -> Self {
        Self {
            dir: dir.into(),
            cache: ContentCache::new(policy),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    async fn load_file(&self, path: &Path, key: &str) -> Result<Blog, ContentError> {
        let raw = tokio::fs::read_to_string(path).await.map_err(|source| ContentError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let (mut meta, content) = parse_front_matter(&raw)?;
        if meta.slug.trim().is_empty() {
            meta.slug = key.to_string();
        }
        Ok(Blog { meta, content })
    }

    pub async fn get(&self, slug: &str) -> Result<Blog, ContentError> {
        let key = normalize_slug(slug);
        if !is_safe_key(key) {
            return Err(ContentError::NotFound(slug.to_string()));
        }
        if let Some(blog) = self.cache.check(key).await {
            debug!("Blog cache hit: {}", key);
            return Ok(blog);
        }

        for ext in EXTENSIONS {
            let path = self.dir.join(format!("{}.{}", key, ext));
            match self.load_file(&path, key).await {
                Ok(blog) => {
                    self.cache.update(key, blog.clone()).await;
                    return Ok(blog);
                }
                Err(ContentError::Io { source, .. }) if source.kind() == ErrorKind::NotFound => {
                    continue;
                }
                Err(e) => {
                    return Err(e);
                }
            }
        }
        Err(ContentError::NotFound(key.to_string()))
    }

    pub async fn list(&self) -> Result<Vec<BlogMeta>, ContentError> {
        let mut entries = tokio::fs::read_dir(&self.dir).await.map_err(|source| ContentError::Io {
            path: self.dir.display().to_string(),
            source,
        })?;

        let mut blogs = Vec::new();
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => {
                    break;
                }
                Err(e) => {
                    warn!("Failed to read entry in {}: {}", self.dir.display(), e);
                    break;
                }
            };
            let path = entry.path();
            if !has_content_extension(&path) {
                continue;
            }
            let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let key = normalize_slug(file_name).to_string();

            if let Some(blog) = self.cache.check(&key).await {
                blogs.push(blog.meta);
                continue;
            }
            match self.load_file(&path, &key).await {
                Ok(blog) => {
                    blogs.push(blog.meta.clone());
                    self.cache.update(&key, blog).await;
                }
                Err(e) => warn!("Failed to read blog {}: {}", file_name, e),
            }
        }

        blogs.sort_by(compare_by_date);
        info!("Listed {} blog posts from {}", blogs.len(), self.dir.display());
        Ok(blogs)
    }

    pub async fn invalidate(&self, slug: &str) {
        self.cache.invalidate(normalize_slug(slug)).await;
    }
}
