use log::{ info, warn };
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

pub const DEFAULT_CONTEXT_PATH: &str = "content/context.md";

pub const DEFAULT_CONTEXT: &str = "You are an AI assistant for a personal portfolio website. \
You help visitors learn about the site owner's background, skills, projects and experience.

# How to Respond
- Be friendly, concise, and helpful
- Keep responses relatively brief (2-4 sentences for most questions)
- No profile details are available, so do not invent names, employers or projects
- Point visitors to the portfolio pages and mention you can only share what's publicly available there
- Maintain a warm but professional tone";

#[derive(Debug, Error)]
pub enum ContextError {
    #[error("failed to read context file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("context file '{0}' is empty")]
    Empty(String),
}

/// Text describing the site owner, prepended to every live prompt. Loaded
/// once at startup and shared read-only.
#[derive(Debug, Clone)]
pub struct StaticContext(Arc<str>);

impl StaticContext {
    pub fn new(text: impl Into<String>) -> Self {
        Self(Arc::from(text.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for StaticContext {
    fn default() -> Self {
        Self::new(DEFAULT_CONTEXT)
    }
}

pub fn load_context<P: AsRef<Path>>(path: P) -> Result<StaticContext, ContextError> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|source| ContextError::Io {
        path: path.display().to_string(),
        source,
    })?;
    if text.trim().is_empty() {
        return Err(ContextError::Empty(path.display().to_string()));
    }
    info!("Loaded static context from '{}' ({} bytes)", path.display(), text.len());
    Ok(StaticContext::new(text))
}

pub fn load_or_default(path: Option<&str>) -> Result<StaticContext, ContextError> {
    match path.filter(|p| !p.trim().is_empty()) {
        Some(p) => {
            match load_context(p) {
                // The default location is optional; an explicit one is not.
                Err(ContextError::Io { source, .. }) if
                    p == DEFAULT_CONTEXT_PATH &&
                    source.kind() == ErrorKind::NotFound
                => {
                    warn!("No context file at '{}'; using the built-in assistant context", p);
                    Ok(StaticContext::default())
                }
                other => other,
            }
        }
        None => {
            warn!("CONTEXT_PATH not set; using the built-in assistant context");
            Ok(StaticContext::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_context_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "About the owner").unwrap();
        let ctx = load_context(file.path()).unwrap();
        assert_eq!(ctx.as_str(), "About the owner");
    }

    #[test]
    fn empty_file_is_an_error() {
        let file = tempfile::NamedTempFile::new().unwrap();
        assert!(matches!(load_context(file.path()), Err(ContextError::Empty(_))));
    }

    #[test]
    fn bundled_owner_context_loads() {
        let ctx = load_context(concat!(env!("CARGO_MANIFEST_DIR"), "/content/context.md")).unwrap();
        for section in [
            "# About",
            "# Contact & Social",
            "# Work Experience",
            "# Projects",
            "# Technical Skills",
            "# How to Respond",
        ] {
            assert!(ctx.as_str().contains(section), "missing section {}", section);
        }
    }

    #[test]
    fn built_in_context_does_not_point_at_missing_text() {
        assert!(!DEFAULT_CONTEXT.contains("context above"));
    }

    #[test]
    fn missing_path_falls_back_to_default() {
        let ctx = load_or_default(None).unwrap();
        assert_eq!(ctx.as_str(), DEFAULT_CONTEXT);
        assert!(load_or_default(Some("/definitely/not/here.txt")).is_err());
    }
}
