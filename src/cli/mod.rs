use clap::Parser;

use crate::config::context::DEFAULT_CONTEXT_PATH;
use crate::llm::LlmConfig;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    // --- Chat LLM Provider Args ---
    /// API Key for the Gemini API. Requests to /api/chat fail with a configuration error while unset.
    #[arg(long, env = "GEMINI_API_KEY")]
    pub gemini_api_key: Option<String>,

    /// Model name for chat completion (e.g., gemini-2.5-flash)
    #[arg(long, env = "CHAT_MODEL")] // No default, rely on adapter defaults if None
    pub chat_model: Option<String>,

    /// Base URL for the Gemini API (e.g., https://generativelanguage.googleapis.com/v1beta)
    #[arg(long, env = "CHAT_BASE_URL")]
    pub chat_base_url: Option<String>,

    /// Path to a text file describing the site owner, prepended to every chat prompt.
    /// A built-in context is used when the default file is absent.
    #[arg(long, env = "CONTEXT_PATH", default_value = DEFAULT_CONTEXT_PATH)]
    pub context_path: Option<String>,

    /// Maximum chat requests per second accepted across all clients.
    #[arg(long, env = "CHAT_RATE_LIMIT_PER_SECOND", default_value = "10")]
    pub chat_rate_limit_per_second: u32,

    // --- Content Args ---
    /// Directory containing blog posts (.md / .mdx with YAML front matter).
    #[arg(long, env = "BLOG_DIR", default_value = "content/blog")]
    pub blog_dir: String,

    /// Number of parsed posts kept in memory.
    #[arg(long, env = "BLOG_CACHE_CAPACITY", default_value = "128")]
    pub blog_cache_capacity: usize,

    /// Seconds before a cached post is re-read from disk. 0 means never.
    #[arg(long, env = "BLOG_CACHE_TTL_SECS", default_value = "300")]
    pub blog_cache_ttl_secs: u64,

    /// Public base URL used for sitemap entries.
    #[arg(long, env = "SITE_URL", default_value = "http://localhost:4000")]
    pub site_url: String,

    // --- General App Args ---
    /// Host address and port for the server to listen on.
    #[arg(long, env = "SERVER_ADDR", default_value = "127.0.0.1:4000")]
    pub server_addr: String,

    /// Optional path to the TLS certificate file (PEM format). Requires --tls-key-path.
    #[arg(long, env = "TLS_CERT_PATH")]
    pub tls_cert_path: Option<String>,

    /// Optional path to the TLS private key file (PEM format). Requires --tls-cert-path.
    #[arg(long, env = "TLS_KEY_PATH")]
    pub tls_key_path: Option<String>,

    #[arg(long, env = "ENABLE_TLS", default_value = "false")]
    pub enable_tls: bool,
}

impl Args {
    pub fn llm_config(&self) -> LlmConfig {
        LlmConfig {
            api_key: self.gemini_api_key.clone().filter(|k| !k.trim().is_empty()),
            completion_model: self.chat_model.clone(),
            base_url: self.chat_base_url.clone(),
        }
    }
}
