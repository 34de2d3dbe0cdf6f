pub mod cli;
pub mod config;
pub mod content;
pub mod llm;
pub mod models;
pub mod relay;
pub mod server;
pub mod widget;

use cli::Args;
use log::info;
use server::Server;
use std::error::Error;

pub async fn run(args: Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    info!("--- Core Configuration ---");
    info!("Server Address: {}", args.server_addr);
    info!("Chat Model: {}", args.llm_config().model());
    info!("Chat Base URL: {}", args.llm_config().base_url());
    info!("Upstream Credential: {}", if args.llm_config().has_api_key() { "set" } else { "MISSING" });
    info!("Context Path: {}", args.context_path.as_deref().unwrap_or("(built-in)"));
    info!("Chat Rate Limit: {}/s", args.chat_rate_limit_per_second);
    info!("Blog Directory: {}", args.blog_dir);
    info!("Blog Cache: capacity={} ttl={}s", args.blog_cache_capacity, args.blog_cache_ttl_secs);
    info!("Site URL: {}", args.site_url);
    info!("TLS Enabled: {}", args.enable_tls);
    info!("-------------------------");

    let context = config::context::load_or_default(args.context_path.as_deref())?;
    let server = Server::new(args, context)?;
    server.run().await?;

    Ok(())
}
