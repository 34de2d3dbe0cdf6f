pub mod api;

use crate::cli::Args;
use crate::config::context::StaticContext;
use crate::content::cache::CachePolicy;
use crate::content::BlogStore;
use crate::llm::chat::{ new_client, ChatClient, ChatError };
use crate::relay::Relay;
use log::{ info, warn };
use std::error::Error;
use std::net::SocketAddr;
use std::sync::Arc;

pub struct Server {
    addr: SocketAddr,
    state: api::AppState,
    args: Args,
}

impl Server {
    pub fn new(args: Args, context: StaticContext) -> Result<Self, Box<dyn Error + Send + Sync>> {
        let addr = args.server_addr.parse::<SocketAddr>()?;

        let client: Option<Arc<dyn ChatClient>> = match new_client(&args.llm_config()) {
            Ok(client) => {
                info!(
                    "Chat client configured: Model={}, BaseURL={}",
                    client.get_model(),
                    client.get_base_url()
                );
                Some(client)
            }
            Err(ChatError::MissingApiKey) => None,
            Err(e) => {
                return Err(Box::new(e));
            }
        };

        let policy = CachePolicy::new(args.blog_cache_capacity, args.blog_cache_ttl_secs);
        let blogs = BlogStore::new(&args.blog_dir, policy);
        if !blogs.dir().is_dir() {
            warn!("Blog directory '{}' does not exist; blog routes will return errors", args.blog_dir);
        }

        let state = api::AppState {
            relay: Relay::new(client, context, args.chat_rate_limit_per_second),
            blogs: Arc::new(blogs),
            site_url: args.site_url.clone(),
        };

        Ok(Self { addr, state, args })
    }

    pub async fn run(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        api::start_http_server(self.addr, self.state.clone(), &self.args).await
    }
}
