//! Gateway seam - types and traits the platform gateway implements.
//!
//! The gateway/session (connect, authenticate, dispatch) lives outside this
//! crate. It delivers [`MessageEvent`]s to the [`EventHandler`] and
//! implements [`MetadataClient`] over the platform's detail-fetch calls.
//!
//! [`EventHandler`]: crate::handler::EventHandler

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::FetchError;

/// Author attributes attached to an inbound message.
#[derive(Debug, Clone)]
pub struct Author {
    pub id: String,
    pub username: String,
    pub discriminator: String,
    pub is_bot: bool,
}

/// One inbound message-create event as dispatched by the gateway.
#[derive(Debug, Clone)]
pub struct MessageEvent {
    pub channel_id: String,
    pub author: Author,
    pub content: String,
    /// Timestamp assigned by the platform, not by this process.
    pub timestamp: DateTime<Utc>,
}

/// Channel detail fetch result.
#[derive(Debug, Clone)]
pub struct ChannelDetails {
    pub guild_id: String,
    pub name: String,
}

/// Guild detail fetch result.
#[derive(Debug, Clone)]
pub struct GuildDetails {
    pub name: String,
    pub region: String,
    pub owner_id: String,
    pub member_count: u64,
}

/// Remote metadata fetch calls, implemented by the gateway client.
///
/// Every call is expensive (a round trip to the platform); the handler only
/// reaches for these through the cache.
#[async_trait]
pub trait MetadataClient: Send + Sync {
    async fn channel_details(&self, channel_id: &str) -> Result<ChannelDetails, FetchError>;

    async fn guild_details(&self, guild_id: &str) -> Result<GuildDetails, FetchError>;
}
