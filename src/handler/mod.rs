//! Event handler - per-event orchestration.
//!
//! Receives one inbound event, refreshes the channel cache (which chains
//! into the guild cache), assembles a log record from the event plus cached
//! metadata, and hands it to the chat log. Enrichment failures degrade to a
//! partial record; they never discard the event.

use std::sync::Arc;

use futures::FutureExt;
use tracing::{debug, warn};

use crate::chatlog::{ChatLog, LogEntry};
use crate::error::Result;
use crate::gateway::{MessageEvent, MetadataClient};
use crate::metacache::{AttrMap, LookupParams, MetaCache, MetaLookup};

/// Record type for message-create events.
const TYPE_MESSAGE: &str = "MESSAGE";

/// Orchestrates enrichment and recording for inbound events.
///
/// Holds the process-lifetime services: one cache per entity kind, the chat
/// log, and the gateway's metadata client. Cheap to share via `Arc`;
/// `handle_message` takes `&self` and may run concurrently.
pub struct EventHandler {
    channels: Arc<MetaCache>,
    guilds: Arc<MetaCache>,
    chat_log: Arc<ChatLog>,
    client: Arc<dyn MetadataClient>,
}

impl EventHandler {
    pub fn new(
        channels: Arc<MetaCache>,
        guilds: Arc<MetaCache>,
        chat_log: Arc<ChatLog>,
        client: Arc<dyn MetadataClient>,
    ) -> Self {
        Self {
            channels,
            guilds,
            chat_log,
            client,
        }
    }

    /// Enrich and record one message-create event.
    ///
    /// Returns [`Error::Backpressure`] or [`Error::LogClosed`] from the
    /// append; enrichment failures are logged and degrade the record
    /// instead of failing the call.
    ///
    /// [`Error::Backpressure`]: crate::error::Error::Backpressure
    /// [`Error::LogClosed`]: crate::error::Error::LogClosed
    pub async fn handle_message(&self, event: &MessageEvent) -> Result<()> {
        debug!(
            channel = %event.channel_id,
            author = %event.author.username,
            content = %event.content.chars().take(30).collect::<String>(),
            "handling message event"
        );

        let lookup = self.channel_lookup(event.channel_id.clone());
        if let Err(e) = self.channels.check_and_update(&event.channel_id, lookup).await {
            warn!(
                channel = %event.channel_id,
                error = %e,
                "metadata enrichment degraded, recording partial entry"
            );
        }

        let mut entry = LogEntry::new()
            .with("Timestamp", LogEntry::encode_timestamp(event.timestamp))
            .with("Type", TYPE_MESSAGE)
            .with("ChannelID", event.channel_id.as_str())
            .with("AuthorID", event.author.id.as_str())
            .with("AuthorUsername", event.author.username.as_str())
            .with("Content", event.content.as_str());
        if event.author.is_bot {
            entry.insert("AuthorIsBot", "true");
        }
        if let Some(meta) = self.channels.retrieve(&event.channel_id) {
            if let Some(guild_id) = meta.get("GuildID") {
                entry.insert("GuildID", guild_id.as_str());
            }
            if let Some(name) = meta.get("Name") {
                entry.insert("ChannelName", name.as_str());
            }
        }

        self.chat_log.add_entry(entry).await
    }

    /// Build the channel lookup. Its fetch resolves the channel via the
    /// gateway client and chains a guild lookup on the dependent cache
    /// before resolving, so the guild entry is observable as soon as the
    /// channel entry is.
    fn channel_lookup(&self, channel_id: String) -> MetaLookup {
        let client = Arc::clone(&self.client);
        let guilds = Arc::clone(&self.guilds);
        MetaLookup::new(
            LookupParams::Channel {
                channel_id: channel_id.clone(),
            },
            move |_params| {
                let client = Arc::clone(&client);
                let guilds = Arc::clone(&guilds);
                let channel_id = channel_id.clone();
                async move {
                    let details = client.channel_details(&channel_id).await?;

                    let guild_lookup = guild_lookup(Arc::clone(&client), details.guild_id.clone());
                    if let Err(e) = guilds.check_and_update(&details.guild_id, guild_lookup).await {
                        // The channel still resolved; record what we have.
                        warn!(guild = %details.guild_id, error = %e, "chained guild lookup failed");
                    }

                    let mut attrs = AttrMap::new();
                    attrs.insert("GuildID".to_string(), details.guild_id);
                    attrs.insert("Name".to_string(), details.name);
                    Ok(attrs)
                }
                .boxed()
            },
        )
    }
}

/// Build a guild lookup over the gateway client.
fn guild_lookup(client: Arc<dyn MetadataClient>, guild_id: String) -> MetaLookup {
    MetaLookup::new(
        LookupParams::Guild {
            guild_id: guild_id.clone(),
        },
        move |_params| {
            let client = Arc::clone(&client);
            let guild_id = guild_id.clone();
            async move {
                let details = client.guild_details(&guild_id).await?;
                let mut attrs = AttrMap::new();
                attrs.insert("Name".to_string(), details.name);
                attrs.insert("Region".to_string(), details.region);
                attrs.insert("OwnerID".to_string(), details.owner_id);
                attrs.insert("MemberCount".to_string(), details.member_count.to_string());
                Ok(attrs)
            }
            .boxed()
        },
    )
}

impl std::fmt::Debug for EventHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventHandler")
            .field("channels", &self.channels)
            .field("guilds", &self.guilds)
            .field("chat_log", &self.chat_log)
            .finish_non_exhaustive()
    }
}
