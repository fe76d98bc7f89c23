//! Chronicle - Chat event enrichment and durable logging core.
//!
//! Chronicle receives inbound chat-platform events, enriches them with
//! metadata the event itself does not carry (channel name, guild, author
//! attributes) and durably records every event. Remote metadata fetches are
//! expensive, so they go through a self-populating TTL cache instead of
//! being repeated per event.
//!
//! ## Architecture
//!
//! - `config` - Environment configuration
//! - `error` - Crate-wide error types
//! - `metacache` - TTL read-through cache with single-flight population
//! - `chatlog` - Durable ordered append log (file or queue backend)
//! - `gateway` - Types and traits implemented by the platform gateway
//! - `handler` - Per-event orchestration (enrich, assemble, append)
//!
//! The platform gateway/session, CLI parsing, and process lifecycle are
//! external collaborators: a gateway binary loads [`Config`], constructs the
//! caches and the [`ChatLog`] once at startup, implements
//! [`MetadataClient`], and feeds [`MessageEvent`]s into an [`EventHandler`].

pub mod chatlog;
pub mod config;
pub mod error;
pub mod gateway;
pub mod handler;
pub mod metacache;

pub use chatlog::{ChatLog, LogEntry, LogSink, SinkConfig, SinkError};
pub use config::Config;
pub use error::{Error, FetchError, Result};
pub use gateway::{Author, ChannelDetails, GuildDetails, MessageEvent, MetadataClient};
pub use handler::EventHandler;
pub use metacache::{LookupParams, MetaCache, MetaLookup};
