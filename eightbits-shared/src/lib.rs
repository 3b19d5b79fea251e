#![cfg_attr(not(test), forbid(unsafe_code))]
#![deny(clippy::pedantic)]

//! Shared building blocks for the 8-bits chat client.
//!
//! `models` holds the post record and its wire envelopes, `sync` holds the
//! per-shard event bus and the engine that keeps a shard's posts ordered,
//! de-duplicated and scrolled correctly, and `config` holds the tunables.

pub mod config;
pub mod models;
pub mod sync;

pub use config::SyncConfig;
pub use models::{
    ArchiveType, ChannelMessage, HistoryRequest, HistoryResponse, Post, PostError, PostId,
    PostRecord, SequenceId, ShardEvent, ShardId, SubmitPostRequest, TimelineChange,
};
pub use sync::{
    BackfillGate, BackfillState, MergeOutcome, PageOutcome, PostIndex, PostSurface, PostSync,
    Reconciliation, ScrollGeometry, ShardBus, SimulatedSurface, SubscriptionId, Timeline,
};
