pub mod envelope;
pub mod errors;
pub mod events;
pub mod post;

pub use envelope::{
    ChannelMessage, DEFAULT_HISTORY_COUNT, HistoryRequest, HistoryResponse, SubmitPostRequest,
};
pub use errors::{PostError, PostResult};
pub use events::{ShardEvent, TimelineChange};
pub use post::{ArchiveType, Post, PostId, PostRecord, SequenceId, ShardId};
