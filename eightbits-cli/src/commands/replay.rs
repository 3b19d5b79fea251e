//! Replays a shard's event script through the post sync engine.
//!
//! A script is a JSON-lines file. Each line is one step tagged by `step`:
//!
//! ```text
//! {"step": "post", "post": {"postId": "a", "sequenceId": 12, "body": "hi"}}
//! {"step": "submit", "body": "hello", "nickname": "ada", "postId": "mine"}
//! {"step": "ack", "post": {"postId": "mine", "sequenceId": 13}}
//! {"step": "history", "posts": [{"postId": "b", "sequenceId": 11}]}
//! {"step": "scroll", "offset": 0}
//! {"step": "reconnect"}
//! ```

use anyhow::{Context, Result, bail};
use chrono::Utc;
use serde::Deserialize;
use shared::config::SyncConfig;
use shared::models::{
    ArchiveType, HistoryRequest, Post, PostId, PostRecord, ShardEvent, ShardId, SubmitPostRequest,
};
use shared::sync::{BackfillState, PostSurface, PostSync, ScrollGeometry, ShardBus, SimulatedSurface};
use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tracing::{debug, info};

/// One line of a replay script.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "step", rename_all = "camelCase")]
pub enum ScriptStep {
    /// A post pushed over the live channel.
    Post { post: PostRecord },
    /// The local user writes a post.
    #[serde(rename_all = "camelCase")]
    Submit {
        body: String,
        #[serde(rename = "type", default = "default_submit_type")]
        archive_type: String,
        #[serde(default)]
        nickname: Option<String>,
        #[serde(default)]
        post_id: Option<String>,
        #[serde(default)]
        new_topic: Option<String>,
    },
    /// The server's echo of a local post.
    Ack { post: PostRecord },
    /// A synthesized roster or system post.
    Roster { post: PostRecord },
    /// A history page delivered by hand, for scripts without an archive.
    /// It answers the outstanding request and is ignored when there is none.
    History { posts: Vec<PostRecord> },
    /// The reader scrolled to `offset`.
    Scroll { offset: i32 },
    /// The channel came back after an outage.
    Reconnect,
    /// The outstanding history request failed.
    HistoryFailed,
    /// The reader asked to retry the failed history request.
    Retry,
}

fn default_submit_type() -> String {
    ArchiveType::Chat.as_str().to_string()
}

/// How to run a replay.
#[derive(Debug, Clone)]
pub struct ReplayOptions {
    pub shard: ShardId,
    pub archive: Option<PathBuf>,
    pub viewport: i32,
    pub row_height: i32,
    pub json: bool,
}

/// What a replay ended with.
#[derive(Debug)]
pub struct ReplayReport {
    pub requests: Vec<HistoryRequest>,
    pub posts: Vec<Post>,
    pub backfill: BackfillState,
    pub geometry: ScrollGeometry,
}

/// Stored posts of a shard, answering history requests the way the
/// server's `list_posts` does: at most `count` posts of the inclusive window
/// ending at `end`, newest first.
#[derive(Debug, Default)]
pub struct Archive {
    posts: Vec<Post>,
}

impl Archive {
    /// Keeps the sequenced posts of `records`, ordered by sequence id.
    ///
    /// # Errors
    /// Fails on the first record that does not parse.
    pub fn from_records(records: Vec<PostRecord>, shard: &ShardId) -> Result<Self> {
        let mut posts = records
            .into_iter()
            .map(|record| Post::from_record(record, shard))
            .collect::<Result<Vec<_>, _>>()?;
        posts.retain(|post| post.sequence_id().is_some());
        posts.sort_by_key(Post::sequence_id);
        Ok(Self { posts })
    }

    fn highest(&self) -> u64 {
        self.posts
            .last()
            .and_then(Post::sequence_id)
            .map_or(0, |sequence| sequence.get())
    }

    /// Posts answering `request`, newest first.
    #[must_use]
    pub fn page(&self, request: &HistoryRequest) -> Vec<Post> {
        let window = request.window().unwrap_or_else(|| {
            let end = self.highest();
            end.saturating_sub(u64::from(request.count)).max(1)..=end
        });
        self.posts
            .iter()
            .rev()
            .filter(|post| {
                post.sequence_id()
                    .is_some_and(|sequence| window.contains(&sequence.get()))
            })
            .take(usize::try_from(request.count).unwrap_or(usize::MAX))
            .cloned()
            .collect()
    }
}

fn parse_post(record: PostRecord, shard: &ShardId) -> Result<Post> {
    Ok(Post::from_record(record, shard)?)
}

fn submitted_post(
    body: String,
    archive_type: &str,
    nickname: Option<String>,
    post_id: Option<String>,
    new_topic: Option<String>,
    shard: &ShardId,
) -> Result<Post> {
    let mut request = SubmitPostRequest::new(shard.clone(), ArchiveType::from(archive_type), body)?;
    if let Some(post_id) = post_id {
        request.post_id = PostId::new(post_id)?;
    }
    if let Some(topic) = new_topic {
        request = request.with_new_topic(ShardId::from(topic));
    }
    let nickname = nickname.unwrap_or_else(|| "me".to_string());
    Ok(request.optimistic_post(&nickname, Utc::now().timestamp_millis()))
}

/// Runs `script` against a fresh session and returns where it ended up.
///
/// # Errors
/// Fails on the first step that does not parse or carries an invalid post.
pub fn run_script(
    script: &str,
    options: &ReplayOptions,
    archive: Option<Archive>,
    config: &SyncConfig,
) -> Result<ReplayReport> {
    let shard = options.shard.clone();
    let bus = Rc::new(ShardBus::new(shard.clone()));
    let surface = SimulatedSurface::new(options.viewport, options.row_height);
    let sync = PostSync::attach(Rc::clone(&bus), surface, config);

    let requests = Rc::new(RefCell::new(Vec::new()));
    let log = Rc::clone(&requests);
    let weak_bus = Rc::downgrade(&bus);
    bus.subscribe(move |event| {
        let ShardEvent::RequestHistoricalPosts(request) = event else {
            return;
        };
        info!(start = request.start, end = request.end, count = request.count, "history requested");
        log.borrow_mut().push(*request);
        if let (Some(archive), Some(bus)) = (archive.as_ref(), weak_bus.upgrade()) {
            bus.publish(ShardEvent::HistoricalPostsReceived {
                generation: request.generation,
                posts: archive.page(request),
            });
        }
    });

    sync.start();

    for (index, line) in script.lines().enumerate() {
        let line_no = index + 1;
        if line.trim().is_empty() {
            continue;
        }
        let step: ScriptStep = serde_json::from_str(line)
            .with_context(|| format!("line {line_no}: not a valid script step"))?;
        debug!(line = line_no, ?step, "replaying");
        apply(step, &sync, &bus, &shard).with_context(|| format!("line {line_no}"))?;
    }

    let posts = sync.snapshot();
    let backfill = sync.backfill_state();
    let geometry = sync.with_surface(|surface| surface.geometry());
    let requests = requests.borrow().clone();
    Ok(ReplayReport {
        requests,
        posts,
        backfill,
        geometry,
    })
}

fn apply(
    step: ScriptStep,
    sync: &PostSync<SimulatedSurface>,
    bus: &ShardBus,
    shard: &ShardId,
) -> Result<()> {
    match step {
        ScriptStep::Post { post } => bus.publish(ShardEvent::PostReceived(parse_post(post, shard)?)),
        ScriptStep::Submit {
            body,
            archive_type,
            nickname,
            post_id,
            new_topic,
        } => {
            let post = submitted_post(body, &archive_type, nickname, post_id, new_topic, shard)?;
            bus.publish(ShardEvent::SubmittedPostSent(post));
        }
        ScriptStep::Ack { post } => {
            bus.publish(ShardEvent::SubmittedPostReceived(parse_post(post, shard)?));
        }
        ScriptStep::Roster { post } => {
            bus.publish(ShardEvent::RosterReceived(parse_post(post, shard)?));
        }
        ScriptStep::History { posts } => {
            let posts = posts
                .into_iter()
                .map(|record| parse_post(record, shard))
                .collect::<Result<Vec<_>>>()?;
            bus.publish(ShardEvent::HistoricalPostsReceived {
                generation: outstanding(sync),
                posts,
            });
        }
        ScriptStep::Scroll { offset } => {
            sync.with_surface(|surface| surface.set_offset(offset));
            sync.on_scroll();
        }
        ScriptStep::Reconnect => bus.publish(ShardEvent::ConnectionReestablishing),
        ScriptStep::HistoryFailed => bus.publish(ShardEvent::HistoryRequestFailed {
            generation: outstanding(sync),
        }),
        ScriptStep::Retry => sync.retry_backfill(),
    }
    Ok(())
}

/// Generation of the request a scripted reply answers; `0` matches none.
fn outstanding(sync: &PostSync<SimulatedSurface>) -> u64 {
    sync.backfill_state().in_flight().unwrap_or_default()
}

fn load_archive(path: &Path, shard: &ShardId) -> Result<Archive> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read archive {}", path.display()))?;
    let records: Vec<PostRecord> = serde_json::from_str(&content)
        .with_context(|| format!("archive {} is not a JSON array of posts", path.display()))?;
    Archive::from_records(records, shard)
}

fn describe(post: &Post) -> String {
    let sequence = post
        .sequence_id()
        .map_or_else(|| "-".to_string(), |sequence| sequence.to_string());
    let author = post.nickname().unwrap_or("");
    format!(
        "{sequence:>6}  {:<14} {}  {author}: {}",
        post.archive_type().as_str(),
        post.post_id(),
        post.body()
    )
}

/// Replays the script at `path` and prints the resulting timeline.
///
/// # Errors
/// Fails when the script or archive cannot be read, or a step is invalid.
pub fn replay(path: &Path, options: &ReplayOptions, config: &SyncConfig) -> Result<()> {
    if options.viewport <= 0 || options.row_height <= 0 {
        bail!("viewport and row height must be positive");
    }
    let script = fs::read_to_string(path)
        .with_context(|| format!("failed to read script {}", path.display()))?;
    let archive = options
        .archive
        .as_deref()
        .map(|archive| load_archive(archive, &options.shard))
        .transpose()?;

    let report = run_script(&script, options, archive, config)?;

    if options.json {
        let records: Vec<PostRecord> = report.posts.iter().map(Post::to_record).collect();
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    for request in &report.requests {
        println!(
            "request start={} end={} count={}",
            request.start, request.end, request.count
        );
    }
    for post in &report.posts {
        println!("{}", describe(post));
    }
    println!(
        "{} posts, backfill {:?}, offset {}/{}",
        report.posts.len(),
        report.backfill,
        report.geometry.offset,
        report.geometry.max_offset()
    );
    Ok(())
}
