//! Browser side of a shard's bus: the server-sent channel feeds live posts
//! in, and history requests are answered through the RPC client.

use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::rc::Rc;

use chrono::Utc;
use shared::models::{ChannelMessage, PostId, ShardEvent, SubmitPostRequest};
use shared::sync::{ShardBus, SubscriptionId};
use wasm_bindgen::{JsCast, JsValue, closure::Closure};
use wasm_bindgen_futures::spawn_local;
use web_sys::{Event, EventSource, MessageEvent, console};

use crate::api::{ApiError, EightBitsClient};

/// Local posts sent to the server and not yet echoed back on the channel.
#[derive(Clone, Debug, Default)]
struct PendingPosts(Rc<RefCell<HashSet<PostId>>>);

impl PendingPosts {
    fn insert(&self, post_id: PostId) {
        self.0.borrow_mut().insert(post_id);
    }

    /// Whether `post_id` was pending; it no longer is afterwards.
    fn acknowledge(&self, post_id: &PostId) -> bool {
        self.0.borrow_mut().remove(post_id)
    }

    /// Gives up on a post the server never accepted.
    fn abandon(
        &self,
        post_id: PostId,
        err: ApiError,
        on_failure: impl FnOnce(PostId, ApiError),
    ) {
        self.acknowledge(&post_id);
        on_failure(post_id, err);
    }
}

/// Live connection of one shard.
///
/// Dropping it closes the channel and stops answering history requests.
pub struct ChannelTransport {
    bus: Rc<ShardBus>,
    client: EightBitsClient,
    event_source: EventSource,
    pending: PendingPosts,
    subscription: SubscriptionId,
    _on_message: Closure<dyn FnMut(MessageEvent)>,
    _on_open: Closure<dyn FnMut(Event)>,
    _on_error: Closure<dyn FnMut(Event)>,
}

/// Builds the channel URL for `bus`'s shard.
pub fn channel_url(base: &str, bus: &ShardBus) -> String {
    let separator = if base.contains('?') { '&' } else { '?' };
    format!("{base}{separator}shard={}", bus.shard_id())
}

impl ChannelTransport {
    /// Opens the channel at `channel_base` and starts serving `bus`.
    pub fn connect(
        bus: Rc<ShardBus>,
        client: EightBitsClient,
        channel_base: &str,
    ) -> Result<Self, JsValue> {
        let event_source = EventSource::new(&channel_url(channel_base, &bus))?;
        let pending = PendingPosts::default();

        let on_message = {
            let bus = Rc::downgrade(&bus);
            let pending = pending.clone();
            Closure::<dyn FnMut(MessageEvent)>::wrap(Box::new(move |event: MessageEvent| {
                let (Some(bus), Some(data)) = (bus.upgrade(), event.data().as_string()) else {
                    return;
                };
                match ChannelMessage::decode(&data, bus.shard_id()) {
                    Ok(posts) => {
                        for post in posts {
                            let acknowledged = pending.acknowledge(post.post_id());
                            bus.publish(if acknowledged {
                                ShardEvent::SubmittedPostReceived(post)
                            } else {
                                ShardEvent::PostReceived(post)
                            });
                        }
                    }
                    Err(err) => {
                        console::error_1(&format!("Dropping channel message: {err}").into());
                    }
                }
            }))
        };
        event_source.set_onmessage(Some(on_message.as_ref().unchecked_ref()));

        // The browser reconnects on its own; posts written while the channel
        // was down are only recovered by rebuilding the timeline.
        let lost = Rc::new(Cell::new(false));
        let on_error = {
            let lost = Rc::clone(&lost);
            Closure::<dyn FnMut(Event)>::wrap(Box::new(move |_: Event| {
                if !lost.replace(true) {
                    console::log_1(&"Channel lost, waiting for reconnect".into());
                }
            }))
        };
        event_source.set_onerror(Some(on_error.as_ref().unchecked_ref()));

        let on_open = {
            let bus = Rc::downgrade(&bus);
            Closure::<dyn FnMut(Event)>::wrap(Box::new(move |_: Event| {
                if lost.replace(false)
                    && let Some(bus) = bus.upgrade()
                {
                    bus.publish(ShardEvent::ConnectionReestablishing);
                }
            }))
        };
        event_source.set_onopen(Some(on_open.as_ref().unchecked_ref()));

        let subscription = {
            let weak_bus = Rc::downgrade(&bus);
            let client = client.clone();
            bus.subscribe(move |event| {
                let ShardEvent::RequestHistoricalPosts(request) = event else {
                    return;
                };
                let request = *request;
                let client = client.clone();
                let weak_bus = weak_bus.clone();
                spawn_local(async move {
                    let Some(shard) = weak_bus.upgrade().map(|bus| bus.shard_id().clone()) else {
                        return;
                    };
                    let result = client.list_posts(&shard, &request).await;
                    let Some(bus) = weak_bus.upgrade() else {
                        return;
                    };
                    let generation = request.generation;
                    match result {
                        Ok(posts) => {
                            bus.publish(ShardEvent::HistoricalPostsReceived { generation, posts });
                        }
                        Err(err) => {
                            console::error_1(&format!("Failed to load older posts: {err}").into());
                            bus.publish(ShardEvent::HistoryRequestFailed { generation });
                        }
                    }
                });
            })
        };

        Ok(Self {
            bus,
            client,
            event_source,
            pending,
            subscription,
            _on_message: on_message,
            _on_open: on_open,
            _on_error: on_error,
        })
    }

    /// Shows `request` immediately as the local user's post and sends it.
    ///
    /// `on_failure` runs if the server rejects the post or cannot be reached;
    /// the post is then no longer expected back on the channel.
    pub fn submit(
        &self,
        request: SubmitPostRequest,
        nickname: &str,
        on_failure: impl FnOnce(PostId, ApiError) + 'static,
    ) {
        let post = request.optimistic_post(nickname, Utc::now().timestamp_millis());
        self.pending.insert(request.post_id.clone());
        self.bus.publish(ShardEvent::SubmittedPostSent(post));

        let client = self.client.clone();
        let pending = self.pending.clone();
        spawn_local(async move {
            if let Err(err) = client.submit_post(&request).await {
                console::error_1(&format!("Failed to send post: {err}").into());
                pending.abandon(request.post_id, err, on_failure);
            }
        });
    }

}

impl Drop for ChannelTransport {
    fn drop(&mut self) {
        self.event_source.close();
        self.event_source.set_onmessage(None);
        self.event_source.set_onopen(None);
        self.event_source.set_onerror(None);
        self.bus.unsubscribe(self.subscription);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::models::ShardId;

    #[test]
    fn pending_posts_are_acknowledged_once() {
        let pending = PendingPosts::default();
        let mine = PostId::new("mine").unwrap();
        pending.insert(mine.clone());
        let shared = pending.clone();

        assert!(shared.acknowledge(&mine));
        assert!(!pending.acknowledge(&mine));
    }

    #[test]
    fn rejected_post_is_no_longer_pending() {
        let pending = PendingPosts::default();
        let mine = PostId::new("mine").unwrap();
        pending.insert(mine.clone());

        let reported = Rc::new(RefCell::new(None));
        let sink = Rc::clone(&reported);
        pending.abandon(
            mine.clone(),
            ApiError::Status(reqwest::StatusCode::BAD_REQUEST),
            move |post_id, err| *sink.borrow_mut() = Some((post_id, err.to_string())),
        );

        assert!(!pending.acknowledge(&mine));
        assert_eq!(
            *reported.borrow(),
            Some((mine, "server answered 400 Bad Request".to_string()))
        );
    }

    #[test]
    fn channel_url_names_the_shard() {
        let bus = ShardBus::new(ShardId::from("lobby"));
        assert_eq!(channel_url("/channel", &bus), "/channel?shard=lobby");
        assert_eq!(
            channel_url("/channel?v=2", &bus),
            "/channel?v=2&shard=lobby"
        );
    }
}
