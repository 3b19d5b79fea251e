use std::{cell::RefCell, rc::Rc};

use shared::config::SyncConfig;
use shared::models::{ArchiveType, PostId, ShardEvent, ShardId, SubmitPostRequest};
use shared::sync::{PostSync, ShardBus, SubscriptionId};
use web_sys::{Element, HtmlInputElement, console};
use yew::{
    AttrValue, Callback, Html, NodeRef, Properties, TargetCast, UseStateHandle,
    events::{Event, InputEvent, MouseEvent, SubmitEvent},
    function_component, html, use_effect_with, use_mut_ref, use_node_ref, use_state,
};

use crate::api::{ApiError, EightBitsClient};
use crate::dom_surface::DomSurface;
use crate::transport::ChannelTransport;

#[derive(Properties, PartialEq)]
pub struct PostStreamProps {
    pub shard: AttrValue,
    pub nickname: AttrValue,
    #[prop_or_default]
    pub config: SyncConfig,
}

/// Everything that lives as long as the component shows one shard.
struct Session {
    sync: PostSync<DomSurface>,
    transport: ChannelTransport,
    bus: Rc<ShardBus>,
    status: SubscriptionId,
}

impl Session {
    fn open(
        shard: ShardId,
        container: &NodeRef,
        config: &SyncConfig,
        stalled: UseStateHandle<bool>,
    ) -> Result<Self, String> {
        let element = container
            .cast::<Element>()
            .ok_or("post container is not mounted")?;
        let surface = DomSurface::new(element).ok_or("post container is detached")?;

        let bus = Rc::new(ShardBus::new(shard));
        let sync = PostSync::attach(Rc::clone(&bus), surface, config);
        let client = EightBitsClient::new(&config.rpc_base_url);
        let transport = ChannelTransport::connect(Rc::clone(&bus), client, &config.channel_url)
            .map_err(|err| format!("failed to open channel: {err:?}"))?;

        let status = bus.subscribe(move |event| match event {
            ShardEvent::HistoryRequestFailed { .. } => stalled.set(true),
            ShardEvent::RequestHistoricalPosts(_) => stalled.set(false),
            _ => {}
        });

        sync.start();
        Ok(Self {
            sync,
            transport,
            bus,
            status,
        })
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.bus.unsubscribe(self.status);
    }
}

#[function_component(PostStream)]
pub fn post_stream(props: &PostStreamProps) -> Html {
    let container = use_node_ref();
    let session = use_mut_ref(|| None::<Session>);
    let stalled = use_state(|| false);
    let draft = use_state(String::new);
    let error = use_state(|| None::<String>);

    {
        let container = container.clone();
        let session = session.clone();
        let stalled = stalled.clone();
        let error = error.clone();
        let config = props.config.clone();
        use_effect_with(props.shard.clone(), move |shard| {
            let shard = ShardId::from(shard.to_string());
            match Session::open(shard, &container, &config, stalled) {
                Ok(opened) => {
                    *session.borrow_mut() = Some(opened);
                    error.set(None);
                }
                Err(message) => {
                    console::error_1(&message.clone().into());
                    error.set(Some(message));
                }
            }

            move || {
                session.borrow_mut().take();
            }
        });
    }

    let on_scroll = {
        let session = session.clone();
        Callback::from(move |_: Event| {
            if let Some(session) = session.borrow().as_ref() {
                session.sync.on_scroll();
            }
        })
    };

    let on_retry = {
        let session = session.clone();
        Callback::from(move |_: MouseEvent| {
            if let Some(session) = session.borrow().as_ref() {
                session.sync.retry_backfill();
            }
        })
    };

    let on_input = {
        let draft = draft.clone();
        Callback::from(move |e: InputEvent| {
            let input: HtmlInputElement = e.target_unchecked_into();
            draft.set(input.value());
        })
    };

    let on_submit = {
        let session: Rc<RefCell<Option<Session>>> = session;
        let draft = draft.clone();
        let error = error.clone();
        let shard = props.shard.clone();
        let nickname = props.nickname.clone();
        Callback::from(move |e: SubmitEvent| {
            e.prevent_default();
            let body = draft.trim().to_string();
            if body.is_empty() {
                return;
            }
            let request =
                match SubmitPostRequest::new(ShardId::from(shard.to_string()), ArchiveType::Chat, body) {
                    Ok(request) => request,
                    Err(err) => {
                        error.set(Some(err.to_string()));
                        return;
                    }
                };
            let on_failure = {
                let session = Rc::clone(&session);
                let error = error.clone();
                move |post_id: PostId, err: ApiError| {
                    if let Some(session) = session.borrow().as_ref() {
                        session.sync.with_surface(|surface| surface.mark_failed(&post_id));
                    }
                    error.set(Some(format!("Your post was not sent: {err}")));
                }
            };
            if let Some(session) = session.borrow().as_ref() {
                session.transport.submit(request, &nickname, on_failure);
                draft.set(String::new());
            }
        })
    };

    html! {
        <div class="post-stream">
            if let Some(message) = (*error).clone() {
                <div class="post-stream-error">{ message }</div>
            }
            if *stalled {
                <button class="post-stream-retry" onclick={on_retry}>
                    { "Couldn't load older posts. Retry" }
                </button>
            }
            <div class="post-stream-posts" ref={container} onscroll={on_scroll}></div>
            <form class="post-stream-composer" onsubmit={on_submit}>
                <input
                    type="text"
                    placeholder="Say something"
                    value={(*draft).clone()}
                    oninput={on_input}
                />
                <button type="submit">{ "Send" }</button>
            </form>
        </div>
    }
}
