use shared::config::SyncConfig;
use yew::{AttrValue, Html, function_component, html};

use crate::components::PostStream;

const DEFAULT_SHARD: &str = "lobby";
const DEFAULT_NICKNAME: &str = "guest";

/// Shard named by the location hash (`#rust-talk`), or the lobby.
pub fn shard_from_hash(hash: &str) -> String {
    let shard = hash.trim_start_matches('#').trim();
    if shard.is_empty() {
        DEFAULT_SHARD.to_string()
    } else {
        shard.to_string()
    }
}

fn current_shard() -> String {
    let hash = web_sys::window()
        .and_then(|window| window.location().hash().ok())
        .unwrap_or_default();
    shard_from_hash(&hash)
}

#[function_component(App)]
pub fn app() -> Html {
    let shard = AttrValue::from(current_shard());
    let config = SyncConfig::with_defaults();

    html! {
        <main class="eightbits">
            <header class="eightbits-header">{ format!("#{shard}") }</header>
            <PostStream
                shard={shard}
                nickname={AttrValue::from(DEFAULT_NICKNAME)}
                config={config}
            />
        </main>
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shard_comes_from_hash() {
        assert_eq!(shard_from_hash("#rust-talk"), "rust-talk");
        assert_eq!(shard_from_hash(""), "lobby");
        assert_eq!(shard_from_hash("#"), "lobby");
    }
}
