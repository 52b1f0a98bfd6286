use catjam_engine::memory::{MemoryHost, PageFixture};

/// A player page in the shape the fixture harness reads from disk.
pub fn player_fixture(title: &str, artist: &str, pulse_ms: u32, playing: bool) -> PageFixture {
    let json = serde_json::json!({
        "mediaSession": if playing { "playing" } else { "paused" },
        "root": {
            "tag": "body",
            "children": [
                {
                    "tag": "div",
                    "class": "main-nowPlayingBar-right",
                    "children": [
                        { "tag": "span", "attrs": { "data-test-id": "PLAYER_TITLE" }, "text": title },
                        { "tag": "span", "attrs": { "data-test-id": "PLAYER_ARTIST" }, "text": artist },
                        {
                            "tag": "button",
                            "attrs": { "data-test-id": "LIKE_BUTTON", "aria-label": "Like" },
                            "rect": { "left": 40.0, "top": 700.0, "width": 24.0, "height": 24.0 },
                            "children": [
                                { "tag": "i", "style": {
                                    "animationName": "heart", "animationDuration": "300ms",
                                    "animationIterationCount": "infinite" } }
                            ]
                        },
                        { "tag": "x-visualizer", "shadow": [
                            { "tag": "div", "attrs": { "data-test-id": "PLAYER_BEAT" }, "style": {
                                "animationName": "beat", "animationDuration": format!("{pulse_ms}ms"),
                                "animationIterationCount": "infinite" } }
                        ] }
                    ]
                },
                { "tag": "audio", "media": { "paused": !playing, "ended": false } }
            ]
        }
    });
    serde_json::from_value(json).expect("fixture should deserialize")
}

pub fn player_host(title: &str, artist: &str, pulse_ms: u32, playing: bool) -> MemoryHost {
    MemoryHost::from_fixture(&player_fixture(title, artist, pulse_ms, playing))
}
