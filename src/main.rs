//! Bongaloons entry point
//!
//! On the web this mounts a `BongaloonsClient` on `window.bongaloons` for the
//! rendering layer. Natively it plays a scripted headless match and logs the
//! note timeline.

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub fn wasm_main() -> Result<(), JsValue> {
    use bongaloons::platform::web::{BongaloonsClient, init};

    init();
    log::info!("Bongaloons starting...");

    let window = web_sys::window().ok_or_else(|| JsValue::from_str("no window"))?;
    let client = JsValue::from(BongaloonsClient::new());
    js_sys::Reflect::set(&window, &JsValue::from_str("bongaloons"), &client)?;

    log::info!("Bongaloons client mounted");
    Ok(())
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // WASM entry point is wasm_main, this is just to satisfy the compiler
}

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    env_logger::init();
    log::info!("Bongaloons (native) starting...");
    log::info!("Native mode has no backend - playing a scripted match");

    if let Err(e) = headless_match() {
        log::error!("Headless match failed: {}", e);
        std::process::exit(1);
    }
}

/// One left note at 3 s, a super note at 4 s, paused from 1 s to 3 s
#[cfg(not(target_arch = "wasm32"))]
fn headless_match() -> Result<(), Box<dyn std::error::Error>> {
    use bongaloons::consts::TICK_INTERVAL_MS;
    use bongaloons::protocol::MatchStartPayload;
    use bongaloons::sim::{KeyEdge, Session};
    use bongaloons::Settings;

    let payload = MatchStartPayload::decode(
        r#"{
            "falling_dots": [
                {"target_time": 3000, "track": "left"},
                {"target_time": 4000, "track": "super"}
            ],
            "fallDuration": 2000,
            "bpm": 120,
            "songName": "Headless"
        }"#,
    )?;

    let mut session = Session::new(Settings::load());
    session.begin_handshake();
    session.health_ok();
    session.socket_opened();
    session.start_match(&payload, 0.0)?;

    let mut now = 0.0;
    let mut last_visible = 0;
    while now <= 7000.0 {
        if now == 1000.0 || now == 3000.0 {
            session.on_key("Escape", KeyEdge::Down, now);
            session.on_key("Escape", KeyEdge::Up, now + 30.0);
        }
        if now == 5000.0 {
            session.on_key("a", KeyEdge::Down, now);
            session.on_key("a", KeyEdge::Up, now + 30.0);
        }

        let snap = session.tick(now);
        if snap.notes.len() != last_visible {
            log::info!(
                "t={:>5} elapsed={:?} visible notes: {}",
                now,
                snap.effective_elapsed_ms,
                snap.notes.len()
            );
            last_visible = snap.notes.len();
        }
        for view in snap.notes.iter().filter(|v| v.has_crossed_line) {
            if !session.is_retired(view.id) {
                log::info!("t={:>5} {} note reached the line", now, view.track.as_str());
                session.retire(view.id);
            }
        }
        for msg in session.drain_outbound() {
            log::info!("t={:>5} -> {}", now, msg.encode()?);
        }
        now += TICK_INTERVAL_MS;
    }

    session.end_game();
    for msg in session.drain_outbound() {
        log::info!("-> {}", msg.encode()?);
    }
    println!("✓ Headless match finished");
    Ok(())
}
