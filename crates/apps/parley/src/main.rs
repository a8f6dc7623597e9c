//! Parley - headless operator console for the chat backend
//!
//! Loads the configuration, runs the initial load, prints the conversation
//! list and the open timeline, then keeps syncing in the background until
//! Ctrl-C.

use anyhow::{Context, Result};
use chat::{ChatConfig, SyncCoordinator, SystemClock, UreqTransport, VirtualViewport};
use log::{error, info};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;

mod render;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);
const TIMER_RESOLUTION: Duration = Duration::from_millis(50);
const VIEWPORT_HEIGHT: f64 = 800.0;
const ROW_HEIGHT: f64 = 40.0;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    // Bootstrap config directory
    if let Err(e) = config::init() {
        error!("Failed to initialize config directory: {}", e);
    }

    let settings = ChatConfig::load().context("Failed to load chat configuration")?;
    info!("Connecting to {}", settings.base_url);

    let transport = Arc::new(UreqTransport::new(REQUEST_TIMEOUT));
    let mut coordinator = SyncCoordinator::new(&settings, transport, Arc::new(SystemClock))?;
    let mut viewport = VirtualViewport::new(VIEWPORT_HEIGHT, ROW_HEIGHT);

    coordinator.initial_load(&mut viewport);
    let mut seen_notice = render::print_notices(&coordinator, 0);
    if let Some(path) = coordinator.take_login_redirect() {
        error!("Session rejected, sign in again at {}", path);
        return Ok(());
    }
    render::print_conversations(&coordinator);
    render::print_timeline(&coordinator);

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    let mut ticker = tokio::time::interval(TIMER_RESOLUTION);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Interrupted, shutting down");
                break;
            }
            _ = ticker.tick() => {
                let stats = coordinator.advance(&mut viewport);
                seen_notice = render::print_notices(&coordinator, seen_notice);

                if let Some(path) = coordinator.take_login_redirect() {
                    error!("Session expired, sign in again at {}", path);
                    break;
                }
                let Some(stats) = stats else {
                    continue;
                };
                if stats.conversations_changed > 0 {
                    render::print_conversations(&coordinator);
                }
                if stats.messages_merged > 0 {
                    render::print_timeline(&coordinator);
                }
            }
        }
    }

    coordinator.teardown();
    Ok(())
}
