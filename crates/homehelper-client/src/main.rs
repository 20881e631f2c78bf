//! # homehelper-chat
//!
//! Terminal front end for a HomeHelper renovation chat.
//!
//! Reads its settings from `HOMEHELPER_*` environment variables, prints the
//! transcript as it changes and sends every line typed on stdin. A few
//! commands drive the pagination engine:
//!
//! - `/older` and `/newer` load the next page in that direction
//! - `/jump <rfc3339>` reloads the window around an instant
//! - `/mentions` and `/activity` print the inboxes
//! - `/quit` leaves

use chrono::{DateTime, Utc};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use homehelper_client::activity::ActivityItemExt;
use homehelper_client::chat::{ChatEntry, ChatView, ElementBounds, Viewport};
use homehelper_client::mentions::{redirect_path, relative_time};
use homehelper_client::{
    init_tracing, start_client, ChatEvent, ClientConfig, HttpChatApi, TranscriptView,
};
use homehelper_shared::dates::format_full_date;
use homehelper_shared::types::Direction;

/// Height of the virtual terminal viewport in pixels.
const TERMINAL_HEIGHT_PX: f64 = 600.0;

/// `TranscriptView` that echoes every change to stdout.
struct TerminalView {
    inner: TranscriptView,
}

impl TerminalView {
    fn new() -> Self {
        Self {
            inner: TranscriptView::new(TERMINAL_HEIGHT_PX),
        }
    }

    fn print(entry: &ChatEntry) {
        match entry {
            ChatEntry::DateSeparator(date) => println!("---- {} ----", format_full_date(*date)),
            ChatEntry::Message(display) => {
                let badge = if display.message.ai { " [ai]" } else { "" };
                println!(
                    "[{}] {}{}: {}",
                    display.time_label,
                    display.message.user.full_name(),
                    badge,
                    display.message.plain_text()
                );
            }
        }
    }
}

impl ChatView for TerminalView {
    fn clear(&mut self) {
        println!("==== transcript reloaded ====");
        self.inner.clear();
    }

    fn append(&mut self, entry: ChatEntry) {
        Self::print(&entry);
        self.inner.append(entry);
    }

    fn prepend_batch(&mut self, entries: Vec<ChatEntry>) {
        println!("==== {} older entries ====", entries.len());
        entries.iter().for_each(Self::print);
        self.inner.prepend_batch(entries);
    }

    fn remove_leading_separator(&mut self) -> bool {
        self.inner.remove_leading_separator()
    }

    fn len(&self) -> usize {
        self.inner.len()
    }

    fn viewport(&self) -> Viewport {
        self.inner.viewport()
    }

    fn element_bounds(&self, index: usize) -> Option<ElementBounds> {
        self.inner.element_bounds(index)
    }

    fn scroll_to(&mut self, top: f64) {
        self.inner.scroll_to(top);
    }

    fn scroll_to_bottom(&mut self) {
        self.inner.scroll_to_bottom();
    }
}

enum Input {
    Event(ChatEvent),
    Mentions,
    Activity,
    Quit,
    Ignored,
}

fn parse_line(line: &str) -> Input {
    let line = line.trim();
    match line.split_once(' ').unwrap_or((line, "")) {
        ("/quit", _) => Input::Quit,
        ("/older", _) => Input::Event(ChatEvent::LoadMore(Direction::Previous)),
        ("/newer", _) => Input::Event(ChatEvent::LoadMore(Direction::Next)),
        ("/mentions", _) => Input::Mentions,
        ("/activity", _) => Input::Activity,
        ("/jump", at) => match at.trim().parse::<DateTime<Utc>>() {
            Ok(at) => Input::Event(ChatEvent::JumpTo(at)),
            Err(e) => {
                warn!(input = %at, error = %e, "Invalid jump target");
                Input::Ignored
            }
        },
        ("", _) => Input::Ignored,
        _ => Input::Event(ChatEvent::Send(line.to_string())),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    init_tracing();

    info!("Starting HomeHelper chat v{}", env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = ClientConfig::from_env();
    info!(?config, "Loaded configuration");

    // -----------------------------------------------------------------------
    // 3. Start services and controllers
    // -----------------------------------------------------------------------
    let api = HttpChatApi::from_config(&config);
    let handles = start_client(&config, api, TerminalView::new());

    // -----------------------------------------------------------------------
    // 4. Forward stdin until /quit, EOF or Ctrl-C
    // -----------------------------------------------------------------------
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl-C");
                None
            }
        };
        let Some(line) = line else { break };

        match parse_line(&line) {
            Input::Quit => break,
            Input::Ignored => {}
            Input::Mentions => {
                let inbox = handles.mentions.snapshot();
                let now = Utc::now();
                println!("{} unseen mention(s)", inbox.len());
                for mention in inbox.entries() {
                    println!(
                        "  {} in #{} ({}): {} -> {}",
                        mention.sender.full_name(),
                        mention.channel_name,
                        relative_time(mention, now),
                        mention.message_content,
                        redirect_path(mention)
                    );
                }
            }
            Input::Activity => {
                let now = Utc::now();
                let feed = match handles.activity.lock() {
                    Ok(feed) => feed.clone(),
                    Err(poisoned) => poisoned.into_inner().clone(),
                };
                if feed.is_empty() {
                    println!("No recent activity");
                }
                for item in feed.items() {
                    println!(
                        "  {} {} ({}) -> {}",
                        item.sender(),
                        item.describe(),
                        item.relative_time(now),
                        item.link_path()
                    );
                }
            }
            Input::Event(event) => match &handles.chat_events {
                Some(events) => {
                    if events.send(event).await.is_err() {
                        warn!("Chat controller stopped");
                        break;
                    }
                }
                None => warn!("No chat channel open, set HOMEHELPER_CHANNEL_ID"),
            },
        }
    }

    // -----------------------------------------------------------------------
    // 5. Shut down
    // -----------------------------------------------------------------------
    handles.shutdown().await;
    info!("HomeHelper chat stopped");
    Ok(())
}
