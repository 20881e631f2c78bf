//! In-process STOMP broker for tests.
//!
//! Accepts a single WebSocket connection on a loopback port, answers
//! `CONNECT` with `CONNECTED`, records subscriptions and hands every frame it
//! receives to the test. Tests push `MESSAGE` frames with `publish`.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::{accept_async, tungstenite::Message};

use crate::stomp::{Command, Frame};

const FRAME_WAIT: Duration = Duration::from_secs(5);

enum Control {
    Publish { destination: String, body: String },
    Fail(String),
}

pub struct LoopbackBroker {
    pub url: String,
    frames: mpsc::UnboundedReceiver<Frame>,
    control: mpsc::UnboundedSender<Control>,
}

impl LoopbackBroker {
    pub async fn start() -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let url = format!("ws://{}/ws", listener.local_addr()?);
        let (frames_tx, frames) = mpsc::unbounded_channel();
        let (control, mut control_rx) = mpsc::unbounded_channel::<Control>();

        tokio::spawn(async move {
            let Ok((stream, _)) = listener.accept().await else {
                return;
            };
            let Ok(ws) = accept_async(stream).await else {
                return;
            };
            let (mut sink, mut source) = ws.split();
            let mut subscriptions: Vec<(String, String)> = Vec::new();
            let mut message_id = 0u64;

            loop {
                tokio::select! {
                    msg = source.next() => {
                        let Some(Ok(Message::Text(text))) = msg else { break };
                        let Ok(decoded) = Frame::decode_all(&text) else { continue };
                        for frame in decoded {
                            match frame.command {
                                Command::Connect => {
                                    let reply = Frame::new(Command::Connected)
                                        .header("version", "1.2")
                                        .header("server", "loopback");
                                    let _ = sink.send(Message::Text(reply.encode())).await;
                                }
                                Command::Subscribe => {
                                    if let (Some(id), Some(dest)) = (frame.get("id"), frame.get("destination")) {
                                        subscriptions.push((id.to_string(), dest.to_string()));
                                    }
                                }
                                _ => {}
                            }
                            let _ = frames_tx.send(frame);
                        }
                    }
                    ctl = control_rx.recv() => {
                        match ctl {
                            Some(Control::Publish { destination, body }) => {
                                for (id, _) in subscriptions.iter().filter(|(_, d)| *d == destination) {
                                    message_id += 1;
                                    let frame = Frame::new(Command::Message)
                                        .header("subscription", id.as_str())
                                        .header("message-id", message_id.to_string())
                                        .header("destination", destination.as_str())
                                        .header("content-type", "application/json")
                                        .with_body(body.clone());
                                    let _ = sink.send(Message::Text(frame.encode())).await;
                                }
                            }
                            Some(Control::Fail(message)) => {
                                let frame = Frame::new(Command::Error).header("message", message);
                                let _ = sink.send(Message::Text(frame.encode())).await;
                                let _ = sink.close().await;
                                break;
                            }
                            None => break,
                        }
                    }
                }
            }
        });

        Ok(Self {
            url,
            frames,
            control,
        })
    }

    /// Next frame received from the client, waiting up to five seconds.
    pub async fn next_frame(&mut self) -> Option<Frame> {
        tokio::time::timeout(FRAME_WAIT, self.frames.recv())
            .await
            .ok()
            .flatten()
    }

    /// Skip frames until one with `command` arrives.
    ///
    /// # Panics
    ///
    /// When no such frame arrives in time.
    pub async fn expect(&mut self, command: Command) -> Frame {
        loop {
            match self.next_frame().await {
                Some(frame) if frame.command == command => return frame,
                Some(_) => continue,
                None => panic!("broker never received {}", command.as_str()),
            }
        }
    }

    /// Deliver `body` to every subscription on `destination`.
    pub fn publish(&self, destination: &str, body: &str) {
        let _ = self.control.send(Control::Publish {
            destination: destination.to_string(),
            body: body.to_string(),
        });
    }

    /// Send an `ERROR` frame and close the socket.
    pub fn fail(&self, message: &str) {
        let _ = self.control.send(Control::Fail(message.to_string()));
    }
}
