//! WebSocket Mock Server for the `/v1/recognize` endpoint
//!
//! Speaks the recognition protocol: acknowledges `start` with a listening
//! state, records every frame the client sends and answers according to a
//! scripted [`Behavior`].

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use url::Url;

/// How the mock answers a session.
#[derive(Debug, Clone)]
pub enum Behavior {
    /// Send `results` after the stop frame, then the final listening state.
    Transcribe(Vec<Value>),
    /// Send `results` while audio is still arriving (after the first audio
    /// frame), then the final listening state after stop.
    TranscribeWhileStreaming(Vec<Value>),
    /// Send this error frame right after listening, followed by a results
    /// frame the client must not deliver.
    FailAfterStart(Value),
    /// Close the connection with this code right after listening.
    CloseAfterStart(CloseCode),
    /// Acknowledge start and never answer again.
    Silent,
    /// Acknowledge start with an empty `{"state": {}}` object. After stop,
    /// send `results` and close with 1000 without a second state.
    CloseAfterStop(Vec<Value>),
    /// Send a frame that is not JSON right after listening, then behave
    /// like `Transcribe(results)`.
    MalformedThenTranscribe(Vec<Value>),
    /// Send `results` right after listening and never answer again.
    ResultsAfterStart(Vec<Value>),
    /// Acknowledge start, then stop reading from the socket altogether.
    StopReading,
}

/// A frame received from the client.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Text(Value),
    Binary(Vec<u8>),
    Close,
}

/// Request line and headers of the WebSocket handshake.
#[derive(Debug, Clone, Default)]
pub struct Handshake {
    pub path: String,
    pub query: Option<String>,
    pub headers: Vec<(String, String)>,
}

impl Handshake {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Default)]
struct Recorded {
    frames: Mutex<Vec<Frame>>,
    handshake: Mutex<Option<Handshake>>,
    connections: AtomicU64,
}

/// Running mock server. Lives until the test ends.
pub struct MockRecognizeServer {
    addr: SocketAddr,
    recorded: Arc<Recorded>,
}

impl MockRecognizeServer {
    pub async fn start(behavior: Behavior) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let recorded = Arc::new(Recorded::default());

        let state = recorded.clone();
        let behavior = Arc::new(behavior);
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                state.connections.fetch_add(1, Ordering::Relaxed);
                let state = state.clone();
                let behavior = behavior.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, &behavior, &state).await {
                        tracing::debug!("mock connection ended with error: {}", e);
                    }
                });
            }
        });

        Self { addr, recorded }
    }

    /// HTTP base URL of the mock, as a client would be configured with.
    pub fn service_url(&self) -> Url {
        Url::parse(&format!("http://{}", self.addr)).unwrap()
    }

    pub fn frames(&self) -> Vec<Frame> {
        self.recorded.frames.lock().clone()
    }

    pub fn text_frames(&self) -> Vec<Value> {
        self.frames()
            .into_iter()
            .filter_map(|f| match f {
                Frame::Text(value) => Some(value),
                _ => None,
            })
            .collect()
    }

    pub fn binary_frames(&self) -> Vec<Vec<u8>> {
        self.frames()
            .into_iter()
            .filter_map(|f| match f {
                Frame::Binary(data) => Some(data),
                _ => None,
            })
            .collect()
    }

    pub fn stop_frames(&self) -> usize {
        self.text_frames()
            .iter()
            .filter(|v| v["action"] == "stop")
            .count()
    }

    pub fn handshake(&self) -> Option<Handshake> {
        self.recorded.handshake.lock().clone()
    }

    pub fn connections(&self) -> u64 {
        self.recorded.connections.load(Ordering::Relaxed)
    }
}

fn listening() -> Message {
    Message::Text(json!({ "state": "listening" }).to_string().into())
}

fn empty_state() -> Message {
    Message::Text(json!({ "state": {} }).to_string().into())
}

fn text(value: &Value) -> Message {
    Message::Text(value.to_string().into())
}

async fn handle_connection(
    stream: TcpStream,
    behavior: &Behavior,
    recorded: &Recorded,
) -> Result<(), WsError> {
    let ws_stream = accept_hdr_async(stream, |request: &Request, response: Response| {
        let handshake = Handshake {
            path: request.uri().path().to_string(),
            query: request.uri().query().map(str::to_string),
            headers: request
                .headers()
                .iter()
                .map(|(n, v)| (n.as_str().to_string(), v.to_str().unwrap_or_default().to_string()))
                .collect(),
        };
        *recorded.handshake.lock() = Some(handshake);
        Ok::<Response, ErrorResponse>(response)
    })
    .await?;
    let (mut write, mut read) = ws_stream.split();
    let mut streamed = false;

    while let Some(message) = read.next().await {
        match message? {
            Message::Text(payload) => {
                let value: Value = serde_json::from_str(&payload).unwrap_or(Value::Null);
                recorded.frames.lock().push(Frame::Text(value.clone()));

                match value["action"].as_str() {
                    Some("start") => {
                        if matches!(behavior, Behavior::CloseAfterStop(_)) {
                            write.send(empty_state()).await?;
                        } else {
                            write.send(listening()).await?;
                        }
                        match behavior {
                            Behavior::FailAfterStart(error) => {
                                write.send(text(error)).await?;
                                write
                                    .send(text(&json!({
                                        "result_index": 0,
                                        "results": [{
                                            "final": true,
                                            "alternatives": [{ "transcript": "late" }]
                                        }]
                                    })))
                                    .await?;
                            }
                            Behavior::CloseAfterStart(code) => {
                                write
                                    .send(Message::Close(Some(CloseFrame {
                                        code: *code,
                                        reason: "closing".into(),
                                    })))
                                    .await?;
                            }
                            Behavior::MalformedThenTranscribe(_) => {
                                write.send(Message::Text("{not json".into())).await?;
                            }
                            Behavior::ResultsAfterStart(results) => {
                                for result in results {
                                    write.send(text(result)).await?;
                                }
                            }
                            Behavior::StopReading => {
                                // keep both halves alive without polling the reader
                                std::future::pending::<()>().await;
                            }
                            _ => {}
                        }
                    }
                    Some("stop") => match behavior {
                        Behavior::Transcribe(results)
                        | Behavior::MalformedThenTranscribe(results) => {
                            for result in results {
                                write.send(text(result)).await?;
                            }
                            write.send(listening()).await?;
                        }
                        Behavior::TranscribeWhileStreaming(_) => {
                            write.send(listening()).await?;
                        }
                        Behavior::CloseAfterStop(results) => {
                            for result in results {
                                write.send(text(result)).await?;
                            }
                            write
                                .send(Message::Close(Some(CloseFrame {
                                    code: CloseCode::Normal,
                                    reason: "".into(),
                                })))
                                .await?;
                        }
                        _ => {}
                    },
                    _ => {}
                }
            }
            Message::Binary(data) => {
                recorded.frames.lock().push(Frame::Binary(data.to_vec()));
                if let Behavior::TranscribeWhileStreaming(results) = behavior {
                    if !streamed {
                        streamed = true;
                        for result in results {
                            write.send(text(result)).await?;
                        }
                    }
                }
            }
            Message::Close(_) => {
                recorded.frames.lock().push(Frame::Close);
            }
            _ => {}
        }
    }

    Ok(())
}
