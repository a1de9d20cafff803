use futures_util::{future::BoxFuture, SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_tungstenite::{connect_async, tungstenite::Message};

use super::DetectionError;

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info};

/// Frames waiting to be written per socket. A frame that finds the queue
/// full is dropped instead of blocking the capture loop.
const OUTBOUND_DEPTH: usize = 1;
const INBOUND_DEPTH: usize = 32;

/// What the remote side sent, or what happened to the socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// Binary payload: an annotated frame to display as-is.
    Frame(Vec<u8>),
    /// Text payload, expected to be `{"emotions": [...]}`.
    Text(String),
    /// Orderly close or end of stream.
    Closed,
    /// Writing a frame to the socket failed.
    SendFailed(String),
    /// The transport broke while reading.
    Broken(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Queued,
    /// Previous frame still in flight; this one was skipped.
    Dropped,
}

/// One open streaming session, already split into an outbound frame queue
/// and an inbound event stream.
pub struct Connection {
    outgoing: mpsc::Sender<Vec<u8>>,
    incoming: mpsc::Receiver<Inbound>,
}

/// The far end of an in-memory [`Connection`].
pub struct Peer {
    pub frames: mpsc::Receiver<Vec<u8>>,
    pub events: mpsc::Sender<Inbound>,
}

impl Connection {
    pub fn new(outgoing: mpsc::Sender<Vec<u8>>, incoming: mpsc::Receiver<Inbound>) -> Self {
        Self { outgoing, incoming }
    }

    /// Connection wired to an in-process [`Peer`] instead of a socket.
    pub fn loopback() -> (Self, Peer) {
        let (out_tx, out_rx) = mpsc::channel(OUTBOUND_DEPTH);
        let (in_tx, in_rx) = mpsc::channel(INBOUND_DEPTH);
        (
            Self::new(out_tx, in_rx),
            Peer {
                frames: out_rx,
                events: in_tx,
            },
        )
    }

    /// Fire-and-forget. Only a writer that has gone away is an error.
    pub fn send_frame(&self, frame: Vec<u8>) -> Result<SendOutcome, DetectionError> {
        match self.outgoing.try_send(frame) {
            Ok(()) => Ok(SendOutcome::Queued),
            Err(TrySendError::Full(_)) => Ok(SendOutcome::Dropped),
            Err(TrySendError::Closed(_)) => {
                Err(DetectionError::Send("socket writer is gone".into()))
            }
        }
    }

    /// Next inbound event; a vanished reader counts as a close.
    pub async fn recv(&mut self) -> Inbound {
        self.incoming.recv().await.unwrap_or(Inbound::Closed)
    }
}

/// Opens streaming connections. The production implementation speaks
/// WebSocket; tests substitute in-memory peers.
pub trait Connector: Send + Sync + 'static {
    fn connect<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Connection, DetectionError>>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct WsConnector;

impl Connector for WsConnector {
    fn connect<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Connection, DetectionError>> {
        Box::pin(async move {
            let (socket, _response) = connect_async(url)
                .await
                .map_err(|err| DetectionError::Connect(err.to_string()))?;
            log_info!("websocket connection established to {url}");

            let (mut sink, mut stream) = socket.split();
            let (out_tx, mut out_rx) = mpsc::channel::<Vec<u8>>(OUTBOUND_DEPTH);
            let (in_tx, in_rx) = mpsc::channel::<Inbound>(INBOUND_DEPTH);

            tokio::spawn(async move {
                loop {
                    tokio::select! {
                        frame = out_rx.recv() => match frame {
                            Some(bytes) => {
                                if let Err(err) = sink.send(Message::Binary(bytes)).await {
                                    let _ = in_tx.send(Inbound::SendFailed(err.to_string())).await;
                                    break;
                                }
                            }
                            None => {
                                // Local side hung up: close politely.
                                let _ = sink.send(Message::Close(None)).await;
                                break;
                            }
                        },
                        message = stream.next() => {
                            let event = match message {
                                Some(Ok(Message::Binary(bytes))) => Inbound::Frame(bytes),
                                Some(Ok(Message::Text(text))) => Inbound::Text(text),
                                Some(Ok(Message::Close(_))) | None => Inbound::Closed,
                                Some(Ok(_)) => continue,
                                Some(Err(err)) => Inbound::Broken(err.to_string()),
                            };
                            let terminal = matches!(event, Inbound::Closed | Inbound::Broken(_));
                            if in_tx.send(event).await.is_err() || terminal {
                                break;
                            }
                        }
                    }
                }
                log_debug!("websocket pump finished");
            });

            Ok(Connection::new(out_tx, in_rx))
        })
    }
}

#[derive(Deserialize)]
struct EmotionPayload {
    emotions: Vec<String>,
}

/// Parses a text payload into its ordered label list.
pub fn parse_labels(text: &str) -> Result<Vec<String>, serde_json::Error> {
    serde_json::from_str::<EmotionPayload>(text).map(|payload| payload.emotions)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_emotion_labels_in_order() {
        let labels = parse_labels(r#"{"emotions": ["happy", "surprise"]}"#).unwrap();
        assert_eq!(labels, vec!["happy", "surprise"]);
    }

    #[test]
    fn rejects_payload_without_emotions() {
        assert!(parse_labels(r#"{"faces": 2}"#).is_err());
        assert!(parse_labels("not json").is_err());
    }

    #[tokio::test]
    async fn full_queue_drops_instead_of_blocking() {
        let (conn, mut peer) = Connection::loopback();
        assert_eq!(conn.send_frame(vec![1]).unwrap(), SendOutcome::Queued);
        assert_eq!(conn.send_frame(vec![2]).unwrap(), SendOutcome::Dropped);

        assert_eq!(peer.frames.recv().await, Some(vec![1]));
        assert_eq!(conn.send_frame(vec![3]).unwrap(), SendOutcome::Queued);
    }

    #[tokio::test]
    async fn send_after_writer_is_gone_is_an_error() {
        let (conn, peer) = Connection::loopback();
        drop(peer);
        assert!(matches!(
            conn.send_frame(vec![1]),
            Err(DetectionError::Send(_))
        ));
    }

    #[tokio::test]
    async fn dropped_reader_reads_as_close() {
        let (mut conn, peer) = Connection::loopback();
        drop(peer);
        assert_eq!(conn.recv().await, Inbound::Closed);
    }
}
