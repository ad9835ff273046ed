use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::protocol::Message;
use tracing::{debug, error, info};

use super::events::{Frame, StreamEvent};
use super::Correlator;
use crate::error::CopyError;
use crate::models::Account;

const PING_INTERVAL: Duration = Duration::from_secs(15);

/// Handle to one live push-stream connection.
///
/// Owns the read and heartbeat tasks; both terminate when the stream closes
/// or `disconnect` is called. Recovery after a read error is the driver's
/// job.
pub struct StreamClient {
    shutdown: watch::Sender<bool>,
    read_task: JoinHandle<()>,
    ping_task: JoinHandle<()>,
    account_name: String,
}

impl StreamClient {
    /// Dial the stream, authenticate, and start the read + heartbeat tasks.
    /// Decoded events are delivered through `tx` in arrival order.
    pub async fn connect(
        account: &Account,
        ws_url: &str,
        tx: mpsc::UnboundedSender<StreamEvent>,
    ) -> Result<Self, CopyError> {
        info!(account = %account.name, "connecting to push stream");

        let (ws_stream, _) = connect_async(ws_url)
            .await
            .map_err(|e| CopyError::Internal(format!("websocket dial error: {}", e)))?;

        let (mut write, mut read) = ws_stream.split();

        let login = json!({"method": "login", "param": {"token": account.token}});
        write
            .send(Message::Text(login.to_string()))
            .await
            .map_err(|e| CopyError::Internal(format!("websocket login error: {}", e)))?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let read_task = tokio::spawn({
            let correlator = Correlator::new(tx.clone());
            let mut shutdown_rx = shutdown_rx.clone();
            let account_name = account.name.clone();

            async move {
                loop {
                    tokio::select! {
                        _ = shutdown_rx.changed() => break,
                        msg = read.next() => match msg {
                            Some(Ok(msg)) if msg.is_text() => {
                                if let Ok(text) = msg.into_text() {
                                    handle_frame(&text, &correlator, &tx);
                                }
                            }
                            Some(Ok(Message::Close(_))) | None => {
                                info!(account = %account_name, "push stream closed");
                                break;
                            }
                            Some(Ok(_)) => {}
                            Some(Err(e)) => {
                                error!(account = %account_name, error = %e, "push stream read error");
                                break;
                            }
                        }
                    }
                }
            }
        });

        let ping_task = tokio::spawn({
            let mut shutdown_rx = shutdown_rx;
            let account_name = account.name.clone();

            async move {
                let mut ticker = tokio::time::interval(PING_INTERVAL);
                // the first tick fires immediately; skip it
                ticker.tick().await;

                loop {
                    tokio::select! {
                        _ = shutdown_rx.changed() => {
                            let _ = write.send(Message::Close(None)).await;
                            break;
                        }
                        _ = ticker.tick() => {
                            let ping = json!({"method": "ping"});
                            if let Err(e) = write.send(Message::Text(ping.to_string())).await {
                                error!(account = %account_name, error = %e, "push stream ping error");
                                break;
                            }
                        }
                    }
                }
            }
        });

        Ok(Self {
            shutdown: shutdown_tx,
            read_task,
            ping_task,
            account_name: account.name.clone(),
        })
    }

    /// Close the stream and wait for both tasks to finish.
    pub async fn disconnect(self) {
        let _ = self.shutdown.send(true);
        let _ = self.ping_task.await;
        let _ = self.read_task.await;

        info!(account = %self.account_name, "push stream disconnected");
    }
}

/// Decode one text frame and route it by channel.
fn handle_frame(text: &str, correlator: &Correlator, tx: &mpsc::UnboundedSender<StreamEvent>) {
    let frame: Frame = match serde_json::from_str(text) {
        Ok(frame) => frame,
        Err(e) => {
            error!(error = %e, raw = text, "failed to decode push frame");
            return;
        }
    };

    let channel = frame.channel.as_deref().unwrap_or("");
    let data = frame.data.unwrap_or(serde_json::Value::Null);

    match channel {
        "rs.login" => {
            info!("push stream authenticated");
        }
        "push.personal.order" => match serde_json::from_value(data) {
            Ok(order) => correlator.on_order(order),
            Err(e) => error!(error = %e, "failed to decode order event"),
        },
        "push.personal.stop.order" => match serde_json::from_value(data) {
            Ok(stop) => correlator.on_stop_order(stop),
            Err(e) => error!(error = %e, "failed to decode stop order event"),
        },
        "push.personal.stop.planorder" => match serde_json::from_value(data) {
            Ok(stop_plan) => {
                let _ = tx.send(StreamEvent::StopPlanOrder(stop_plan));
            }
            Err(e) => error!(error = %e, "failed to decode stop plan order event"),
        },
        "push.personal.position" => match serde_json::from_value(data) {
            Ok(position) => {
                let _ = tx.send(StreamEvent::Position(position));
            }
            Err(e) => error!(error = %e, "failed to decode position event"),
        },
        "push.personal.order.deal" => match serde_json::from_value(data) {
            Ok(deal) => {
                let _ = tx.send(StreamEvent::Deal(deal));
            }
            Err(e) => error!(error = %e, "failed to decode deal event"),
        },
        // control frames carry a method and no channel
        "" => {
            if let Some(method) = frame.method.as_deref() {
                debug!(method, "ignoring control frame");
            }
        }
        // acknowledgements and pushes the replication core does not consume
        "pong" | "push.personal.asset" | "push.personal.liquidate.risk" => {}
        other if other.starts_with("rs.") => {}
        other => {
            debug!(channel = other, "ignoring unhandled push channel");
        }
    }
}
