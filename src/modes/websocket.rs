use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::CopyError;
use crate::models::{is_open_side, Action};
use crate::session::{Session, SessionManager, SessionMode};
use crate::stream::{
    DealEvent, OrderEvent, PositionEvent, StopOrderEvent, StopPlanOrderEvent, StreamClient,
    StreamEvent,
};

struct PushConnection {
    client: StreamClient,
    consumer: JoinHandle<()>,
}

/// Push-mode driver: one stream per user's master account, with a single
/// consumer task translating events into engine actions through the session.
pub struct PushDriver {
    manager: Arc<SessionManager>,
    ws_url: String,
    action_timeout: Duration,
    connections: Mutex<HashMap<i64, PushConnection>>,
}

impl PushDriver {
    pub fn new(manager: Arc<SessionManager>, ws_url: String, action_timeout_secs: u64) -> Self {
        Self {
            manager,
            ws_url,
            action_timeout: Duration::from_secs(action_timeout_secs),
            connections: Mutex::new(HashMap::new()),
        }
    }

    pub async fn start(&self, user_id: i64) -> Result<(), CopyError> {
        let mut connections = self.connections.lock().await;

        if connections.contains_key(&user_id) {
            return Ok(());
        }

        let session = self.manager.start(user_id, SessionMode::Websocket).await?;
        let master = session.master_account().await?;

        let (tx, mut rx) = mpsc::unbounded_channel();

        let client = match StreamClient::connect(&master, &self.ws_url, tx).await {
            Ok(client) => client,
            Err(e) => {
                let _ = self.manager.stop(user_id, SessionMode::Websocket).await;
                return Err(e);
            }
        };

        let consumer = tokio::spawn({
            let session = session.clone();
            let action_timeout = self.action_timeout;

            async move {
                // single consumer: events replicate in arrival order
                while let Some(event) = rx.recv().await {
                    handle_event(&session, event, action_timeout).await;
                }
            }
        });

        connections.insert(user_id, PushConnection { client, consumer });

        info!(user_id, "websocket copy trading started");

        Ok(())
    }

    pub async fn stop(&self, user_id: i64) -> Result<(), CopyError> {
        let connection = self.connections.lock().await.remove(&user_id);

        if let Some(connection) = connection {
            connection.client.disconnect().await;
            // the consumer drains and exits once every sender is gone
            let _ = connection.consumer.await;
        }

        self.manager.stop(user_id, SessionMode::Websocket).await?;

        info!(user_id, "websocket copy trading stopped");

        Ok(())
    }

    pub async fn is_active(&self, user_id: i64) -> bool {
        self.connections.lock().await.contains_key(&user_id)
    }

    pub async fn stop_all(&self) {
        let drained: Vec<(i64, PushConnection)> = {
            let mut connections = self.connections.lock().await;
            connections.drain().collect()
        };

        for (user_id, connection) in drained {
            connection.client.disconnect().await;
            connection.consumer.abort();
            let _ = self.manager.stop(user_id, SessionMode::Websocket).await;
            info!(user_id, "websocket stopped (shutdown)");
        }
    }
}

/// Run one event's replication under the per-callback deadline.
async fn handle_event(session: &Arc<Session>, event: StreamEvent, deadline: Duration) {
    match tokio::time::timeout(deadline, dispatch_event(session, event)).await {
        Ok(Ok(())) => {}
        Ok(Err(CopyError::SessionInactive)) => {
            debug!(user_id = session.user_id(), "event dropped, session inactive");
        }
        Ok(Err(e)) => {
            error!(user_id = session.user_id(), error = %e, "failed to replicate event");
        }
        Err(_) => {
            error!(user_id = session.user_id(), "event replication timed out");
        }
    }
}

async fn dispatch_event(session: &Arc<Session>, event: StreamEvent) -> Result<(), CopyError> {
    match event {
        StreamEvent::Order(order) => on_order(session, order).await,
        StreamEvent::StopOrder(stop) => on_stop_order(session, stop).await,
        StreamEvent::StopPlanOrder(stop_plan) => on_stop_plan_order(session, stop_plan).await,
        StreamEvent::Position(position) => on_position(session, position).await,
        StreamEvent::Deal(deal) => {
            on_deal(deal);
            Ok(())
        }
    }
}

async fn on_order(session: &Arc<Session>, order: OrderEvent) -> Result<(), CopyError> {
    let action = match order.side {
        side if is_open_side(side) => {
            let stop_loss_price = order
                .stop_order
                .as_ref()
                .map(|s| s.stop_loss_price)
                .filter(|&p| p > 0.0)
                .unwrap_or(0.0);

            Action::OpenPosition {
                symbol: order.symbol,
                side,
                volume: order.vol,
                leverage: order.leverage,
                stop_loss_price,
            }
        }
        2 | 4 => Action::ClosePosition {
            symbol: order.symbol,
            side: order.side,
            volume: order.vol,
            position_id: order.position_id,
        },
        other => {
            debug!(side = other, "ignoring order event with unknown side");
            return Ok(());
        }
    };

    session.dispatch(action).await.map(drop)
}

async fn on_stop_order(session: &Arc<Session>, stop: StopOrderEvent) -> Result<(), CopyError> {
    // pre-populate the symbol cache so later cancels skip the master lookup
    if !stop.order_id.is_empty() && !stop.symbol.is_empty() {
        if let Err(e) = session.save_stop_order(&stop.order_id, &stop.symbol).await {
            warn!(error = %e, "failed to cache stop order");
        }
    }

    session
        .dispatch(Action::PlacePlanOrder {
            symbol: stop.symbol,
            stop_loss_price: stop.stop_loss_price,
            take_profit_price: stop.take_profit_price,
            loss_trend: stop.loss_trend,
            profit_trend: stop.profit_trend,
        })
        .await
        .map(drop)
}

async fn on_stop_plan_order(
    session: &Arc<Session>,
    stop_plan: StopPlanOrderEvent,
) -> Result<(), CopyError> {
    if !stop_plan.order_id.is_empty() && !stop_plan.symbol.is_empty() {
        if let Err(e) = session
            .save_stop_order(&stop_plan.order_id, &stop_plan.symbol)
            .await
        {
            warn!(error = %e, "failed to cache stop order");
        }
    }

    // isFinished marks the plan order as cancelled on the master
    if stop_plan.is_finished == 1 {
        return session
            .dispatch(Action::CancelStopOrderBySymbol {
                symbol: stop_plan.symbol,
            })
            .await
            .map(drop);
    }

    session
        .dispatch(Action::ChangePlanPrice {
            stop_plan_order_id: stop_plan.order_id.parse().unwrap_or(0),
            // symbol comes with the frame, no cache or API lookup needed
            symbol: stop_plan.symbol,
            stop_loss_price: stop_plan.stop_loss_price,
            loss_trend: stop_plan.loss_trend,
            profit_trend: stop_plan.profit_trend,
            stop_loss_reverse: stop_plan.stop_loss_reverse,
            take_profit_reverse: stop_plan.take_profit_reverse,
        })
        .await
        .map(drop)
}

async fn on_position(session: &Arc<Session>, position: PositionEvent) -> Result<(), CopyError> {
    // state 3 is the closure notification; everything else is bookkeeping
    if position.state != 3 {
        return Ok(());
    }

    session
        .dispatch(Action::ClosePosition {
            symbol: position.symbol,
            side: 0,
            volume: 0.0,
            position_id: position.position_id,
        })
        .await
        .map(drop)
}

fn on_deal(deal: DealEvent) {
    info!(
        symbol = %deal.symbol,
        vol = deal.vol,
        price = deal.price,
        profit = deal.profit,
        fee = deal.fee,
        "master deal filled"
    );
}
