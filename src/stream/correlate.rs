use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use super::events::{OrderEvent, StopOrderEvent, StreamEvent};

/// How long an order frame waits for its attached stop-order frame.
const CORRELATION_WINDOW: Duration = Duration::from_secs(1);

struct PendingOrder {
    order: OrderEvent,
    timer: JoinHandle<()>,
}

/// Stitches order frames to their stop-order frames.
///
/// The exchange delivers an order-open and its attached stop-loss as two
/// separate frames. Every order is parked here with a single-shot deadline;
/// a stop-order arriving for the same order id within the window is attached
/// and the combined event is emitted once. The deadline firing first emits
/// the order alone; a stop-order with no pending match is emitted on its own
/// path.
pub(crate) struct Correlator {
    pendings: Arc<Mutex<HashMap<String, PendingOrder>>>,
    tx: mpsc::UnboundedSender<StreamEvent>,
}

impl Correlator {
    pub(crate) fn new(tx: mpsc::UnboundedSender<StreamEvent>) -> Self {
        Self {
            pendings: Arc::new(Mutex::new(HashMap::new())),
            tx,
        }
    }

    pub(crate) fn on_order(&self, order: OrderEvent) {
        let order_id = order.order_id.clone();

        let mut pendings = self.pendings.lock().unwrap();

        let timer = tokio::spawn({
            let pendings = Arc::clone(&self.pendings);
            let tx = self.tx.clone();
            let order_id = order_id.clone();

            async move {
                tokio::time::sleep(CORRELATION_WINDOW).await;

                let expired = pendings.lock().unwrap().remove(&order_id);
                if let Some(pending) = expired {
                    debug!(%order_id, "no stop order arrived, dispatching order alone");
                    let _ = tx.send(StreamEvent::Order(pending.order));
                }
            }
        });

        pendings.insert(order_id, PendingOrder { order, timer });
    }

    pub(crate) fn on_stop_order(&self, stop: StopOrderEvent) {
        let matched = self.pendings.lock().unwrap().remove(&stop.order_id);

        match matched {
            Some(mut pending) => {
                debug!(order_id = %stop.order_id, "matched stop order with pending order");
                pending.timer.abort();
                pending.order.stop_order = Some(stop);
                let _ = self.tx.send(StreamEvent::Order(pending.order));
            }
            None => {
                debug!(order_id = %stop.order_id, "stop order without pending order");
                let _ = self.tx.send(StreamEvent::StopOrder(stop));
            }
        }
    }
}
