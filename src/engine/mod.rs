//! Replication engine: fans one master action out across all enabled slave
//! accounts, records per-slave outcomes, and persists the trade.

#[cfg(test)]
mod tests;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use futures_util::future::try_join_all;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::error::CopyError;
use crate::mexc::{ChangeLeverageRequest, ChangePlanPriceRequest, MexcClient};
use crate::models::{
    side_text, Account, AccountResult, Action, ActivityLog, ExecutionResult, Trade, TradeDetail,
};

/// What the engine needs from account persistence.
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn get_master_account(&self, user_id: i64) -> Result<Option<Account>, CopyError>;
    async fn get_slave_accounts(
        &self,
        user_id: i64,
        include_disabled: bool,
    ) -> Result<Vec<Account>, CopyError>;
}

/// Durable trade records with per-slave details.
#[async_trait]
pub trait TradeStore: Send + Sync {
    async fn create_trade(&self, trade: &Trade) -> Result<i64, CopyError>;
    async fn add_trade_detail(&self, detail: &TradeDetail) -> Result<(), CopyError>;
    async fn update_trade_status(
        &self,
        trade_id: i64,
        status: &str,
        error: &str,
    ) -> Result<(), CopyError>;
}

/// Append-only activity log.
#[async_trait]
pub trait LogStore: Send + Sync {
    async fn add_log(&self, log: &ActivityLog) -> Result<(), CopyError>;
}

/// Persistent `(user, stop_order_id) -> symbol` mapping.
#[async_trait]
pub trait SymbolCache: Send + Sync {
    async fn get_symbol(&self, user_id: i64, order_id: &str) -> Result<Option<String>, CopyError>;
    async fn put_symbol(
        &self,
        user_id: i64,
        order_id: &str,
        symbol: &str,
    ) -> Result<(), CopyError>;
    async fn put_symbols(
        &self,
        user_id: i64,
        entries: &HashMap<String, String>,
    ) -> Result<(), CopyError>;
}

/// Per-slave operation after symbol resolution. One value is executed on
/// every enabled slave concurrently.
#[derive(Debug, Clone)]
enum SlaveOp {
    OpenPosition {
        symbol: String,
        side: i32,
        volume: i64,
        stop_loss_price: f64,
    },
    ClosePosition {
        symbol: String,
    },
    PlacePlanOrder {
        symbol: String,
        stop_loss_price: f64,
        take_profit_price: f64,
        loss_trend: i32,
        profit_trend: i32,
    },
    ChangePlanPrice {
        symbol: String,
        stop_loss_price: f64,
        loss_trend: i32,
        profit_trend: i32,
        stop_loss_reverse: i32,
        take_profit_reverse: i32,
    },
    CancelFirstStopOrder {
        symbol: String,
    },
    ChangeLeverage {
        symbol: String,
        leverage: i32,
        open_type: i32,
        position_type: i32,
    },
}

/// Stateless fan-out engine. Shared freely behind an `Arc`; all state lives
/// in the injected stores.
pub struct Engine {
    accounts: Arc<dyn AccountStore>,
    trades: Arc<dyn TradeStore>,
    logs: Arc<dyn LogStore>,
    cache: Arc<dyn SymbolCache>,
    base_url: String,
    dry_run: bool,
}

impl Engine {
    pub fn new(
        accounts: Arc<dyn AccountStore>,
        trades: Arc<dyn TradeStore>,
        logs: Arc<dyn LogStore>,
        cache: Arc<dyn SymbolCache>,
        base_url: String,
        dry_run: bool,
    ) -> Self {
        Self {
            accounts,
            trades,
            logs,
            cache,
            base_url,
            dry_run,
        }
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    pub async fn master_account(&self, user_id: i64) -> Result<Account, CopyError> {
        self.accounts
            .get_master_account(user_id)
            .await?
            .ok_or(CopyError::MasterNotSet)
    }

    /// Write-through used by the push driver when a stop-order frame carries
    /// its symbol.
    pub async fn save_stop_order(
        &self,
        user_id: i64,
        order_id: &str,
        symbol: &str,
    ) -> Result<(), CopyError> {
        self.cache.put_symbol(user_id, order_id, symbol).await
    }

    /// Execute one action across all enabled slaves and persist the outcome.
    ///
    /// Whole-action failures (no master, store errors, unresolvable symbols)
    /// surface to the caller without writing a trade. Per-slave failures are
    /// folded into the returned `ExecutionResult`.
    pub async fn execute_action(
        &self,
        user_id: i64,
        action: Action,
    ) -> Result<ExecutionResult, CopyError> {
        let master = self.master_account(user_id).await?;

        match action {
            Action::OpenPosition {
                symbol,
                side,
                volume,
                leverage,
                stop_loss_price,
            } => {
                let result = self
                    .fan_out(
                        user_id,
                        SlaveOp::OpenPosition {
                            symbol: symbol.clone(),
                            side,
                            volume: volume as i64,
                            stop_loss_price,
                        },
                    )
                    .await?;

                let record = Trade {
                    user_id,
                    master_account_id: master.id,
                    symbol,
                    side,
                    volume: volume as i64,
                    leverage,
                    action: "open_position".into(),
                    ..Default::default()
                };
                self.save_trade(record, &result).await?;

                Ok(result)
            }

            Action::ClosePosition {
                symbol,
                side,
                volume: _,
                position_id: _,
            } => {
                // the adapter reads back each slave's own position, so the
                // master's volume and position id are not forwarded
                let result = self
                    .fan_out(
                        user_id,
                        SlaveOp::ClosePosition {
                            symbol: symbol.clone(),
                        },
                    )
                    .await?;

                let record = Trade {
                    user_id,
                    master_account_id: master.id,
                    symbol,
                    side,
                    action: "close_position".into(),
                    ..Default::default()
                };
                self.save_trade(record, &result).await?;

                Ok(result)
            }

            Action::PlacePlanOrder {
                symbol,
                stop_loss_price,
                take_profit_price,
                loss_trend,
                profit_trend,
            } => {
                let result = self
                    .fan_out(
                        user_id,
                        SlaveOp::PlacePlanOrder {
                            symbol: symbol.clone(),
                            stop_loss_price,
                            take_profit_price,
                            loss_trend,
                            profit_trend,
                        },
                    )
                    .await?;

                let record = Trade {
                    user_id,
                    master_account_id: master.id,
                    symbol,
                    action: "place_plan_order".into(),
                    ..Default::default()
                };
                self.save_trade(record, &result).await?;

                Ok(result)
            }

            Action::ChangePlanPrice {
                stop_plan_order_id,
                symbol,
                stop_loss_price,
                loss_trend,
                profit_trend,
                stop_loss_reverse,
                take_profit_reverse,
            } => {
                let symbol = self
                    .resolve_symbol(user_id, stop_plan_order_id, &symbol)
                    .await?;

                let result = self
                    .fan_out(
                        user_id,
                        SlaveOp::ChangePlanPrice {
                            symbol: symbol.clone(),
                            stop_loss_price,
                            loss_trend,
                            profit_trend,
                            stop_loss_reverse,
                            take_profit_reverse,
                        },
                    )
                    .await?;

                let record = Trade {
                    user_id,
                    master_account_id: master.id,
                    symbol,
                    action: "change_plan_price".into(),
                    ..Default::default()
                };
                self.save_trade(record, &result).await?;

                Ok(result)
            }

            Action::CancelStopOrder { order_ids } => {
                let symbols = self.resolve_cancel_symbols(user_id, &order_ids).await?;

                // a cancel batch can span symbols; the per-symbol fan-outs
                // run concurrently and merge into one result
                let partials = try_join_all(symbols.into_iter().map(|symbol| {
                    self.fan_out(user_id, SlaveOp::CancelFirstStopOrder { symbol })
                }))
                .await?;

                let mut result = ExecutionResult::default();
                for partial in partials {
                    result.merge(partial);
                }

                let record = Trade {
                    user_id,
                    master_account_id: master.id,
                    action: "cancel_stop_order".into(),
                    ..Default::default()
                };
                self.save_trade(record, &result).await?;

                Ok(result)
            }

            Action::CancelStopOrderBySymbol { symbol } => {
                let result = self
                    .fan_out(
                        user_id,
                        SlaveOp::CancelFirstStopOrder {
                            symbol: symbol.clone(),
                        },
                    )
                    .await?;

                let record = Trade {
                    user_id,
                    master_account_id: master.id,
                    symbol,
                    action: "cancel_stop_order".into(),
                    ..Default::default()
                };
                self.save_trade(record, &result).await?;

                Ok(result)
            }

            Action::ChangeLeverage {
                symbol,
                leverage,
                open_type,
                position_type,
            } => {
                let result = self
                    .fan_out(
                        user_id,
                        SlaveOp::ChangeLeverage {
                            symbol: symbol.clone(),
                            leverage,
                            open_type,
                            position_type,
                        },
                    )
                    .await?;

                let record = Trade {
                    user_id,
                    master_account_id: master.id,
                    symbol,
                    leverage,
                    action: "change_leverage".into(),
                    ..Default::default()
                };
                self.save_trade(record, &result).await?;

                Ok(result)
            }
        }
    }

    /// Run one operation on every enabled slave concurrently. Per-slave
    /// failures never abort the fan-out.
    async fn fan_out(&self, user_id: i64, op: SlaveOp) -> Result<ExecutionResult, CopyError> {
        let slaves = self
            .accounts
            .get_slave_accounts(user_id, false)
            .await?;

        let mut result = ExecutionResult {
            total_count: slaves.len(),
            ..Default::default()
        };

        let mut set = JoinSet::new();
        for slave in slaves {
            let op = op.clone();
            let base_url = self.base_url.clone();
            let dry_run = self.dry_run;

            set.spawn(async move {
                let start = Instant::now();
                let mut account_result = run_slave(slave, op, dry_run, &base_url).await;
                account_result.latency_ms = start.elapsed().as_millis() as i64;
                account_result
            });
        }

        while let Some(joined) = set.join_next().await {
            let account_result = match joined {
                Ok(r) => r,
                Err(e) => {
                    error!(error = %e, "slave task failed to complete");
                    AccountResult {
                        error: e.to_string(),
                        ..Default::default()
                    }
                }
            };

            if account_result.success {
                result.success_count += 1;
            } else {
                result.failed_count += 1;
            }
            result.results.push(account_result);
        }

        Ok(result)
    }

    /// Resolve the symbol a master stop-plan-order id refers to: event hint
    /// first, then the cache, then a single master-side lookup that also
    /// refills the cache.
    async fn resolve_symbol(
        &self,
        user_id: i64,
        stop_plan_order_id: i64,
        hint: &str,
    ) -> Result<String, CopyError> {
        if !hint.is_empty() {
            return Ok(hint.to_string());
        }

        let key = stop_plan_order_id.to_string();
        if let Some(symbol) = self.cache.get_symbol(user_id, &key).await? {
            info!(order_id = %key, symbol = %symbol, "stop order symbol found in cache");
            return Ok(symbol);
        }

        let found = self.lookup_master_stop_orders(user_id).await?;
        found
            .get(&key)
            .cloned()
            .ok_or(CopyError::OrderNotFound(stop_plan_order_id))
    }

    /// Resolve every cancelled order id to a symbol, with at most one
    /// master-side lookup for the ids the cache misses.
    async fn resolve_cancel_symbols(
        &self,
        user_id: i64,
        order_ids: &[i64],
    ) -> Result<Vec<String>, CopyError> {
        let mut symbols = Vec::with_capacity(order_ids.len());
        let mut missing = Vec::new();

        for order_id in order_ids {
            let key = order_id.to_string();
            match self.cache.get_symbol(user_id, &key).await? {
                Some(symbol) => {
                    info!(order_id = %key, symbol = %symbol, "stop order symbol found in cache");
                    symbols.push(symbol);
                }
                None => missing.push(key),
            }
        }

        if !missing.is_empty() {
            let found = self.lookup_master_stop_orders(user_id).await?;
            for key in &missing {
                if let Some(symbol) = found.get(key) {
                    symbols.push(symbol.clone());
                }
            }
        }

        if symbols.is_empty() {
            return Err(CopyError::OrderNotFound(
                order_ids.first().copied().unwrap_or(0),
            ));
        }

        Ok(symbols)
    }

    /// One master-side open-stop-orders call; every returned entry is cached.
    async fn lookup_master_stop_orders(
        &self,
        user_id: i64,
    ) -> Result<HashMap<String, String>, CopyError> {
        let master = self.master_account(user_id).await?;
        let client = MexcClient::new(&master, &self.base_url)?;

        let orders = client.get_open_stop_orders(None).await?;

        // the cache key is the numeric plan-order id, not the originating
        // order id string
        let mut entries = HashMap::with_capacity(orders.len());
        for order in &orders {
            entries.insert(order.id.to_string(), order.symbol.clone());
        }

        if !entries.is_empty() {
            if let Err(e) = self.cache.put_symbols(user_id, &entries).await {
                warn!(error = %e, "failed to cache stop orders");
            }
        }

        Ok(entries)
    }

    /// Persist one trade row, one detail row per slave, and the activity-log
    /// line for a completed fan-out.
    async fn save_trade(
        &self,
        mut record: Trade,
        result: &ExecutionResult,
    ) -> Result<(), CopyError> {
        record.sent_at = Some(Utc::now());
        record.status = "processing".into();

        let trade_id = self.trades.create_trade(&record).await?;

        for r in &result.results {
            let detail = TradeDetail {
                trade_id,
                account_id: r.account_id,
                status: if r.success { "success" } else { "failed" }.into(),
                error: r.error.clone(),
                order_id: r.order_id.clone(),
                latency_ms: r.latency_ms,
                ..Default::default()
            };

            if let Err(e) = self.trades.add_trade_detail(&detail).await {
                error!(trade_id, error = %e, "failed to save trade detail");
            }
        }

        if let Err(e) = self
            .trades
            .update_trade_status(trade_id, result.status(), "")
            .await
        {
            error!(trade_id, error = %e, "failed to update trade status");
        }

        self.logs
            .add_log(&ActivityLog {
                user_id: Some(record.user_id),
                level: "info".into(),
                action: record.action.clone(),
                message: format!(
                    "{} {}: {}/{} successful",
                    record.symbol,
                    side_text(record.side),
                    result.success_count,
                    result.total_count
                ),
                ..Default::default()
            })
            .await
    }
}

/// Execute one resolved operation on one slave account. Errors are
/// stringified into the result; nothing propagates.
async fn run_slave(account: Account, op: SlaveOp, dry_run: bool, base_url: &str) -> AccountResult {
    let mut result = AccountResult {
        account_id: account.id,
        account_name: account.name.clone(),
        success: false,
        ..Default::default()
    };

    let client = match MexcClient::new(&account, base_url) {
        Ok(client) => client,
        Err(e) => {
            error!(slave = %account.name, error = %e, "failed to create exchange client");
            result.error = e.to_string();
            return result;
        }
    };

    match op {
        SlaveOp::OpenPosition {
            symbol,
            side,
            volume,
            stop_loss_price,
        } => {
            // each slave trades with its own leverage configuration; the
            // master's leverage is never copied
            let leverage = match client.get_leverage_for_side(&symbol, side).await {
                Ok(leverage) => leverage,
                Err(e) => {
                    error!(slave = %account.name, %symbol, error = %e, "failed to get leverage");
                    result.error = e.to_string();
                    return result;
                }
            };

            if dry_run {
                info!(
                    slave = %account.name,
                    %symbol, side, volume, leverage, stop_loss_price,
                    "DRY_RUN - would place order"
                );
                result.success = true;
                return result;
            }

            match client
                .place_order(&symbol, side, volume, leverage, stop_loss_price)
                .await
            {
                Ok(order_id) => {
                    info!(slave = %account.name, %order_id, leverage, "order placed");
                    result.success = true;
                    result.order_id = order_id;
                }
                Err(e) => {
                    error!(slave = %account.name, error = %e, "failed to place order");
                    result.error = e.to_string();
                }
            }
        }

        SlaveOp::ClosePosition { symbol } => {
            if dry_run {
                info!(slave = %account.name, %symbol, "DRY_RUN - would close position");
                result.success = true;
                return result;
            }

            match client.close_position(&symbol).await {
                Ok(()) => {
                    info!(slave = %account.name, %symbol, "position closed");
                    result.success = true;
                }
                Err(e) => {
                    error!(slave = %account.name, error = %e, "failed to close position");
                    result.error = e.to_string();
                }
            }
        }

        SlaveOp::PlacePlanOrder {
            symbol,
            stop_loss_price,
            take_profit_price,
            loss_trend,
            profit_trend,
        } => {
            if dry_run {
                info!(
                    slave = %account.name,
                    %symbol, stop_loss_price, take_profit_price,
                    "DRY_RUN - would place plan order"
                );
                result.success = true;
                return result;
            }

            match client
                .place_plan_order(
                    &symbol,
                    stop_loss_price,
                    take_profit_price,
                    loss_trend,
                    profit_trend,
                )
                .await
            {
                Ok(()) => {
                    info!(slave = %account.name, %symbol, "plan order placed");
                    result.success = true;
                }
                Err(e) => {
                    error!(slave = %account.name, error = %e, "failed to place plan order");
                    result.error = e.to_string();
                }
            }
        }

        SlaveOp::ChangePlanPrice {
            symbol,
            stop_loss_price,
            loss_trend,
            profit_trend,
            stop_loss_reverse,
            take_profit_reverse,
        } => {
            // the slave's own stop order carries a different id than the
            // master's; read it back and substitute
            let orders = match client.get_open_stop_orders(Some(&symbol)).await {
                Ok(orders) => orders,
                Err(e) => {
                    error!(slave = %account.name, error = %e, "failed to get open stop orders");
                    result.error = e.to_string();
                    return result;
                }
            };

            let Some(slave_order) = orders.first() else {
                debug!(slave = %account.name, %symbol, "no stop orders to change");
                result.success = true;
                return result;
            };

            if dry_run {
                info!(
                    slave = %account.name,
                    %symbol, stop_loss_price,
                    "DRY_RUN - would change plan price"
                );
                result.success = true;
                return result;
            }

            let req = ChangePlanPriceRequest {
                stop_plan_order_id: slave_order.id,
                loss_trend,
                profit_trend,
                stop_loss_reverse,
                take_profit_reverse,
                stop_loss_price: (stop_loss_price > 0.0).then_some(stop_loss_price),
            };

            match client.change_plan_price(req).await {
                Ok(()) => {
                    info!(slave = %account.name, %symbol, "plan price changed");
                    result.success = true;
                }
                Err(e) => {
                    error!(slave = %account.name, error = %e, "failed to change plan price");
                    result.error = e.to_string();
                }
            }
        }

        SlaveOp::CancelFirstStopOrder { symbol } => {
            let orders = match client.get_open_stop_orders(Some(&symbol)).await {
                Ok(orders) => orders,
                Err(e) => {
                    error!(slave = %account.name, error = %e, "failed to get open stop orders");
                    result.error = e.to_string();
                    return result;
                }
            };

            let Some(slave_order) = orders.first() else {
                debug!(slave = %account.name, %symbol, "no stop orders to cancel");
                result.success = true;
                return result;
            };

            if dry_run {
                info!(slave = %account.name, %symbol, "DRY_RUN - would cancel stop order");
                result.success = true;
                return result;
            }

            match client.cancel_stop_order(slave_order.id).await {
                Ok(()) => {
                    info!(slave = %account.name, %symbol, "stop order cancelled");
                    result.success = true;
                }
                Err(e) => {
                    error!(slave = %account.name, error = %e, "failed to cancel stop order");
                    result.error = e.to_string();
                }
            }
        }

        SlaveOp::ChangeLeverage {
            symbol,
            leverage,
            open_type,
            position_type,
        } => {
            if dry_run {
                info!(
                    slave = %account.name,
                    %symbol, leverage,
                    "DRY_RUN - would change leverage"
                );
                result.success = true;
                return result;
            }

            let req = ChangeLeverageRequest {
                symbol: symbol.clone(),
                leverage,
                open_type,
                position_type,
            };

            match client.change_leverage(req).await {
                Ok(()) => {
                    info!(slave = %account.name, %symbol, leverage, "leverage changed");
                    result.success = true;
                }
                Err(e) => {
                    error!(slave = %account.name, error = %e, "failed to change leverage");
                    result.error = e.to_string();
                }
            }
        }
    }

    result
}
