use super::{ClientError, endpoint, send_json};
use async_trait::async_trait;
use reqwest::{Client, Request};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tickbar_data::{session::TokenProvider, tick::Symbol};
use tickbar_strategy::signal::{Side, Signal};
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use url::Url;

/// Raw order response, logged as received.
pub type OrderResponse = serde_json::Value;

#[derive(Copy, Clone, Eq, PartialEq, Debug, Deserialize, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderType {
    Market,
    Limit,
    Stop,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Deserialize, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TimeInForce {
    /// Good till cancelled.
    Gtc,
}

/// One exit leg of a [`Bracket`].
#[derive(Copy, Clone, Eq, PartialEq, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BracketLeg {
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    pub order_type: OrderType,
}

/// Stop loss and take profit exits attached to an entry order.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Bracket {
    pub stop_loss: BracketLeg,
    pub take_profit: BracketLeg,
}

impl Bracket {
    /// Exits placed `stop_loss_offset` against and `take_profit_offset` in favour of `side`,
    /// measured from a known `reference` price.
    ///
    /// Returns `None` if either exit price overflows or is not strictly positive.
    pub fn from_reference(
        side: Side,
        reference: Decimal,
        stop_loss_offset: Decimal,
        take_profit_offset: Decimal,
    ) -> Option<Self> {
        let (stop_loss, take_profit) = match side {
            Side::Buy => (
                reference.checked_sub(stop_loss_offset)?,
                reference.checked_add(take_profit_offset)?,
            ),
            Side::Sell => (
                reference.checked_add(stop_loss_offset)?,
                reference.checked_sub(take_profit_offset)?,
            ),
        };

        if stop_loss <= Decimal::ZERO || take_profit <= Decimal::ZERO {
            return None;
        }

        Some(Self {
            stop_loss: BracketLeg {
                price: stop_loss,
                order_type: OrderType::Stop,
            },
            take_profit: BracketLeg {
                price: take_profit,
                order_type: OrderType::Limit,
            },
        })
    }
}

/// Body of `POST {api}/orders`.
///
/// Use [`OrderRequest::market`], [`OrderRequest::limit`] or [`OrderRequest::stop`] so the price
/// fields always match the order type.
#[derive(Clone, Eq, PartialEq, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRequest {
    pub account_id: String,
    pub symbol: Symbol,
    pub quantity: u32,
    pub side: Side,
    pub order_type: OrderType,
    #[serde(
        default,
        with = "rust_decimal::serde::float_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub price: Option<Decimal>,
    #[serde(
        default,
        with = "rust_decimal::serde::float_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub stop_price: Option<Decimal>,
    pub time_in_force: TimeInForce,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bracket: Option<Bracket>,
}

impl OrderRequest {
    fn new(
        account_id: impl Into<String>,
        symbol: Symbol,
        quantity: u32,
        side: Side,
        order_type: OrderType,
    ) -> Self {
        Self {
            account_id: account_id.into(),
            symbol,
            quantity,
            side,
            order_type,
            price: None,
            stop_price: None,
            time_in_force: TimeInForce::Gtc,
            bracket: None,
        }
    }

    pub fn market(
        account_id: impl Into<String>,
        symbol: Symbol,
        quantity: u32,
        side: Side,
    ) -> Self {
        Self::new(account_id, symbol, quantity, side, OrderType::Market)
    }

    pub fn limit(
        account_id: impl Into<String>,
        symbol: Symbol,
        quantity: u32,
        side: Side,
        price: Decimal,
    ) -> Self {
        Self {
            price: Some(price),
            ..Self::new(account_id, symbol, quantity, side, OrderType::Limit)
        }
    }

    pub fn stop(
        account_id: impl Into<String>,
        symbol: Symbol,
        quantity: u32,
        side: Side,
        stop_price: Decimal,
    ) -> Self {
        Self {
            stop_price: Some(stop_price),
            ..Self::new(account_id, symbol, quantity, side, OrderType::Stop)
        }
    }

    pub fn with_bracket(self, bracket: Bracket) -> Self {
        Self {
            bracket: Some(bracket),
            ..self
        }
    }
}

/// Body of `PUT {api}/orders/{id}/modify`. Absent fields are sent as `null`.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModifyOrderRequest {
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub new_price: Option<Decimal>,
    pub new_quantity: Option<u32>,
}

/// Submits orders on behalf of the order task.
#[async_trait]
pub trait OrderSubmitter: Send + Sync {
    async fn place_order(&self, order: &OrderRequest) -> Result<OrderResponse, ClientError>;
}

/// Order endpoints of the HTTP API, authorised with a bearer token.
pub struct OrderClient<Tokens> {
    http: Client,
    api_url: Url,
    tokens: Tokens,
}

impl<Tokens> OrderClient<Tokens>
where
    Tokens: TokenProvider,
{
    pub fn new(http: Client, api_url: Url, tokens: Tokens) -> Self {
        Self {
            http,
            api_url,
            tokens,
        }
    }

    pub fn place_request(&self, token: &str, order: &OrderRequest) -> Result<Request, ClientError> {
        Ok(self
            .http
            .post(endpoint(&self.api_url, &["orders"])?)
            .bearer_auth(token)
            .json(order)
            .build()?)
    }

    pub fn modify_request(
        &self,
        token: &str,
        order_id: &str,
        modify: &ModifyOrderRequest,
    ) -> Result<Request, ClientError> {
        Ok(self
            .http
            .put(endpoint(&self.api_url, &["orders", order_id, "modify"])?)
            .bearer_auth(token)
            .json(modify)
            .build()?)
    }

    pub fn cancel_request(&self, token: &str, order_id: &str) -> Result<Request, ClientError> {
        Ok(self
            .http
            .post(endpoint(&self.api_url, &["orders", order_id, "cancel"])?)
            .bearer_auth(token)
            .build()?)
    }

    pub fn status_request(&self, token: &str, order_id: &str) -> Result<Request, ClientError> {
        Ok(self
            .http
            .get(endpoint(&self.api_url, &["orders", order_id])?)
            .bearer_auth(token)
            .build()?)
    }

    pub async fn modify_order(
        &self,
        order_id: &str,
        modify: &ModifyOrderRequest,
    ) -> Result<OrderResponse, ClientError> {
        let token = self.tokens.token().await?;
        let response =
            send_json(&self.http, self.modify_request(&token, order_id, modify)?).await?;
        info!(%order_id, ?modify, ?response, "order modified");
        Ok(response)
    }

    pub async fn cancel_order(&self, order_id: &str) -> Result<OrderResponse, ClientError> {
        let token = self.tokens.token().await?;
        let response = send_json(&self.http, self.cancel_request(&token, order_id)?).await?;
        info!(%order_id, ?response, "order cancelled");
        Ok(response)
    }

    pub async fn order_status(&self, order_id: &str) -> Result<OrderResponse, ClientError> {
        let token = self.tokens.token().await?;
        send_json(&self.http, self.status_request(&token, order_id)?).await
    }
}

#[async_trait]
impl<Tokens> OrderSubmitter for OrderClient<Tokens>
where
    Tokens: TokenProvider,
{
    async fn place_order(&self, order: &OrderRequest) -> Result<OrderResponse, ClientError> {
        let token = self.tokens.token().await?;
        send_json(&self.http, self.place_request(&token, order)?).await
    }
}

/// Account, size and bracket offsets applied to every signal of an order task.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct OrderTemplate {
    pub account_id: String,
    pub quantity: u32,
    pub stop_loss_offset: Decimal,
    pub take_profit_offset: Decimal,
}

impl OrderTemplate {
    /// Market entry for `signal`, bracketed around the close of the bar that crossed.
    ///
    /// Falls back to a plain market order when no valid bracket can be priced.
    pub fn order_for(&self, signal: &Signal) -> OrderRequest {
        let order = OrderRequest::market(
            self.account_id.as_str(),
            signal.symbol.clone(),
            self.quantity,
            signal.side,
        );

        match Bracket::from_reference(
            signal.side,
            signal.close,
            self.stop_loss_offset,
            self.take_profit_offset,
        ) {
            Some(bracket) => order.with_bracket(bracket),
            None => {
                warn!(
                    symbol = %signal.symbol,
                    side = %signal.side,
                    close = %signal.close,
                    stop_loss_offset = %self.stop_loss_offset,
                    take_profit_offset = %self.take_profit_offset,
                    "bracket prices out of range, placing market order without bracket"
                );
                order
            }
        }
    }
}

/// Outcome counts of an order task run.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
pub struct OrderTaskSummary {
    pub placed: u64,
    pub failed: u64,
}

/// Place one order per received [`Signal`] until the signal channel closes.
///
/// Failures are logged and never retried.
pub async fn run_order_task<Submitter>(
    submitter: Submitter,
    template: OrderTemplate,
    mut signals: mpsc::UnboundedReceiver<Signal>,
) -> OrderTaskSummary
where
    Submitter: OrderSubmitter,
{
    let mut summary = OrderTaskSummary::default();

    while let Some(signal) = signals.recv().await {
        let order = template.order_for(&signal);

        match submitter.place_order(&order).await {
            Ok(response) => {
                summary.placed += 1;
                info!(
                    symbol = %order.symbol,
                    side = %order.side,
                    quantity = order.quantity,
                    bracket = ?order.bracket,
                    ?response,
                    "order placed"
                );
            }
            Err(err) => {
                summary.failed += 1;
                error!(
                    symbol = %order.symbol,
                    side = %order.side,
                    quantity = order.quantity,
                    %err,
                    "failed to place order"
                );
            }
        }
    }

    info!(placed = summary.placed, failed = summary.failed, "order task stopped");
    summary
}
