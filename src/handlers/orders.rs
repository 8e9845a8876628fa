use std::str::FromStr;

use actix_web::{web, HttpResponse};
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::domain::order::{FindAllPage, LineItem, Order, OrderStatus};
use crate::errors::AppError;
use crate::AppState;

// ── Request / response DTOs ──────────────────────────────────────────────────

#[derive(Debug, Deserialize, ToSchema)]
pub struct LineItemRequest {
    pub product_id: Uuid,
    pub quantity: u32,
    /// Decimal price as a string to avoid floating-point issues, e.g. "9.99"
    pub unit_price: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateOrderRequest {
    pub customer_id: u64,
    pub line_items: Vec<LineItemRequest>,
}

#[derive(Debug, Clone, Copy, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum StatusValue {
    Shipped,
    Completed,
}

impl From<StatusValue> for OrderStatus {
    fn from(s: StatusValue) -> Self {
        match s {
            StatusValue::Shipped => OrderStatus::Shipped,
            StatusValue::Completed => OrderStatus::Completed,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateOrderRequest {
    pub status: StatusValue,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LineItemResponse {
    pub product_id: Uuid,
    pub quantity: u32,
    pub unit_price: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OrderResponse {
    /// Server-assigned, at most 2^53 - 1 so it survives double-based JSON parsers.
    pub order_id: u64,
    pub customer_id: u64,
    pub line_items: Vec<LineItemResponse>,
    pub created_at: DateTime<Utc>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<Order> for OrderResponse {
    fn from(o: Order) -> Self {
        Self {
            order_id: o.order_id,
            customer_id: o.customer_id,
            line_items: o
                .line_items
                .into_iter()
                .map(|l| LineItemResponse {
                    product_id: l.product_id,
                    quantity: l.quantity,
                    unit_price: l.unit_price.to_string(),
                })
                .collect(),
            created_at: o.created_at,
            shipped_at: o.shipped_at,
            completed_at: o.completed_at,
        }
    }
}

// ── Pagination ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListOrdersParams {
    /// Cursor from the previous page's `next`. Defaults to 0 (start).
    #[serde(default)]
    pub cursor: u64,
    /// Scan batch size. Defaults to 50, maximum 100.
    #[serde(default = "default_size")]
    pub size: u64,
}

fn default_size() -> u64 {
    50
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ListOrdersResponse {
    pub items: Vec<OrderResponse>,
    /// Pass back as `cursor` for the next page; 0 once the listing is done.
    pub next: u64,
}

// ── Handlers ─────────────────────────────────────────────────────────────────

/// POST /orders
///
/// Creates a new order with a server-assigned id.
#[utoipa::path(
    post,
    path = "/orders",
    request_body = CreateOrderRequest,
    responses(
        (status = 201, description = "Order created successfully", body = OrderResponse),
        (status = 400, description = "Malformed request"),
        (status = 409, description = "Order id collision"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "orders"
)]
pub async fn create_order(
    state: web::Data<AppState>,
    body: web::Json<CreateOrderRequest>,
) -> Result<HttpResponse, AppError> {
    let body = body.into_inner();

    let line_items = body
        .line_items
        .into_iter()
        .map(|l| -> Result<LineItem, AppError> {
            let unit_price = BigDecimal::from_str(&l.unit_price).map_err(|e| {
                AppError::BadRequest(format!("Invalid unit_price '{}': {}", l.unit_price, e))
            })?;
            Ok(LineItem {
                product_id: l.product_id,
                quantity: l.quantity,
                unit_price,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let order = state
        .orders
        .create_order(body.customer_id, line_items)
        .await?;

    Ok(HttpResponse::Created().json(OrderResponse::from(order)))
}

/// GET /orders
///
/// Returns one page of orders. Listing is a best-effort sweep: orders
/// created or deleted while paging may be missed or seen twice.
#[utoipa::path(
    get,
    path = "/orders",
    params(ListOrdersParams),
    responses(
        (status = 200, description = "One page of orders", body = ListOrdersResponse),
        (status = 500, description = "Internal server error"),
    ),
    tag = "orders"
)]
pub async fn list_orders(
    state: web::Data<AppState>,
    query: web::Query<ListOrdersParams>,
) -> Result<HttpResponse, AppError> {
    let params = query.into_inner();
    let page = FindAllPage {
        size: params.size.clamp(1, 100),
        offset: params.cursor,
    };

    let result = state.orders.list_orders(page).await?;

    Ok(HttpResponse::Ok().json(ListOrdersResponse {
        items: result.orders.into_iter().map(OrderResponse::from).collect(),
        next: result.cursor,
    }))
}

/// GET /orders/{id}
#[utoipa::path(
    get,
    path = "/orders/{id}",
    params(
        ("id" = u64, Path, description = "Order id"),
    ),
    responses(
        (status = 200, description = "Order found", body = OrderResponse),
        (status = 404, description = "Order not found"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "orders"
)]
pub async fn get_order(
    state: web::Data<AppState>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    let order = state.orders.get_order(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(OrderResponse::from(order)))
}

/// PUT /orders/{id}
///
/// Marks an order as shipped or completed.
#[utoipa::path(
    put,
    path = "/orders/{id}",
    params(
        ("id" = u64, Path, description = "Order id"),
    ),
    request_body = UpdateOrderRequest,
    responses(
        (status = 200, description = "Order updated", body = OrderResponse),
        (status = 400, description = "Transition not allowed"),
        (status = 404, description = "Order not found"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "orders"
)]
pub async fn update_order(
    state: web::Data<AppState>,
    path: web::Path<u64>,
    body: web::Json<UpdateOrderRequest>,
) -> Result<HttpResponse, AppError> {
    let order = state
        .orders
        .update_status(path.into_inner(), body.status.into())
        .await?;
    Ok(HttpResponse::Ok().json(OrderResponse::from(order)))
}

/// DELETE /orders/{id}
#[utoipa::path(
    delete,
    path = "/orders/{id}",
    params(
        ("id" = u64, Path, description = "Order id"),
    ),
    responses(
        (status = 204, description = "Order deleted"),
        (status = 404, description = "Order not found"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "orders"
)]
pub async fn delete_order(
    state: web::Data<AppState>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    state.orders.delete_order(path.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}
