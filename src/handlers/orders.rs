use actix_web::{web, HttpResponse};
use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::domain::order::{OrderLineInput, OrderView};
use crate::errors::AppError;
use crate::AppService;

const DELIVERY_DATE_FORMAT: &str = "%d-%m-%Y";

// ── Request / response DTOs ──────────────────────────────────────────────────

#[derive(Debug, Deserialize, ToSchema)]
pub struct OrderLineRequest {
    pub product_id: i64,
    pub product_name: String,
    pub quantity: i32,
    /// Decimal price as a string to avoid floating-point issues, e.g. "9.99"
    pub unit_price: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct OrderRequest {
    /// Delivery date in dd-MM-yyyy format, e.g. "24-12-2024"
    pub delivery_date: String,
    pub lines: Vec<OrderLineRequest>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderLineResponse {
    pub id: Uuid,
    pub product_id: i64,
    pub product_name: String,
    pub quantity: i32,
    pub unit_price: String,
    pub total_price: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderResponse {
    pub id: Uuid,
    pub delivery_date: String,
    pub status: String,
    pub price: String,
    pub lines: Vec<OrderLineResponse>,
}

impl From<OrderView> for OrderResponse {
    fn from(order: OrderView) -> Self {
        OrderResponse {
            id: order.id,
            delivery_date: order.delivery_date.format(DELIVERY_DATE_FORMAT).to_string(),
            status: order.status.to_string(),
            price: order.price.to_string(),
            lines: order
                .lines
                .into_iter()
                .map(|l| OrderLineResponse {
                    id: l.id,
                    product_id: l.product_id,
                    product_name: l.product_name,
                    quantity: l.quantity,
                    unit_price: l.unit_price.to_string(),
                    total_price: l.total_price.to_string(),
                })
                .collect(),
        }
    }
}

fn parse_request(body: OrderRequest) -> Result<(NaiveDate, Vec<OrderLineInput>), AppError> {
    let delivery_date = NaiveDate::parse_from_str(&body.delivery_date, DELIVERY_DATE_FORMAT)
        .map_err(|_| {
            AppError::BadRequest(format!(
                "Invalid delivery_date '{}', expected dd-MM-yyyy",
                body.delivery_date
            ))
        })?;

    let lines = body
        .lines
        .into_iter()
        .map(|l| {
            if l.quantity <= 0 {
                return Err(AppError::BadRequest(format!(
                    "Invalid quantity {} for product {}",
                    l.quantity, l.product_id
                )));
            }
            let unit_price = BigDecimal::from_str(&l.unit_price).map_err(|e| {
                AppError::BadRequest(format!("Invalid unit_price '{}': {}", l.unit_price, e))
            })?;
            Ok(OrderLineInput {
                product_id: l.product_id,
                product_name: l.product_name,
                quantity: l.quantity,
                unit_price,
            })
        })
        .collect::<Result<Vec<_>, AppError>>()?;

    Ok((delivery_date, lines))
}

// ── Handlers ─────────────────────────────────────────────────────────────────

/// GET /orders
///
/// Returns all orders together with their lines.
#[utoipa::path(
    get,
    path = "/orders",
    responses(
        (status = 200, description = "All orders", body = Vec<OrderResponse>),
        (status = 500, description = "Internal server error"),
    ),
    tag = "orders"
)]
pub async fn list_orders(svc: web::Data<AppService>) -> Result<HttpResponse, AppError> {
    let orders = web::block(move || svc.list_orders())
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;

    let body: Vec<OrderResponse> = orders.into_iter().map(OrderResponse::from).collect();
    Ok(HttpResponse::Ok().json(body))
}

/// GET /orders/{id}
#[utoipa::path(
    get,
    path = "/orders/{id}",
    params(
        ("id" = Uuid, Path, description = "Order UUID"),
    ),
    responses(
        (status = 200, description = "Order found", body = OrderResponse),
        (status = 404, description = "Order not found"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "orders"
)]
pub async fn get_order(
    svc: web::Data<AppService>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();

    let order = web::block(move || svc.get_order(id))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;

    Ok(HttpResponse::Ok().json(OrderResponse::from(order)))
}

/// POST /orders
///
/// Creates a new order with its lines. The order, its lines, and the stock
/// reservation outbox record are written in a single database transaction.
#[utoipa::path(
    post,
    path = "/orders",
    request_body = OrderRequest,
    responses(
        (status = 201, description = "Order created successfully", body = OrderResponse),
        (status = 400, description = "Malformed date, price, or quantity"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "orders"
)]
pub async fn create_order(
    svc: web::Data<AppService>,
    body: web::Json<OrderRequest>,
) -> Result<HttpResponse, AppError> {
    let (delivery_date, lines) = parse_request(body.into_inner())?;

    let order = web::block(move || svc.create_order(delivery_date, lines))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;

    Ok(HttpResponse::Created().json(OrderResponse::from(order)))
}

/// PUT /orders/{id}
///
/// Replaces the order's delivery date and lines wholesale. Allowed in any
/// status; the replaced quantities are returned to stock and the new ones
/// reserved, in the same transaction as the edit.
#[utoipa::path(
    put,
    path = "/orders/{id}",
    params(
        ("id" = Uuid, Path, description = "Order UUID"),
    ),
    request_body = OrderRequest,
    responses(
        (status = 200, description = "Order updated", body = OrderResponse),
        (status = 400, description = "Malformed date, price, or quantity"),
        (status = 404, description = "Order not found"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "orders"
)]
pub async fn update_order(
    svc: web::Data<AppService>,
    path: web::Path<Uuid>,
    body: web::Json<OrderRequest>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    let (delivery_date, lines) = parse_request(body.into_inner())?;

    let order = web::block(move || svc.update_order(id, delivery_date, lines))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;

    Ok(HttpResponse::Ok().json(OrderResponse::from(order)))
}

/// DELETE /orders/{id}
#[utoipa::path(
    delete,
    path = "/orders/{id}",
    params(
        ("id" = Uuid, Path, description = "Order UUID"),
    ),
    responses(
        (status = 204, description = "Order deleted"),
        (status = 404, description = "Order not found"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "orders"
)]
pub async fn delete_order(
    svc: web::Data<AppService>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();

    web::block(move || svc.delete_order(id))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;

    Ok(HttpResponse::NoContent().finish())
}

/// PUT /orders/todo/{id}
///
/// Re-opens a cancelled order and reserves its quantities again.
#[utoipa::path(
    put,
    path = "/orders/todo/{id}",
    params(
        ("id" = Uuid, Path, description = "Order UUID"),
    ),
    responses(
        (status = 200, description = "Order re-opened", body = OrderResponse),
        (status = 404, description = "Order not found"),
        (status = 409, description = "Order is not cancelled"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "orders"
)]
pub async fn mark_to_do(
    svc: web::Data<AppService>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();

    let order = web::block(move || svc.mark_to_do(id))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;

    Ok(HttpResponse::Ok().json(OrderResponse::from(order)))
}

/// PUT /orders/inprogress/{id}
#[utoipa::path(
    put,
    path = "/orders/inprogress/{id}",
    params(
        ("id" = Uuid, Path, description = "Order UUID"),
    ),
    responses(
        (status = 200, description = "Order moved to in progress", body = OrderResponse),
        (status = 404, description = "Order not found"),
        (status = 409, description = "Order is not to do"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "orders"
)]
pub async fn mark_in_progress(
    svc: web::Data<AppService>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();

    let order = web::block(move || svc.mark_in_progress(id))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;

    Ok(HttpResponse::Ok().json(OrderResponse::from(order)))
}

/// PUT /orders/prepared/{id}
#[utoipa::path(
    put,
    path = "/orders/prepared/{id}",
    params(
        ("id" = Uuid, Path, description = "Order UUID"),
    ),
    responses(
        (status = 200, description = "Order moved to prepared", body = OrderResponse),
        (status = 404, description = "Order not found"),
        (status = 409, description = "Order is not in progress"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "orders"
)]
pub async fn mark_prepared(
    svc: web::Data<AppService>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();

    let order = web::block(move || svc.mark_prepared(id))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;

    Ok(HttpResponse::Ok().json(OrderResponse::from(order)))
}

/// PUT /orders/delivered/{id}
#[utoipa::path(
    put,
    path = "/orders/delivered/{id}",
    params(
        ("id" = Uuid, Path, description = "Order UUID"),
    ),
    responses(
        (status = 200, description = "Order moved to delivered", body = OrderResponse),
        (status = 404, description = "Order not found"),
        (status = 409, description = "Order is not prepared"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "orders"
)]
pub async fn mark_delivered(
    svc: web::Data<AppService>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();

    let order = web::block(move || svc.mark_delivered(id))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;

    Ok(HttpResponse::Ok().json(OrderResponse::from(order)))
}

/// PUT /orders/cancelled/{id}
///
/// Cancels the order from any status and returns its quantities to stock.
#[utoipa::path(
    put,
    path = "/orders/cancelled/{id}",
    params(
        ("id" = Uuid, Path, description = "Order UUID"),
    ),
    responses(
        (status = 200, description = "Order cancelled", body = OrderResponse),
        (status = 404, description = "Order not found"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "orders"
)]
pub async fn mark_cancelled(
    svc: web::Data<AppService>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();

    let order = web::block(move || svc.mark_cancelled(id))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;

    Ok(HttpResponse::Ok().json(OrderResponse::from(order)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(delivery_date: &str, quantity: i32, unit_price: &str) -> OrderRequest {
        OrderRequest {
            delivery_date: delivery_date.to_string(),
            lines: vec![OrderLineRequest {
                product_id: 1,
                product_name: "Lotus Cheesecake".to_string(),
                quantity,
                unit_price: unit_price.to_string(),
            }],
        }
    }

    #[test]
    fn parse_request_accepts_a_well_formed_body() {
        let (date, lines) = parse_request(request("24-12-2024", 2, "5.5")).expect("should parse");

        assert_eq!(date, NaiveDate::from_ymd_opt(2024, 12, 24).unwrap());
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].quantity, 2);
        assert_eq!(lines[0].unit_price, BigDecimal::from_str("5.5").unwrap());
    }

    #[test]
    fn parse_request_rejects_a_bad_date() {
        let result = parse_request(request("2024-12-24", 2, "5.5"));
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[test]
    fn parse_request_rejects_a_bad_price() {
        let result = parse_request(request("24-12-2024", 2, "five fifty"));
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[test]
    fn parse_request_rejects_a_non_positive_quantity() {
        for quantity in [0, -3] {
            let result = parse_request(request("24-12-2024", quantity, "5.5"));
            assert!(matches!(result, Err(AppError::BadRequest(_))));
        }
    }

    #[test]
    fn order_response_formats_dates_and_prices_as_strings() {
        let view = OrderView {
            id: Uuid::new_v4(),
            delivery_date: NaiveDate::from_ymd_opt(2024, 12, 24).unwrap(),
            status: crate::domain::order::OrderStatus::ToDo,
            price: BigDecimal::from_str("11.0").unwrap(),
            created_at: chrono::Utc::now(),
            lines: vec![],
        };

        let response = OrderResponse::from(view);

        assert_eq!(response.delivery_date, "24-12-2024");
        assert_eq!(response.status, "TO_DO");
        assert_eq!(response.price, "11.0");
    }
}
