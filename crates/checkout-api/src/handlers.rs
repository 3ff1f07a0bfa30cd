//! # Request Handlers
//!
//! Axum request handlers for the checkout API.
//! Every handler except `health` needs a bearer token; the admin handlers need the admin role.

use crate::auth::{AdminUser, AuthUser};
use crate::error::{ApiJson, ApiResult};
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use checkout_core::{
    Cart, CheckoutError, CheckoutPayload, ConfirmCheckout, Currency, Customer, NextAction, Order,
    OrderPage, OrderQuery, OrderStatus, Payment, PaymentStatus, ProductId, ReportedStatus,
    ShippingAddress, StartCheckout, TrackingInfo, VerifyPayment,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, instrument};

// =============================================================================
// Request/Response Types
// =============================================================================

/// Add cart item request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItemRequest {
    /// Kept as raw JSON so a non-string id gets a descriptive error
    #[serde(default)]
    pub product_id: Value,
    #[serde(default = "default_quantity")]
    pub quantity: i64,
}

fn default_quantity() -> i64 {
    1
}

/// Update cart item request; the new quantity must be given explicitly
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCartItemRequest {
    #[serde(default)]
    pub product_id: Value,
    pub quantity: i64,
}

/// Remove cart item request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveItemRequest {
    #[serde(default)]
    pub product_id: Value,
}

/// Initiate payment request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiatePaymentRequest {
    /// Minor units; the current cart total when omitted
    #[serde(default)]
    pub amount: Option<i64>,
    #[serde(default)]
    pub currency: Currency,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub order_id: Option<String>,
}

/// Initiate payment response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiatePaymentResponse {
    pub payment_id: String,
    pub status: PaymentStatus,
    pub provider: String,
    pub provider_order_id: String,
    pub amount: i64,
    pub currency: Currency,
    pub next_action: NextAction,
    pub supported_providers: Vec<String>,
    pub message: String,
}

/// Verify payment request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyPaymentRequest {
    pub payment_id: String,
    pub status: ReportedStatus,
    #[serde(default)]
    pub provider_payment_id: Option<String>,
    #[serde(default)]
    pub provider_signature: Option<String>,
    #[serde(default)]
    pub order_data: Option<CheckoutPayload>,
}

/// Verify payment response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyPaymentResponse {
    pub payment_id: String,
    pub status: PaymentStatus,
    pub order_id: Option<String>,
    pub provider: String,
    pub message: String,
}

impl From<Payment> for VerifyPaymentResponse {
    fn from(payment: Payment) -> Self {
        let message = match payment.status {
            PaymentStatus::Completed => "Payment completed",
            PaymentStatus::Failed => "Payment failed",
            PaymentStatus::Refunded => "Payment refunded",
            PaymentStatus::Pending => "Payment pending",
        };
        Self {
            payment_id: payment.id,
            status: payment.status,
            order_id: payment.order_id,
            provider: payment.provider,
            message: message.to_string(),
        }
    }
}

/// Start checkout request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartCheckoutRequest {
    pub customer: Customer,
    pub address: ShippingAddress,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub currency: Currency,
    #[serde(default)]
    pub shipping: i64,
    #[serde(default)]
    pub tax: i64,
}

/// Start checkout response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartCheckoutResponse {
    #[serde(flatten)]
    pub payment: InitiatePaymentResponse,
    pub cart: Cart,
}

/// Confirm checkout request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmCheckoutRequest {
    pub payment_id: String,
    pub status: ReportedStatus,
    #[serde(default)]
    pub provider_payment_id: Option<String>,
    #[serde(default)]
    pub provider_signature: Option<String>,
    pub customer: Customer,
    pub address: ShippingAddress,
    #[serde(default)]
    pub shipping: i64,
    #[serde(default)]
    pub tax: i64,
}

/// Pagination for a user's own orders
#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub limit: u32,
}

/// Admin order listing filters
#[derive(Debug, Default, Deserialize)]
pub struct OrderListParams {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub limit: u32,
}

/// Admin payment listing filters
#[derive(Debug, Default, Deserialize)]
pub struct PaymentListParams {
    #[serde(default)]
    pub status: Option<String>,
}

/// Admin order status change
#[derive(Debug, Deserialize)]
pub struct StatusUpdateRequest {
    pub status: String,
    #[serde(default)]
    pub note: Option<String>,
}

/// Admin refund request
#[derive(Debug, Default, Deserialize)]
pub struct RefundRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

fn initiate_response(
    state: &AppState,
    payment: Payment,
    next_action: NextAction,
) -> InitiatePaymentResponse {
    InitiatePaymentResponse {
        message: format!("Payment initiated with {}", payment.provider),
        payment_id: payment.id,
        status: payment.status,
        provider: payment.provider,
        provider_order_id: payment.provider_order_id,
        amount: payment.amount,
        currency: payment.currency,
        next_action,
        supported_providers: state.ledger.providers(),
    }
}

/// Filter strings like `?status=` are empty when the client sends the key without a value
fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

// =============================================================================
// Health
// =============================================================================

/// Health check endpoint
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "storefront-checkout",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

// =============================================================================
// Cart
// =============================================================================

pub async fn get_cart(State(state): State<AppState>, user: AuthUser) -> ApiResult<Json<Cart>> {
    Ok(Json(state.carts.get_cart(&user.user_id).await?))
}

pub async fn cart_count(State(state): State<AppState>, user: AuthUser) -> ApiResult<Json<Value>> {
    let count = state.carts.item_count(&user.user_id).await?;
    Ok(Json(serde_json::json!({ "count": count })))
}

#[instrument(skip(state, request), fields(user_id = %user.user_id))]
pub async fn add_to_cart(
    State(state): State<AppState>,
    user: AuthUser,
    ApiJson(request): ApiJson<CartItemRequest>,
) -> ApiResult<Json<Cart>> {
    let product_id = ProductId::from_json(&request.product_id)?;
    let cart = state
        .carts
        .add_item(&user.user_id, product_id.as_str(), request.quantity)
        .await?;
    Ok(Json(cart))
}

#[instrument(skip(state, request), fields(user_id = %user.user_id))]
pub async fn update_cart_item(
    State(state): State<AppState>,
    user: AuthUser,
    ApiJson(request): ApiJson<UpdateCartItemRequest>,
) -> ApiResult<Json<Cart>> {
    let product_id = ProductId::from_json(&request.product_id)?;
    let cart = state
        .carts
        .update_item(&user.user_id, product_id.as_str(), request.quantity)
        .await?;
    Ok(Json(cart))
}

#[instrument(skip(state, request), fields(user_id = %user.user_id))]
pub async fn remove_cart_item(
    State(state): State<AppState>,
    user: AuthUser,
    ApiJson(request): ApiJson<RemoveItemRequest>,
) -> ApiResult<Json<Cart>> {
    let product_id = ProductId::from_json(&request.product_id)?;
    let cart = state
        .carts
        .remove_item(&user.user_id, product_id.as_str())
        .await?;
    Ok(Json(cart))
}

/// `DELETE /cart/remove/{productId}`; the id is validated like the body variant
#[instrument(skip(state), fields(user_id = %user.user_id))]
pub async fn remove_cart_item_by_path(
    State(state): State<AppState>,
    user: AuthUser,
    Path(product_id): Path<String>,
) -> ApiResult<Json<Cart>> {
    let cart = state.carts.remove_item(&user.user_id, &product_id).await?;
    Ok(Json(cart))
}

pub async fn clear_cart(State(state): State<AppState>, user: AuthUser) -> ApiResult<Json<Cart>> {
    Ok(Json(state.carts.clear(&user.user_id).await?))
}

// =============================================================================
// Payments
// =============================================================================

#[instrument(skip(state, request), fields(user_id = %user.user_id))]
pub async fn initiate_payment(
    State(state): State<AppState>,
    user: AuthUser,
    ApiJson(request): ApiJson<InitiatePaymentRequest>,
) -> ApiResult<Json<InitiatePaymentResponse>> {
    let initiated = state
        .checkout
        .initiate_payment(
            &user.user_id,
            request.amount,
            request.currency,
            request.provider,
            request.order_id,
        )
        .await?;

    Ok(Json(initiate_response(
        &state,
        initiated.payment,
        initiated.next_action,
    )))
}

#[instrument(skip(state, request), fields(user_id = %user.user_id, payment_id = %request.payment_id))]
pub async fn verify_payment(
    State(state): State<AppState>,
    user: AuthUser,
    ApiJson(request): ApiJson<VerifyPaymentRequest>,
) -> ApiResult<Json<VerifyPaymentResponse>> {
    let payment = state
        .checkout
        .verify_payment(VerifyPayment {
            payment_id: request.payment_id,
            user_id: user.user_id,
            status: request.status,
            provider_payment_id: request.provider_payment_id,
            provider_signature: request.provider_signature,
            checkout: request.order_data,
        })
        .await?;

    Ok(Json(payment.into()))
}

pub async fn payment_methods(State(state): State<AppState>, _user: AuthUser) -> impl IntoResponse {
    Json(serde_json::json!({
        "providers": state.ledger.providers(),
        "default": state.ledger.default_provider(),
    }))
}

pub async fn get_payment(
    State(state): State<AppState>,
    user: AuthUser,
    Path(payment_id): Path<String>,
) -> ApiResult<Json<Payment>> {
    Ok(Json(
        state.ledger.get_for_user(&payment_id, &user.user_id).await?,
    ))
}

// =============================================================================
// Checkout
// =============================================================================

#[instrument(skip(state, request), fields(user_id = %user.user_id))]
pub async fn start_checkout(
    State(state): State<AppState>,
    user: AuthUser,
    ApiJson(request): ApiJson<StartCheckoutRequest>,
) -> ApiResult<Json<StartCheckoutResponse>> {
    let started = state
        .checkout
        .start(StartCheckout {
            user_id: user.user_id,
            customer: request.customer,
            address: request.address,
            provider: request.provider,
            currency: request.currency,
            shipping: request.shipping,
            tax: request.tax,
        })
        .await?;

    Ok(Json(StartCheckoutResponse {
        payment: initiate_response(
            &state,
            started.initiated.payment,
            started.initiated.next_action,
        ),
        cart: started.cart,
    }))
}

#[instrument(skip(state, request), fields(user_id = %user.user_id, payment_id = %request.payment_id))]
pub async fn confirm_checkout(
    State(state): State<AppState>,
    user: AuthUser,
    ApiJson(request): ApiJson<ConfirmCheckoutRequest>,
) -> ApiResult<Json<VerifyPaymentResponse>> {
    let payment = state
        .checkout
        .confirm(ConfirmCheckout {
            user_id: user.user_id,
            payment_id: request.payment_id,
            status: request.status,
            provider_payment_id: request.provider_payment_id,
            provider_signature: request.provider_signature,
            customer: request.customer,
            address: request.address,
            shipping: request.shipping,
            tax: request.tax,
        })
        .await?;

    Ok(Json(payment.into()))
}

// =============================================================================
// Orders
// =============================================================================

pub async fn my_orders(
    State(state): State<AppState>,
    user: AuthUser,
    Query(params): Query<PageParams>,
) -> ApiResult<Json<OrderPage>> {
    let query = OrderQuery {
        page: params.page,
        limit: params.limit,
        ..OrderQuery::for_user(user.user_id)
    };
    Ok(Json(state.orders.list(&query).await?))
}

pub async fn get_my_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(order_id): Path<String>,
) -> ApiResult<Json<Order>> {
    Ok(Json(
        state.orders.get_for_user(&order_id, &user.user_id).await?,
    ))
}

// =============================================================================
// Admin
// =============================================================================

pub async fn admin_list_orders(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(params): Query<OrderListParams>,
) -> ApiResult<Json<OrderPage>> {
    let status = non_empty(params.status)
        .map(|s| s.parse::<OrderStatus>())
        .transpose()?;
    let query = OrderQuery {
        user_id: None,
        status,
        search: non_empty(params.search),
        page: params.page,
        limit: params.limit,
    };
    Ok(Json(state.orders.list(&query).await?))
}

pub async fn admin_get_order(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(order_id): Path<String>,
) -> ApiResult<Json<Order>> {
    Ok(Json(state.orders.get(&order_id).await?))
}

#[instrument(skip(state, admin, request), fields(admin = %admin.0.user_id))]
pub async fn admin_update_order_status(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(order_id): Path<String>,
    ApiJson(request): ApiJson<StatusUpdateRequest>,
) -> ApiResult<Json<Order>> {
    let status: OrderStatus = request.status.parse()?;
    let order = state
        .orders
        .update_status(&order_id, status, request.note)
        .await?;
    Ok(Json(order))
}

#[instrument(skip(state, admin, tracking), fields(admin = %admin.0.user_id))]
pub async fn admin_update_tracking(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(order_id): Path<String>,
    ApiJson(tracking): ApiJson<TrackingInfo>,
) -> ApiResult<Json<Order>> {
    Ok(Json(state.orders.update_tracking(&order_id, tracking).await?))
}

#[instrument(skip(state, admin), fields(admin = %admin.0.user_id))]
pub async fn admin_cancel_order(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(order_id): Path<String>,
) -> ApiResult<Json<Order>> {
    let order = state.orders.cancel(&order_id).await?;
    info!("Order {} cancelled by {}", order.order_number, admin.0.user_id);
    Ok(Json(order))
}

pub async fn admin_list_payments(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(params): Query<PaymentListParams>,
) -> ApiResult<Json<Value>> {
    let status = non_empty(params.status)
        .map(|s| s.parse::<PaymentStatus>())
        .transpose()?;
    let payments = state.ledger.list(status).await?;
    Ok(Json(serde_json::json!({
        "count": payments.len(),
        "payments": payments,
    })))
}

#[instrument(skip(state, admin, request), fields(admin = %admin.0.user_id))]
pub async fn admin_refund_payment(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(payment_id): Path<String>,
    ApiJson(request): ApiJson<RefundRequest>,
) -> ApiResult<Json<Payment>> {
    let reason = non_empty(request.reason);
    Ok(Json(state.ledger.refund(&payment_id, reason).await?))
}

/// Fallback for unknown routes
pub async fn not_found() -> ApiResult<()> {
    Err(CheckoutError::not_found("Route", "unknown path").into())
}
