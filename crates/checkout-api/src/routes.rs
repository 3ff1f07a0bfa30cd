//! # Routes
//!
//! Axum router configuration for the checkout API.

use crate::handlers;
use crate::state::AppState;
use axum::{
    routing::{delete, get, post, put},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

/// Create the main application router
///
/// Routes:
/// - Cart (user):
///   - GET    /cart, /cart/count
///   - POST   /cart/add
///   - PUT    /cart/update
///   - DELETE /cart/remove, /cart/remove/{product_id}, /cart/clear
///
/// - Payments (user):
///   - POST /payments/initiate (alias: /payments/create-order)
///   - POST /payments/verify
///   - GET  /payments/methods, /payments/{payment_id}
///
/// - Checkout (user):
///   - POST /checkout/start, /checkout/confirm
///
/// - Orders (user):
///   - GET /orders/my, /orders/{order_id}
///
/// - Admin:
///   - GET  /admin/orders, /admin/orders/{order_id}
///   - PUT  /admin/orders/{order_id}/status, /tracking, /cancel
///   - GET  /admin/payments
///   - POST /admin/payments/{payment_id}/refund
pub fn create_router(state: AppState) -> Router {
    // Bearer tokens travel in a header, so any origin may call
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let cart_routes = Router::new()
        .route("/cart", get(handlers::get_cart))
        .route("/cart/count", get(handlers::cart_count))
        .route("/cart/add", post(handlers::add_to_cart))
        .route("/cart/update", put(handlers::update_cart_item))
        .route("/cart/remove", delete(handlers::remove_cart_item))
        .route(
            "/cart/remove/{product_id}",
            delete(handlers::remove_cart_item_by_path),
        )
        .route("/cart/clear", delete(handlers::clear_cart));

    let payment_routes = Router::new()
        .route("/payments/initiate", post(handlers::initiate_payment))
        // Older clients still call the original name
        .route("/payments/create-order", post(handlers::initiate_payment))
        .route("/payments/verify", post(handlers::verify_payment))
        .route("/payments/methods", get(handlers::payment_methods))
        .route("/payments/{payment_id}", get(handlers::get_payment));

    let checkout_routes = Router::new()
        .route("/checkout/start", post(handlers::start_checkout))
        .route("/checkout/confirm", post(handlers::confirm_checkout));

    let order_routes = Router::new()
        .route("/orders/my", get(handlers::my_orders))
        .route("/orders/{order_id}", get(handlers::get_my_order));

    let admin_routes = Router::new()
        .route("/admin/orders", get(handlers::admin_list_orders))
        .route("/admin/orders/{order_id}", get(handlers::admin_get_order))
        .route(
            "/admin/orders/{order_id}/status",
            put(handlers::admin_update_order_status),
        )
        .route(
            "/admin/orders/{order_id}/tracking",
            put(handlers::admin_update_tracking),
        )
        .route(
            "/admin/orders/{order_id}/cancel",
            put(handlers::admin_cancel_order),
        )
        .route("/admin/payments", get(handlers::admin_list_payments))
        .route(
            "/admin/payments/{payment_id}/refund",
            post(handlers::admin_refund_payment),
        );

    // Combine all routes
    Router::new()
        // Health check at root
        .route("/health", get(handlers::health))
        .route("/", get(handlers::health))
        .merge(cart_routes)
        .merge(payment_routes)
        .merge(checkout_routes)
        .merge(order_routes)
        .merge(admin_routes)
        .fallback(handlers::not_found)
        // Middleware
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        // State
        .with_state(state)
}
