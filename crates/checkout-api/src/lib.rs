//! # checkout-api
//!
//! HTTP API layer for the storefront checkout.
//!
//! This crate provides:
//! - Axum-based HTTP server
//! - REST endpoints for cart, payments, checkout and orders
//! - Admin endpoints for order fulfilment and refunds
//! - Bearer token identity and catalog adapters
//!
//! ## Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | GET | `/health` | Health check |
//! | GET | `/cart` | Current cart |
//! | POST | `/cart/add` | Add a product |
//! | PUT | `/cart/update` | Replace a line's quantity |
//! | DELETE | `/cart/remove` | Remove a line |
//! | DELETE | `/cart/clear` | Empty the cart |
//! | POST | `/payments/initiate` | Open a payment |
//! | POST | `/payments/verify` | Report a payment outcome |
//! | POST | `/checkout/start` | Open a payment for the cart |
//! | POST | `/checkout/confirm` | Confirm and place the order |
//! | GET | `/orders/my` | Caller's orders |
//! | GET | `/admin/orders` | All orders (admin) |

pub mod auth;
pub mod catalog;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use auth::{AdminUser, AuthUser, Role, TokenSigner};
pub use catalog::HttpCatalog;
pub use error::{ApiError, ErrorResponse};
pub use routes::create_router;
pub use state::{AppConfig, AppState};
