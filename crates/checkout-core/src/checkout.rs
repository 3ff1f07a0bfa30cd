//! # Checkout Orchestrator
//!
//! Choreography over the cart, the ledger and (through the ledger) the materializer. It holds
//! no state of its own: every step re-reads what it needs, so clients may retry a step or run
//! the steps out of order.
//!
//! ```text
//! start:   validate customer/address ─► read cart ─► ledger.initiate(cart total)
//! confirm: read cart ─► build payload ─► ledger.verify ─► clear cart (when this call completed it)
//! ```

use crate::cart::Cart;
use crate::cart_store::CartStore;
use crate::error::{CheckoutError, CheckoutResult};
use crate::ledger::{InitiatePayment, InitiatedPayment, PaymentLedger, VerifyPayment};
use crate::order::{CheckoutPayload, Customer, OrderItem, ShippingAddress};
use crate::payment::{Payment, ReportedStatus};
use crate::product::Currency;
use tracing::{info, instrument};

/// Open a payment for the caller's cart
#[derive(Debug, Clone)]
pub struct StartCheckout {
    pub user_id: String,
    pub customer: Customer,
    pub address: ShippingAddress,
    pub provider: Option<String>,
    pub currency: Currency,
    pub shipping: i64,
    pub tax: i64,
}

/// Report the outcome of a checkout's payment
#[derive(Debug, Clone)]
pub struct ConfirmCheckout {
    pub user_id: String,
    pub payment_id: String,
    pub status: ReportedStatus,
    pub provider_payment_id: Option<String>,
    pub provider_signature: Option<String>,
    pub customer: Customer,
    pub address: ShippingAddress,
    pub shipping: i64,
    pub tax: i64,
}

/// Result of [`CheckoutOrchestrator::start`]
#[derive(Debug, Clone)]
pub struct CheckoutStarted {
    pub initiated: InitiatedPayment,
    /// Cart the amount was quoted from
    pub cart: Cart,
}

#[derive(Clone)]
pub struct CheckoutOrchestrator {
    carts: CartStore,
    ledger: PaymentLedger,
}

impl CheckoutOrchestrator {
    pub fn new(carts: CartStore, ledger: PaymentLedger) -> Self {
        Self { carts, ledger }
    }

    pub fn carts(&self) -> &CartStore {
        &self.carts
    }

    pub fn ledger(&self) -> &PaymentLedger {
        &self.ledger
    }

    /// Validate shipping details and open a payment for cart total + shipping + tax
    #[instrument(skip(self, request), fields(user_id = %request.user_id))]
    pub async fn start(&self, request: StartCheckout) -> CheckoutResult<CheckoutStarted> {
        request.customer.validate()?;
        request.address.validate()?;
        non_negative("shipping", request.shipping)?;
        non_negative("tax", request.tax)?;

        let cart = self.carts.get_cart(&request.user_id).await?;
        if cart.is_empty() {
            return Err(CheckoutError::validation("cart", "cart is empty"));
        }

        let initiated = self
            .ledger
            .initiate(InitiatePayment {
                user_id: request.user_id,
                amount: cart.total_amount + request.shipping + request.tax,
                currency: request.currency,
                provider: request.provider,
                order_id: None,
            })
            .await?;

        Ok(CheckoutStarted { initiated, cart })
    }

    /// Verify the payment with a payload built from the current cart, then clear the cart.
    ///
    /// A retry after the cart was already cleared works as long as the first attempt linked
    /// the order: no payload is needed once a payment has one.
    #[instrument(skip(self, request), fields(user_id = %request.user_id, payment_id = %request.payment_id))]
    pub async fn confirm(&self, request: ConfirmCheckout) -> CheckoutResult<Payment> {
        let payment = self
            .ledger
            .get_for_user(&request.payment_id, &request.user_id)
            .await?;

        let checkout = if request.status == ReportedStatus::Completed && payment.order_id.is_none()
        {
            let cart = self.carts.get_cart(&request.user_id).await?;
            if cart.is_empty() {
                return Err(CheckoutError::validation(
                    "cart",
                    "cart is empty; nothing to place an order for",
                ));
            }
            Some(payload_from_cart(
                &cart,
                payment.currency,
                request.customer,
                request.address,
                request.shipping,
                request.tax,
            ))
        } else {
            None
        };

        self.verify_payment(VerifyPayment {
            payment_id: request.payment_id,
            user_id: request.user_id,
            status: request.status,
            provider_payment_id: request.provider_payment_id,
            provider_signature: request.provider_signature,
            checkout,
        })
        .await
    }

    /// Open a payment; the amount defaults to the caller's current cart total
    pub async fn initiate_payment(
        &self,
        user_id: &str,
        amount: Option<i64>,
        currency: Currency,
        provider: Option<String>,
        order_id: Option<String>,
    ) -> CheckoutResult<InitiatedPayment> {
        let amount = match amount {
            Some(amount) => amount,
            None => self.carts.get_cart(user_id).await?.total_amount,
        };
        self.ledger
            .initiate(InitiatePayment {
                user_id: user_id.to_string(),
                amount,
                currency,
                provider,
                order_id,
            })
            .await
    }

    /// Verify a payment with a caller-built payload.
    ///
    /// The cart is cleared only by the call that completed the payment. A retry of an
    /// already-completed payment leaves whatever the user has put in the cart since.
    pub async fn verify_payment(&self, request: VerifyPayment) -> CheckoutResult<Payment> {
        let user_id = request.user_id.clone();
        let outcome = self.ledger.verify(request).await?;

        if outcome.completed_now {
            self.carts.clear(&user_id).await?;
            info!("Checkout {} complete, cart cleared", outcome.payment.id);
        }
        Ok(outcome.payment)
    }
}

fn non_negative(field: &str, value: i64) -> CheckoutResult<()> {
    if value < 0 {
        return Err(CheckoutError::validation(field, "must not be negative"));
    }
    Ok(())
}

/// Snapshot the cart into an order payload
pub fn payload_from_cart(
    cart: &Cart,
    currency: Currency,
    customer: Customer,
    address: ShippingAddress,
    shipping: i64,
    tax: i64,
) -> CheckoutPayload {
    let items = cart
        .items
        .iter()
        .map(|line| OrderItem {
            product_id: line.product_id.to_string(),
            name: line.name.clone(),
            price: line.unit_price,
            quantity: line.quantity,
            image: None,
        })
        .collect();

    CheckoutPayload {
        items,
        currency,
        subtotal: Some(cart.total_amount),
        shipping,
        tax,
        total: cart.total_amount + shipping + tax,
        customer,
        address,
    }
}
