//! # Order Types
//!
//! Orders are immutable commercial records: items, customer and address are copied in at
//! materialization time and never re-read from the catalog. After creation only the status,
//! tracking info and status history change.

use crate::error::{CheckoutError, CheckoutResult};
use crate::product::Currency;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Order pipeline status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Paid,
    Confirmed,
    Packed,
    Shipped,
    OutForDelivery,
    Delivered,
    Cancelled,
    Returned,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Paid => "paid",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Packed => "packed",
            OrderStatus::Shipped => "shipped",
            OrderStatus::OutForDelivery => "out_for_delivery",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Returned => "returned",
        }
    }

    /// Position in the forward pipeline; `None` for the side exits
    fn stage(&self) -> Option<u8> {
        match self {
            OrderStatus::Paid => Some(0),
            OrderStatus::Confirmed => Some(1),
            OrderStatus::Packed => Some(2),
            OrderStatus::Shipped => Some(3),
            OrderStatus::OutForDelivery => Some(4),
            OrderStatus::Delivered => Some(5),
            OrderStatus::Cancelled | OrderStatus::Returned => None,
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = CheckoutError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        serde_json::from_value(serde_json::Value::String(s.to_string())).map_err(|_| {
            CheckoutError::validation("status", format!("unknown order status {:?}", s))
        })
    }
}

/// Which admin status changes are allowed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatusPolicy {
    /// Forward through the pipeline only; cancel before delivery, return after it
    #[default]
    Forward,
    /// Any status may overwrite any other
    Unrestricted,
}

impl OrderStatusPolicy {
    pub fn allows(&self, from: OrderStatus, to: OrderStatus) -> bool {
        if from == to {
            return true;
        }
        match self {
            OrderStatusPolicy::Unrestricted => true,
            OrderStatusPolicy::Forward => match (from.stage(), to) {
                (Some(5), OrderStatus::Returned) => true,
                (Some(stage), OrderStatus::Cancelled) => stage < 5,
                (Some(current), target) => target.stage().is_some_and(|next| next > current),
                (None, _) => false,
            },
        }
    }
}

impl std::str::FromStr for OrderStatusPolicy {
    type Err = CheckoutError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "forward" => Ok(OrderStatusPolicy::Forward),
            "unrestricted" => Ok(OrderStatusPolicy::Unrestricted),
            other => Err(CheckoutError::Configuration(format!(
                "ORDER_STATUS_POLICY must be 'forward' or 'unrestricted', got {:?}",
                other
            ))),
        }
    }
}

/// Item snapshot inside an order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub product_id: String,
    pub name: String,
    pub price: i64,
    pub quantity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl OrderItem {
    pub fn total(&self) -> i64 {
        self.price * i64::from(self.quantity)
    }
}

/// Customer snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

impl Customer {
    pub fn validate(&self) -> CheckoutResult<()> {
        require("customer.name", &self.name)?;
        require("customer.email", &self.email)?;
        if !self.email.contains('@') {
            return Err(CheckoutError::validation(
                "customer.email",
                "email address is not valid",
            ));
        }
        Ok(())
    }
}

/// Shipping address snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingAddress {
    #[serde(default)]
    pub line1: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line2: Option<String>,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub postal_code: String,
    #[serde(default)]
    pub country: String,
}

impl ShippingAddress {
    pub fn validate(&self) -> CheckoutResult<()> {
        require("address.line1", &self.line1)?;
        require("address.city", &self.city)?;
        require("address.state", &self.state)?;
        require("address.postalCode", &self.postal_code)?;
        require("address.country", &self.country)
    }
}

fn require(field: &str, value: &str) -> CheckoutResult<()> {
    if value.trim().is_empty() {
        return Err(CheckoutError::validation(field, "is required"));
    }
    Ok(())
}

/// Courier tracking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingInfo {
    pub tracking_number: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub courier_name: Option<String>,
}

/// One entry of an order's status history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusChange {
    pub status: OrderStatus,
    pub at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Everything needed to materialize an order once its payment completed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutPayload {
    #[serde(default)]
    pub items: Vec<OrderItem>,

    #[serde(default)]
    pub currency: Currency,

    /// Defaults to the sum of the item totals
    #[serde(default)]
    pub subtotal: Option<i64>,

    #[serde(default)]
    pub shipping: i64,

    #[serde(default)]
    pub tax: i64,

    pub total: i64,

    pub customer: Customer,

    pub address: ShippingAddress,
}

impl CheckoutPayload {
    pub fn items_total(&self) -> i64 {
        self.items.iter().map(OrderItem::total).sum()
    }

    pub fn subtotal(&self) -> i64 {
        self.subtotal.unwrap_or_else(|| self.items_total())
    }

    /// Check everything an order needs before it is persisted
    pub fn validate(&self) -> CheckoutResult<()> {
        if self.items.is_empty() {
            return Err(CheckoutError::validation(
                "items",
                "order must contain at least one item",
            ));
        }
        for (i, item) in self.items.iter().enumerate() {
            if item.product_id.trim().is_empty() {
                return Err(CheckoutError::validation(
                    format!("items[{}].productId", i),
                    "is required",
                ));
            }
            if item.quantity == 0 {
                return Err(CheckoutError::validation(
                    format!("items[{}].quantity", i),
                    "must be at least 1",
                ));
            }
            if item.price < 0 {
                return Err(CheckoutError::validation(
                    format!("items[{}].price", i),
                    "must not be negative",
                ));
            }
        }
        if self.subtotal() <= 0 {
            return Err(CheckoutError::validation("subtotal", "must be positive"));
        }
        if self.shipping < 0 {
            return Err(CheckoutError::validation("shipping", "must not be negative"));
        }
        if self.tax < 0 {
            return Err(CheckoutError::validation("tax", "must not be negative"));
        }
        if self.total <= 0 {
            return Err(CheckoutError::validation("total", "must be positive"));
        }
        self.customer.validate()?;
        self.address.validate()
    }
}

/// A persisted order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: String,

    /// Human-readable, globally unique (e.g. `ORD-482913-4F9A2C`)
    pub order_number: String,

    pub user_id: String,

    /// Payment that materialized this order; unique across orders
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checkout_key: Option<String>,

    pub status: OrderStatus,

    pub currency: Currency,

    pub subtotal: i64,
    pub shipping: i64,
    pub tax: i64,
    pub total: i64,

    pub items: Vec<OrderItem>,

    pub customer: Customer,

    pub address: ShippingAddress,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracking: Option<TrackingInfo>,

    #[serde(default)]
    pub status_history: Vec<StatusChange>,

    /// Optimistic concurrency version; 0 means "never persisted"
    #[serde(skip)]
    pub version: u64,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Build a paid order from a validated payload
    pub fn paid(
        order_number: impl Into<String>,
        user_id: impl Into<String>,
        checkout_key: Option<String>,
        payload: &CheckoutPayload,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            order_number: order_number.into(),
            user_id: user_id.into(),
            checkout_key,
            status: OrderStatus::Paid,
            currency: payload.currency,
            subtotal: payload.subtotal(),
            shipping: payload.shipping,
            tax: payload.tax,
            total: payload.total,
            items: payload.items.clone(),
            customer: payload.customer.clone(),
            address: payload.address.clone(),
            tracking: None,
            status_history: vec![StatusChange {
                status: OrderStatus::Paid,
                at: now,
                note: Some("Payment completed".to_string()),
            }],
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply a status change under `policy`. Returns `Ok(false)` for a no-op.
    pub fn change_status(
        &mut self,
        next: OrderStatus,
        policy: OrderStatusPolicy,
        note: Option<String>,
    ) -> CheckoutResult<bool> {
        if self.status == next {
            return Ok(false);
        }
        if !policy.allows(self.status, next) {
            return Err(CheckoutError::InvalidTransition {
                entity: "order",
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }

        let now = Utc::now();
        self.status = next;
        self.updated_at = now;
        self.status_history.push(StatusChange {
            status: next,
            at: now,
            note,
        });
        Ok(true)
    }

    pub fn set_tracking(&mut self, tracking: TrackingInfo) {
        self.tracking = Some(tracking);
        self.updated_at = Utc::now();
    }

    /// Total number of units across all items
    pub fn item_count(&self) -> u32 {
        self.items.iter().map(|i| i.quantity).sum()
    }
}

/// Filter for listing orders
#[derive(Debug, Clone, Default)]
pub struct OrderQuery {
    pub user_id: Option<String>,
    pub status: Option<OrderStatus>,
    /// Case-insensitive match on order number, customer name or email
    pub search: Option<String>,
    /// 1-based
    pub page: u32,
    pub limit: u32,
}

impl OrderQuery {
    pub const DEFAULT_LIMIT: u32 = 50;
    pub const MAX_LIMIT: u32 = 200;

    pub fn for_user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            ..Self::default()
        }
    }

    pub fn matches(&self, order: &Order) -> bool {
        if let Some(user_id) = &self.user_id {
            if &order.user_id != user_id {
                return false;
            }
        }
        if let Some(status) = self.status {
            if order.status != status {
                return false;
            }
        }
        match self.search.as_deref().map(str::trim) {
            Some(needle) if !needle.is_empty() => {
                let needle = needle.to_lowercase();
                order.order_number.to_lowercase().contains(&needle)
                    || order.customer.name.to_lowercase().contains(&needle)
                    || order.customer.email.to_lowercase().contains(&needle)
            }
            _ => true,
        }
    }

    /// Page number clamped to >= 1
    pub fn page(&self) -> u32 {
        self.page.max(1)
    }

    /// Limit clamped to `1..=MAX_LIMIT`, defaulting to `DEFAULT_LIMIT`
    pub fn limit(&self) -> u32 {
        match self.limit {
            0 => Self::DEFAULT_LIMIT,
            n => n.min(Self::MAX_LIMIT),
        }
    }
}

/// One page of orders, newest first
#[derive(Debug, Clone, Serialize)]
pub struct OrderPage {
    pub orders: Vec<Order>,
    pub total: usize,
    pub page: u32,
    pub limit: u32,
    pub pages: u32,
}

impl OrderPage {
    /// Sort newest first and cut out the requested page
    pub fn paginate(mut matching: Vec<Order>, query: &OrderQuery) -> Self {
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let page = query.page();
        let limit = query.limit();
        let total = matching.len();
        let pages = total.div_ceil(limit as usize) as u32;
        let orders = matching
            .into_iter()
            .skip((page as usize - 1) * limit as usize)
            .take(limit as usize)
            .collect();

        Self {
            orders,
            total,
            page,
            limit,
            pages,
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn payload(total: i64) -> CheckoutPayload {
        CheckoutPayload {
            items: vec![OrderItem {
                product_id: "prod-A".into(),
                name: "Cotton Kurta".into(),
                price: total,
                quantity: 1,
                image: None,
            }],
            currency: Currency::INR,
            subtotal: None,
            shipping: 0,
            tax: 0,
            total,
            customer: Customer {
                name: "Asha Rao".into(),
                email: "asha@example.com".into(),
                phone: Some("+91 98450 00000".into()),
            },
            address: ShippingAddress {
                line1: "12 MG Road".into(),
                line2: None,
                city: "Bengaluru".into(),
                state: "KA".into(),
                postal_code: "560001".into(),
                country: "IN".into(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::payload;
    use super::*;

    #[test]
    fn test_payload_validation() {
        assert!(payload(500).validate().is_ok());

        let mut empty = payload(500);
        empty.items.clear();
        assert_eq!(empty.validate().unwrap_err().field(), Some("items"));

        let mut zero_total = payload(500);
        zero_total.total = 0;
        assert_eq!(zero_total.validate().unwrap_err().field(), Some("total"));

        let mut no_city = payload(500);
        no_city.address.city = "  ".into();
        assert_eq!(no_city.validate().unwrap_err().field(), Some("address.city"));

        let mut bad_email = payload(500);
        bad_email.customer.email = "not-an-email".into();
        assert_eq!(
            bad_email.validate().unwrap_err().field(),
            Some("customer.email")
        );
    }

    #[test]
    fn test_paid_order_snapshots_payload() {
        let p = payload(500);
        let order = Order::paid("ORD-1", "u1", Some("pay-1".into()), &p);

        assert_eq!(order.status, OrderStatus::Paid);
        assert_eq!(order.total, 500);
        assert_eq!(order.subtotal, 500);
        assert_eq!(order.items, p.items);
        assert_eq!(order.status_history.len(), 1);
    }

    #[test]
    fn test_forward_policy() {
        use OrderStatus::*;
        let policy = OrderStatusPolicy::Forward;

        assert!(policy.allows(Paid, Confirmed));
        assert!(policy.allows(Paid, Shipped));
        assert!(policy.allows(Shipped, Cancelled));
        assert!(policy.allows(Delivered, Returned));

        assert!(!policy.allows(Shipped, Packed));
        assert!(!policy.allows(Delivered, Cancelled));
        assert!(!policy.allows(Paid, Returned));
        assert!(!policy.allows(Cancelled, Paid));
        assert!(!policy.allows(Returned, Delivered));
    }

    #[test]
    fn test_unrestricted_policy() {
        let policy = OrderStatusPolicy::Unrestricted;
        assert!(policy.allows(OrderStatus::Cancelled, OrderStatus::Paid));
        assert!(policy.allows(OrderStatus::Delivered, OrderStatus::Packed));
    }

    #[test]
    fn test_change_status_records_history() {
        let mut order = Order::paid("ORD-1", "u1", None, &payload(500));
        assert!(order
            .change_status(OrderStatus::Packed, OrderStatusPolicy::Forward, None)
            .unwrap());
        assert!(!order
            .change_status(OrderStatus::Packed, OrderStatusPolicy::Forward, None)
            .unwrap());
        assert!(order
            .change_status(OrderStatus::Paid, OrderStatusPolicy::Forward, None)
            .is_err());

        let statuses: Vec<_> = order.status_history.iter().map(|c| c.status).collect();
        assert_eq!(statuses, vec![OrderStatus::Paid, OrderStatus::Packed]);
    }

    #[test]
    fn test_status_parsing() {
        assert_eq!(
            "out_for_delivery".parse::<OrderStatus>().unwrap(),
            OrderStatus::OutForDelivery
        );
        assert!("new".parse::<OrderStatus>().is_err());
        assert!("sideways".parse::<OrderStatusPolicy>().is_err());
    }

    #[test]
    fn test_query_matching_and_pagination() {
        let mut orders = Vec::new();
        for i in 0..5 {
            let mut order = Order::paid(format!("ORD-{}", i), "u1", None, &payload(100));
            order.created_at = order.created_at + chrono::Duration::seconds(i);
            orders.push(order);
        }
        let query = OrderQuery {
            search: Some("ord-".into()),
            page: 2,
            limit: 2,
            ..OrderQuery::default()
        };
        assert!(orders.iter().all(|o| query.matches(o)));

        let page = OrderPage::paginate(orders, &query);
        assert_eq!(page.total, 5);
        assert_eq!(page.pages, 3);
        let numbers: Vec<_> = page.orders.iter().map(|o| o.order_number.as_str()).collect();
        assert_eq!(numbers, vec!["ORD-2", "ORD-1"]);
    }

    #[test]
    fn test_query_search_by_customer() {
        let order = Order::paid("ORD-9", "u1", None, &payload(100));
        let hit = OrderQuery {
            search: Some("ASHA".into()),
            ..OrderQuery::default()
        };
        let miss = OrderQuery {
            search: Some("ravi".into()),
            ..OrderQuery::default()
        };
        assert!(hit.matches(&order));
        assert!(!miss.matches(&order));
        assert!(!OrderQuery::for_user("u2").matches(&order));
    }
}
