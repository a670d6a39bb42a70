use async_trait::async_trait;
use axum::http::StatusCode;
use axum_test::TestServer;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use shop_api::{create_router, AppConfig, AppState, SessionStore};
use shop_core::{
    CheckoutSession, Currency, FutureUsage, InMemoryStore, IntentRequest, NewItem, OrderStatus,
    PaymentGateway, PaymentIntent, SessionRequest, ShopError, ShopResult, Store,
};
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct FakeGateway {
    fail_with: Option<String>,
    intents: Mutex<Vec<IntentRequest>>,
    sessions: Mutex<Vec<SessionRequest>>,
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn create_payment_intent(&self, request: &IntentRequest) -> ShopResult<PaymentIntent> {
        if let Some(message) = &self.fail_with {
            return Err(ShopError::Provider {
                provider: "fake".into(),
                message: message.clone(),
            });
        }
        self.intents.lock().unwrap().push(request.clone());
        Ok(PaymentIntent {
            id: "pi_test".into(),
            client_secret: "pi_test_secret".into(),
            amount: request.amount,
            currency: request.currency,
        })
    }

    async fn create_checkout_session(&self, request: &SessionRequest) -> ShopResult<CheckoutSession> {
        if let Some(message) = &self.fail_with {
            return Err(ShopError::Provider {
                provider: "fake".into(),
                message: message.clone(),
            });
        }
        self.sessions.lock().unwrap().push(request.clone());
        Ok(CheckoutSession {
            session_id: "cs_test_1".into(),
            checkout_url: None,
        })
    }

    fn publishable_key(&self, currency: Currency) -> ShopResult<String> {
        Ok(format!("pk_test_{}", currency.as_str()))
    }

    fn provider_name(&self) -> &'static str {
        "fake"
    }
}

struct Harness {
    server: TestServer,
    gateway: Arc<FakeGateway>,
    store: Arc<InMemoryStore>,
    sessions: SessionStore,
}

async fn harness_with(gateway: FakeGateway) -> Harness {
    let config = AppConfig::from_lookup(|name| match name {
        "APP_SECRET_KEY" => Some("test-secret".to_string()),
        "BASE_URL" => Some("https://shop.example.com".to_string()),
        _ => None,
    })
    .unwrap();

    let store = Arc::new(InMemoryStore::new());
    store
        .create_item(NewItem::new("Test Item", "A test item", "10.99".parse().unwrap(), Currency::USD))
        .await
        .unwrap();

    let gateway = Arc::new(gateway);
    let state = AppState::with_parts(config, store.clone(), gateway.clone()).unwrap();
    let sessions = state.sessions.clone();

    let mut server = TestServer::new(create_router(state)).unwrap();
    server.save_cookies();

    Harness {
        server,
        gateway,
        store,
        sessions,
    }
}

async fn harness() -> Harness {
    harness_with(FakeGateway::default()).await
}

#[tokio::test]
async fn test_health() {
    let h = harness().await;

    let response = h.server.get("/health").await;

    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["status"], "healthy");
}

#[tokio::test]
async fn test_create_item() {
    let h = harness().await;

    let response = h
        .server
        .post("/create-item/")
        .json(&json!({
            "name": "Poster",
            "description": "A2 print",
            "price": "8.50",
            "currency": "EUR"
        }))
        .await;

    response.assert_status(StatusCode::CREATED);
    let body = response.json::<Value>();
    assert_eq!(body["id"], 2);
    assert_eq!(body["name"], "Poster");
    assert_eq!(body["price"], "8.50");
    assert_eq!(body["currency"], "EUR");

    let listing = h.server.get("/items/").await.json::<Value>();
    assert_eq!(listing["count"], 2);
}

#[tokio::test]
async fn test_create_item_validation_errors() {
    let h = harness().await;

    let response = h
        .server
        .post("/create-item/")
        .json(&json!({ "description": "no name", "price": "1.234", "currency": "XYZ" }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body = response.json::<Value>();
    assert!(body["name"].is_array());
    assert!(body["currency"].is_array());
}

#[tokio::test]
async fn test_item_page_carries_publishable_key() {
    let h = harness().await;

    let response = h.server.get("/item/1/").await;

    response.assert_status_ok();
    let page = response.text();
    assert!(page.contains("Test Item"));
    assert!(page.contains("pk_test_usd"));

    h.server.get("/item/999/").await.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_add_to_order_twice_merges_line() {
    let h = harness().await;

    let response = h
        .server
        .post("/add-to-order/1/")
        .form(&[("quantity", "2")])
        .await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["message"], "Item added to cart!");

    h.server.post("/add-to-order/1/").await.assert_status_ok();

    let order = h.store.order(1).await.unwrap();
    assert_eq!(order.lines.len(), 1);
    assert_eq!(order.lines[0].quantity, 3);
    assert_eq!(order.total_price, "32.97".parse::<Decimal>().unwrap());
}

#[tokio::test]
async fn test_add_to_order_bad_quantity_counts_as_one() {
    let h = harness().await;

    h.server
        .post("/add-to-order/1/")
        .form(&[("quantity", "lots")])
        .await
        .assert_status_ok();

    let order = h.store.order(1).await.unwrap();
    assert_eq!(order.lines[0].quantity, 1);
}

#[tokio::test]
async fn test_add_unknown_item_is_not_found() {
    let h = harness().await;

    let response = h.server.post("/add-to-order/42/").await;

    response.assert_status(StatusCode::NOT_FOUND);
    assert!(response.json::<Value>()["error"].is_string());
}

#[tokio::test]
async fn test_cart_page_and_clear() {
    let h = harness().await;
    h.server
        .post("/add-to-order/1/")
        .form(&[("quantity", "2")])
        .await
        .assert_status_ok();

    let page = h.server.get("/cart/").await;
    page.assert_status_ok();
    let text = page.text();
    assert!(text.contains("Test Item"));
    assert!(text.contains("21.98"));
    assert!(text.contains("pk_test_usd"));

    let cleared = h.server.get("/clear-cart/").await;
    cleared.assert_status(StatusCode::SEE_OTHER);
    assert_eq!(cleared.header("location"), "/cart/");

    let order = h.store.order(1).await.unwrap();
    assert!(order.lines.is_empty());
    assert_eq!(order.total_price, Decimal::ZERO);
}

#[tokio::test]
async fn test_clear_cart_drops_the_session() {
    let h = harness().await;
    h.server.post("/add-to-order/1/").await.assert_status_ok();
    assert_eq!(h.sessions.active_sessions().await, 1);

    h.server
        .get("/clear-cart/")
        .await
        .assert_status(StatusCode::SEE_OTHER);
    assert_eq!(h.sessions.active_sessions().await, 0);

    // The old cookie no longer maps to a cart, so the next add starts a new one
    h.server.post("/add-to-order/1/").await.assert_status_ok();
    let order = h.store.order(2).await.unwrap();
    assert_eq!(order.lines[0].quantity, 1);
}

#[tokio::test]
async fn test_clear_without_cart_still_redirects() {
    let h = harness().await;

    let response = h.server.get("/clear-cart/").await;

    response.assert_status(StatusCode::SEE_OTHER);
}

#[tokio::test]
async fn test_discount_tax_and_order_intent() {
    let h = harness().await;
    h.server
        .post("/add-to-order/1/")
        .form(&[("quantity", "2")])
        .await
        .assert_status_ok();

    let discounted = h
        .server
        .post("/order/1/discount/")
        .json(&json!({ "rate": "10" }))
        .await;
    discounted.assert_status_ok();
    assert_eq!(discounted.json::<Value>()["total_price"], "19.78");

    let taxed = h.server.post("/order/1/tax/").json(&json!({ "rate": 5 })).await;
    taxed.assert_status_ok();
    assert_eq!(taxed.json::<Value>()["total_price"], "20.77");

    let response = h.server.post("/create-checkout-session-for-order/1/").await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["client_secret"], "pi_test_secret");

    let intents = h.gateway.intents.lock().unwrap();
    assert_eq!(intents[0].amount, 2077);
    assert_eq!(intents[0].setup_future_usage, Some(FutureUsage::OffSession));
}

#[tokio::test]
async fn test_checkout_order_itemized_session() {
    let h = harness().await;
    h.server
        .post("/add-to-order/1/")
        .form(&[("quantity", "2")])
        .await
        .assert_status_ok();
    h.server
        .post("/order/1/discount/")
        .json(&json!({ "rate": "10" }))
        .await
        .assert_status_ok();

    let response = h.server.post("/checkout-order/1/").await;

    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["sessionId"], "cs_test_1");

    let sessions = h.gateway.sessions.lock().unwrap();
    let request = &sessions[0];
    assert_eq!(request.line_items.len(), 2);
    assert_eq!(request.line_items[1].name, "Discount");
    assert_eq!(request.line_items[1].unit_amount, -220);
    let charged: i64 = request
        .line_items
        .iter()
        .map(|line| line.unit_amount * i64::from(line.quantity))
        .sum();
    assert_eq!(charged, 1978);
    assert_eq!(request.success_url, "https://shop.example.com/payment-success/");
    assert_eq!(request.cancel_url, "https://shop.example.com/payment/cancel/");
}

#[tokio::test]
async fn test_out_of_range_rate_is_rejected_and_order_stays_usable() {
    let h = harness().await;
    h.store
        .create_item(NewItem::new("Big", "b", "99999999.99".parse().unwrap(), Currency::USD))
        .await
        .unwrap();
    h.server
        .post("/add-to-order/2/")
        .form(&[("quantity", "1000")])
        .await
        .assert_status_ok();

    for path in ["/order/1/discount/", "/order/1/tax/"] {
        let response = h
            .server
            .post(path)
            .json(&json!({ "rate": "1000000000000000000000" }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert!(response.json::<Value>()["error"].is_string());
    }

    h.server.get("/cart/").await.assert_status_ok();
    h.server.post("/add-to-order/2/").await.assert_status_ok();
    h.server.post("/checkout-order/1/").await.assert_status_ok();

    let sessions = h.gateway.sessions.lock().unwrap();
    assert_eq!(sessions[0].line_items.len(), 1);
    assert_eq!(sessions[0].line_items[0].quantity, 1001);
}

#[tokio::test]
async fn test_paid_order_cannot_be_repriced() {
    let h = harness().await;
    h.server.post("/add-to-order/1/").await.assert_status_ok();
    h.store.set_status(1, OrderStatus::Paid).await.unwrap();

    let response = h
        .server
        .post("/order/1/discount/")
        .json(&json!({ "rate": "50" }))
        .await;

    response.assert_status(StatusCode::CONFLICT);
    let order = h.store.order(1).await.unwrap();
    assert!(order.discounts.is_empty());
    assert_eq!(order.total_price, "10.99".parse::<Decimal>().unwrap());
}

#[tokio::test]
async fn test_checkout_empty_order_is_rejected() {
    let h = harness().await;
    h.server.get("/cart/").await.assert_status_ok();

    let response = h.server.post("/checkout-order/1/").await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(response.json::<Value>()["error"], "Order is empty");

    let response = h.server.post("/create-checkout-session-for-order/1/").await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(response.json::<Value>()["error"], "Order is empty");
}

#[tokio::test]
async fn test_item_intents() {
    let h = harness().await;

    let response = h.server.post("/create-checkout-session/1/").await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["clientSecret"], "pi_test_secret");

    for path in ["/create-intent/1/", "/create-payment-intent/1/"] {
        let response = h.server.post(path).await;
        response.assert_status_ok();
        assert_eq!(response.json::<Value>()["client_secret"], "pi_test_secret");
    }

    let intents = h.gateway.intents.lock().unwrap();
    assert_eq!(intents.len(), 3);
    assert_eq!(intents[0].amount, 1099);
    assert_eq!(intents[0].setup_future_usage, None);
    assert_eq!(intents[1].setup_future_usage, Some(FutureUsage::OffSession));
    assert_eq!(intents[2].setup_future_usage, Some(FutureUsage::OffSession));
}

#[tokio::test]
async fn test_payment_failure_is_bad_request() {
    let h = harness_with(FakeGateway {
        fail_with: Some("Your card was declined.".to_string()),
        ..Default::default()
    })
    .await;

    let response = h.server.post("/create-payment-intent/1/").await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(response.json::<Value>()["error"], "Your card was declined.");

    h.server.post("/add-to-order/1/").await.assert_status_ok();
    let before = h.store.order(1).await.unwrap();

    let response = h.server.post("/checkout-order/1/").await;
    response.assert_status(StatusCode::BAD_REQUEST);

    let after = h.store.order(1).await.unwrap();
    assert_eq!(after.lines, before.lines);
    assert_eq!(after.total_price, before.total_price);
}

#[tokio::test]
async fn test_mixed_currency_is_rejected() {
    let h = harness().await;
    h.store
        .create_item(NewItem::new("Euro Item", "e", "5.00".parse().unwrap(), Currency::EUR))
        .await
        .unwrap();

    h.server.post("/add-to-order/1/").await.assert_status_ok();
    let response = h.server.post("/add-to-order/2/").await;

    response.assert_status(StatusCode::BAD_REQUEST);
    assert!(response.json::<Value>()["error"].is_string());
}

#[tokio::test]
async fn test_pages() {
    let h = harness().await;

    h.server.get("/payment-success/").await.assert_status_ok();
    h.server.get("/payment/cancel/").await.assert_status_ok();
}
