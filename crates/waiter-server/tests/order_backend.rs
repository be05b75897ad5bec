//! `HttpOrderSink` against a stand-in order backend.

use axum::{extract::Path, http::StatusCode, routing::post, Json, Router};
use serde_json::Value;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use waiter_agent::{HttpOrderSink, OrderSink, SinkError};
use waiter_menu::{CustomerDetails, Menu, OrderStore};

type Received = Arc<Mutex<Vec<(String, Value)>>>;

async fn backend(status: StatusCode) -> (String, Received) {
    let received: Received = Arc::default();
    let log = Arc::clone(&received);
    let router = Router::new().route(
        "/api/get-order-item/{call_id}/",
        post(move |Path(call_id): Path<String>, Json(order): Json<Value>| {
            let log = Arc::clone(&log);
            async move {
                log.lock().unwrap().push((call_id, order));
                (status, "stored")
            }
        }),
    );

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    (format!("http://{addr}"), received)
}

fn order() -> OrderStore {
    let mut store = OrderStore::new(Arc::new(Menu::sample()));
    store.add("pad_thai", 2, "extra spicy").unwrap();
    store.set_customer(CustomerDetails {
        customer_name: "Sam".to_string(),
        delivery_address: "12 Main St".to_string(),
        payment_method: "Cash".to_string(),
    });
    store
}

#[tokio::test]
async fn posts_the_order_snapshot() {
    let (url, received) = backend(StatusCode::OK).await;
    let sink = HttpOrderSink::new(format!("{url}/")).unwrap();

    sink.persist("call_77", &order().snapshot()).await.unwrap();

    let received = received.lock().unwrap();
    assert_eq!(received.len(), 1);
    let (call_id, body) = &received[0];
    assert_eq!(call_id, "call_77");
    assert_eq!(body["customer_name"], "Sam");
    assert_eq!(body["payment_method"], "Cash");
    assert_eq!(body["items"][0]["item_id"], "pad_thai");
    assert_eq!(body["items"][0]["quantity"], 2);
    assert_eq!(body["items"][0]["special_instructions"], "extra spicy");
    assert!(body["total"].as_f64().unwrap() > 0.0);
    assert!(body["order_time"].is_string());
}

#[tokio::test]
async fn non_success_status_is_an_error() {
    let (url, _) = backend(StatusCode::INTERNAL_SERVER_ERROR).await;
    let sink = HttpOrderSink::new(url).unwrap();

    let error = sink.persist("call_1", &order().snapshot()).await.unwrap_err();
    assert!(
        matches!(error, SinkError::Status { status: 500, ref body } if body == "stored"),
        "{error:?}"
    );
}

#[tokio::test]
async fn unreachable_backend_is_a_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let sink = HttpOrderSink::new(format!("http://{addr}")).unwrap();
    let error = sink.persist("call_1", &order().snapshot()).await.unwrap_err();
    assert!(matches!(error, SinkError::Transport(_)), "{error:?}");
}
