use std::sync::Arc;

use client_core::{
    pages::StatusFilter, AdminClient, ClientEvent, GuardDecision, MemoryGateway, ProfileFallback,
    RemoteGateway,
};
use serde_json::json;
use shared::{
    domain::{AuthUserId, Collection, OrderStatus, Role, UserAccountId},
    protocol::JsonObject,
};

fn object(value: serde_json::Value) -> JsonObject {
    match value {
        serde_json::Value::Object(map) => map,
        other => panic!("expected object, got {other}"),
    }
}

async fn seeded_backend() -> (Arc<MemoryGateway>, UserAccountId) {
    let gateway = Arc::new(MemoryGateway::new());
    let auth_id = AuthUserId::new_random();
    let cashier_id = UserAccountId::new_random();
    gateway
        .add_account("caja@zahub.test", "turno-noche", auth_id)
        .await;
    gateway
        .seed(
            Collection::Users,
            vec![object(json!({
                "id": cashier_id.to_string(),
                "auth_user_id": auth_id.to_string(),
                "nombre": "Valentina",
                "email": "caja@zahub.test",
                "rol": "CAJERO",
                "activo": true,
                "created_at": "2024-02-01T12:00:00Z",
            }))],
        )
        .await;
    let orders = (0..4)
        .map(|i| {
            object(json!({
                "id": uuid::Uuid::new_v4().to_string(),
                "estado": if i % 2 == 0 { "PENDIENTE" } else { "ENTREGADO" },
                "total": 30000,
                "metodo_pago": "EFECTIVO",
                "direccion_entrega": "Cra 7 #45-10",
                "created_at": format!("2024-06-0{}T20:00:00Z", i + 1),
                "usuarios_app": { "nombre": "Cliente" },
            }))
        })
        .collect();
    gateway.seed(Collection::Orders, orders).await;
    (gateway, cashier_id)
}

#[tokio::test]
async fn cashier_session_moves_an_order_through_the_kitchen() {
    let (gateway, cashier_id) = seeded_backend().await;
    let client = AdminClient::new(gateway.clone(), ProfileFallback::Restricted);
    client.start().await;
    assert_eq!(client.guard(), GuardDecision::RedirectToLogin);

    client
        .login("caja@zahub.test", "turno-noche")
        .await
        .expect("login");
    assert_eq!(client.guard(), GuardDecision::Render);
    assert_eq!(client.profile().map(|p| p.role), Some(Role::Cashier));

    let orders = client.orders_page();
    orders.load().await.expect("orders");
    let pending = orders
        .show(StatusFilter::Only(OrderStatus::Pending), 1)
        .await;
    assert_eq!(pending.total_items, 2);

    let target = pending.items[0].id;
    for status in [OrderStatus::Preparing, OrderStatus::Baking, OrderStatus::OutForDelivery] {
        assert!(orders
            .change_status(target, status)
            .await
            .expect("status")
            .is_committed());
    }
    assert_eq!(
        orders.show(StatusFilter::Only(OrderStatus::Pending), 1).await.total_items,
        1
    );

    let summary = client.dashboard().load().await.expect("dashboard");
    assert_eq!(summary.total_orders, 4);
    assert_eq!(summary.pending, 1);
    assert_eq!(summary.out_for_delivery, 1);
    assert_eq!(summary.user_count, 1);

    let created = orders
        .create_order(client_core::pages::OrdersPage::sample_order(cashier_id))
        .await
        .expect("create");
    assert_eq!(orders.orders().await[0].id, created.id);

    client.logout().await;
    assert_eq!(client.guard(), GuardDecision::RedirectToLogin);
    assert!(gateway.current_user().await.expect("user").is_none());
    client.shutdown().await;
}

#[tokio::test]
async fn notices_reach_client_subscribers() {
    let (gateway, _) = seeded_backend().await;
    let client = AdminClient::new(gateway.clone(), ProfileFallback::Restricted);
    client.start().await;
    client
        .login("caja@zahub.test", "turno-noche")
        .await
        .expect("login");
    let mut events = client.subscribe_events();

    let users = client.users_page();
    users.load().await.expect("users");
    let id = users.users().await[0].id;
    gateway
        .fail_updates(Some(shared::error::ApiException::transport("socket closed")))
        .await;

    users.toggle_active(id).await.expect("toggle");

    assert!(users.users().await[0].active);
    let mut notices = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let ClientEvent::Notice(notice) = event {
            notices.push(notice);
        }
    }
    assert_eq!(notices.len(), 1);
    client.shutdown().await;
}
