mod common;

use common::Shop;
use common::TestResult;
use sea_orm::EntityTrait;
use sea_orm::PaginatorTrait;
use stockroom::prelude::*;

#[tokio::test]
async fn ship_then_cancel_restocks() -> TestResult {
    let shop = Shop::open().await?;
    let p = shop.product(1, "Linen Shirt", 10, Some(5)).await?;

    let order = shop.order(&[(&p, 4)]).await?;
    assert_eq!(order.order.status, OrderStatus::Pending);
    assert_eq!(order.order.payment_status, PaymentStatus::Pending);
    assert!(order.order.order_number.starts_with("ORD-"));
    assert_eq!(order.items[0].reserved_quantity, 4);
    let rec = shop.record(&p).await?;
    assert_eq!((rec.reserved_quantity, rec.available_quantity), (4, 6));
    assert_eq!(rec.inventory_status, InventoryStatus::InStock);

    let order = shop.set_status(&order, OrderStatus::Shipped).await?;
    assert_eq!(order.order.status, OrderStatus::Shipped);
    assert_eq!((order.items[0].reserved_quantity, order.items[0].shipped_quantity), (0, 4));
    assert_eq!(shop.counters(&p).await?, (6, 0, 6));

    let order = shop.set_status(&order, OrderStatus::Cancelled).await?;
    assert_eq!(order.order.status, OrderStatus::Cancelled);
    assert_eq!(shop.counters(&p).await?, (10, 0, 10));

    let history = shop.stockroom.inventory()?.history(&p).await?;
    let kinds: Vec<HistoryKind> = history.iter().map(|h| h.kind).collect();
    assert_eq!(
        kinds,
        vec![
            HistoryKind::StockIn,
            HistoryKind::Reservation,
            HistoryKind::StockOut,
            HistoryKind::StockIn
        ]
    );
    assert!(history[1..]
        .iter()
        .all(|h| h.reference.as_deref() == Some(order.order.order_number.as_str())));

    shop.close().await
}

#[tokio::test]
async fn happy_path_to_delivery() -> TestResult {
    let shop = Shop::open().await?;
    let p = shop.product(2, "Ceramic Mug", 20, None).await?;
    let order = shop.order(&[(&p, 3)]).await?;

    let order = shop.set_status(&order, OrderStatus::Confirmed).await?;
    assert_eq!(shop.counters(&p).await?, (20, 3, 17));
    let order = shop.set_status(&order, OrderStatus::Processing).await?;
    assert_eq!(shop.counters(&p).await?, (20, 3, 17));
    let order = shop.set_status(&order, OrderStatus::Shipped).await?;
    assert_eq!(shop.counters(&p).await?, (17, 0, 17));

    let order = shop.set_status(&order, OrderStatus::Delivered).await?;
    assert_eq!(order.order.payment_status, PaymentStatus::Paid);
    assert_eq!(shop.counters(&p).await?, (17, 0, 17));

    let fetched = shop.stockroom.lifecycle()?.get_order(order.order.id).await?;
    assert_eq!(fetched.order.status, OrderStatus::Delivered);
    assert_eq!(fetched.items, order.items);
    let by_number = shop
        .stockroom
        .lifecycle()?
        .find_order(&order.order.order_number)
        .await?;
    assert_eq!(by_number.order.id, order.order.id);
    assert_eq!(
        shop.stockroom.lifecycle()?.orders_in(OrderStatus::Delivered).await?.len(),
        1
    );

    shop.close().await
}

#[tokio::test]
async fn delivery_release_is_idempotent() -> TestResult {
    let shop = Shop::open().await?;
    let p = shop.product(3, "Wool Scarf", 10, None).await?;
    let other = shop.order(&[(&p, 2)]).await?;
    let order = shop.order(&[(&p, 3)]).await?;

    let order = shop.set_status(&order, OrderStatus::Shipped).await?;
    let order = shop.set_status(&order, OrderStatus::Delivered).await?;
    assert_eq!(shop.counters(&p).await?, (7, 2, 5));

    // Delivered again, and bounced through shipped: nothing is released twice, nothing ships twice.
    let order = shop.set_status(&order, OrderStatus::Delivered).await?;
    let order = shop.set_status(&order, OrderStatus::Shipped).await?;
    let order = shop.set_status(&order, OrderStatus::Delivered).await?;
    assert_eq!(order.order.status, OrderStatus::Delivered);
    assert_eq!(shop.counters(&p).await?, (7, 2, 5));

    // The other order's reservation is untouched.
    assert_eq!(
        shop.stockroom.lifecycle()?.get_order(other.order.id).await?.items[0].reserved_quantity,
        2
    );

    shop.close().await
}

#[tokio::test]
async fn cancelling_active_orders_releases() -> TestResult {
    let shop = Shop::open().await?;
    let p = shop.product(4, "Canvas Tote", 6, None).await?;

    for status in [OrderStatus::Pending, OrderStatus::Confirmed, OrderStatus::Processing] {
        let order = shop.order(&[(&p, 5)]).await?;
        let order = if status == OrderStatus::Pending {
            order
        }
        else {
            shop.set_status(&order, status).await?
        };
        assert_eq!(shop.counters(&p).await?, (6, 5, 1));

        let order = shop.set_status(&order, OrderStatus::Cancelled).await?;
        assert_eq!(order.items[0].reserved_quantity, 0);
        assert_eq!(shop.counters(&p).await?, (6, 0, 6));

        // Leaving cancelled for an active status doesn't reserve anything again.
        shop.set_status(&order, OrderStatus::Pending).await?;
        assert_eq!(shop.counters(&p).await?, (6, 0, 6));
    }

    shop.close().await
}

#[tokio::test]
async fn failed_checkout_changes_nothing() -> TestResult {
    let shop = Shop::open().await?;
    let a = shop.product(5, "Rain Jacket", 10, None).await?;
    let b = shop.product(6, "Denim Cap", 1, None).await?;

    let err = shop.order(&[(&a, 4), (&b, 2)]).await.unwrap_err();
    assert!(matches!(err, LedgerError::InsufficientStock { .. }), "{err}");
    assert!(err.to_string().contains("Denim Cap"), "{err}");
    assert_eq!(err.shortfall(), 1);
    assert_eq!(err.status_code(), 409);

    assert_eq!(shop.counters(&a).await?, (10, 0, 10));
    assert_eq!(shop.counters(&b).await?, (1, 0, 1));
    assert_eq!(Orders::find().count(&shop.driver.connection()).await?, 0);
    assert_eq!(OrderItems::find().count(&shop.driver.connection()).await?, 0);
    assert_eq!(shop.stockroom.inventory()?.history(&a).await?.len(), 1);

    // Same product on two lines is checked against the running total.
    assert!(shop.order(&[(&a, 6), (&a, 5)]).await.is_err());
    assert_eq!(shop.counters(&a).await?, (10, 0, 10));
    let order = shop.order(&[(&a, 6), (&a, 4)]).await?;
    assert_eq!(order.items.len(), 2);
    assert_eq!(shop.counters(&a).await?, (10, 10, 0));
    assert_eq!(shop.record(&a).await?.inventory_status, InventoryStatus::OutOfStock);

    shop.close().await
}

#[tokio::test]
async fn failed_transition_keeps_status() -> TestResult {
    let shop = Shop::open().await?;
    let a = shop.product(7, "Linen Trousers", 5, None).await?;
    let b = shop.product(8, "Silk Tie", 5, None).await?;
    let order = shop.order(&[(&a, 2), (&b, 3)]).await?;

    // The tie disappears from the warehouse after it was reserved.
    shop.stockroom
        .inventory()?
        .manual_adjust(&b, -4, AdjustmentKind::Damage, "Moth damage", None)
        .await?;

    let err = shop.set_status(&order, OrderStatus::Shipped).await.unwrap_err();
    assert!(matches!(err, LedgerError::InsufficientStock { .. }), "{err}");

    let order = shop.stockroom.lifecycle()?.get_order(order.order.id).await?;
    assert_eq!(order.order.status, OrderStatus::Pending);
    assert_eq!(order.items[0].shipped_quantity, 0);
    // The first line was not shipped either.
    assert_eq!(shop.counters(&a).await?, (5, 2, 3));
    assert_eq!(shop.counters(&b).await?, (1, 3, -2));

    shop.close().await
}

#[tokio::test]
async fn same_status_updates_notes_only() -> TestResult {
    let shop = Shop::open().await?;
    let p = shop.product(9, "Leather Belt", 5, None).await?;
    let order = shop.order(&[(&p, 1)]).await?;

    let updated = shop
        .stockroom
        .lifecycle()?
        .update_order_status(
            order.order.id,
            StatusUpdate::to(OrderStatus::Pending)
                .notes("Call before delivery")
                .tracking_number("TRK-42"),
            None,
        )
        .await?;
    assert_eq!(updated.order.status, OrderStatus::Pending);
    assert_eq!(updated.order.notes.as_deref(), Some("Call before delivery"));
    assert_eq!(updated.order.tracking_number.as_deref(), Some("TRK-42"));
    assert_eq!(shop.counters(&p).await?, (5, 1, 4));
    assert_eq!(shop.stockroom.inventory()?.history(&p).await?.len(), 2);

    shop.close().await
}

#[tokio::test]
async fn deleting_orders() -> TestResult {
    let shop = Shop::open().await?;
    let p = shop.product(10, "Cotton Socks", 10, None).await?;
    let lifecycle = shop.stockroom.lifecycle()?;

    let active = shop.order(&[(&p, 3)]).await?;
    let active = shop.set_status(&active, OrderStatus::Confirmed).await?;
    let shipped = shop.order(&[(&p, 2)]).await?;
    let shipped = shop.set_status(&shipped, OrderStatus::Shipped).await?;
    assert_eq!(shop.counters(&p).await?, (8, 3, 5));

    let deleted = lifecycle.delete_order(active.order.id, Some("admin")).await?;
    assert_eq!(deleted.order.id, active.order.id);
    assert_eq!(shop.counters(&p).await?, (8, 0, 8));

    // Settled orders go without touching the inventory.
    lifecycle.delete_order(shipped.order.id, None).await?;
    assert_eq!(shop.counters(&p).await?, (8, 0, 8));

    assert!(matches!(
        lifecycle.get_order(active.order.id).await,
        Err(LedgerError::OrderNotFound(_))
    ));
    assert!(matches!(
        lifecycle.delete_order(active.order.id, None).await,
        Err(LedgerError::OrderNotFound(_))
    ));
    assert_eq!(OrderItems::find().count(&shop.driver.connection()).await?, 0);

    shop.close().await
}

#[tokio::test]
async fn invalid_submissions_are_rejected_before_reserving() -> TestResult {
    let shop = Shop::open().await?;
    let p = shop.product(11, "Bucket Hat", 10, None).await?;
    let lifecycle = shop.stockroom.lifecycle()?;

    let mut sub = common::submission(&[(&p, 2)]);
    sub.shipping_info.address = String::new();
    let err = lifecycle.create_order(sub, None).await.unwrap_err();
    assert!(matches!(err, LedgerError::Validation(_)), "{err}");
    assert_eq!(err.status_code(), 400);

    let sub = common::submission(&[(&p, -1)]);
    assert!(matches!(
        lifecycle.create_order(sub, None).await,
        Err(LedgerError::Validation(_))
    ));

    let reply: Reply<OrderView> = lifecycle.create_order(common::submission(&[]), None).await.into();
    assert_eq!(reply.status(), 400);
    assert_eq!(serde_json::to_value(&reply)?["success"], false);

    assert_eq!(shop.counters(&p).await?, (10, 0, 10));

    shop.close().await
}

#[tokio::test]
async fn size_variants_are_separate_records() -> TestResult {
    let shop = Shop::open().await?;
    shop.stockroom
        .inventory()?
        .register(
            common::catalog_entry(12, "Oxford Shirt"),
            vec![NewStock::new("S", 2), NewStock::new("M", 5)],
            None,
        )
        .await?;
    let s = StockKey::new(12, "S");
    let m = StockKey::new(12, "M");

    let order = shop.order(&[(&m, 4), (&s, 2)]).await?;
    assert_eq!(order.items[0].size.as_deref(), Some("M"));
    assert_eq!(shop.counters(&m).await?, (5, 4, 1));
    assert_eq!(shop.counters(&s).await?, (2, 2, 0));

    let err = shop.order(&[(&s, 1)]).await.unwrap_err();
    assert!(err.to_string().contains("Oxford Shirt"), "{err}");

    shop.set_status(&order, OrderStatus::Shipped).await?;
    assert_eq!(shop.counters(&m).await?, (1, 0, 1));
    assert_eq!(shop.counters(&s).await?, (0, 0, 0));

    shop.close().await
}

#[tokio::test]
async fn concurrent_checkouts_never_oversell() -> TestResult {
    let shop = Shop::open().await?;
    let p = shop.product(13, "Limited Print", 10, None).await?;

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let stockroom = shop.stockroom.clone();
        let submission = common::submission(&[(&p, 2)]);
        tasks.push(tokio::spawn(async move {
            stockroom.lifecycle()?.create_order(submission, None).await
        }));
    }

    let mut placed = 0;
    let mut refused = 0;
    for task in tasks {
        match task.await? {
            Ok(_) => placed += 1,
            Err(LedgerError::InsufficientStock { .. }) => refused += 1,
            Err(err) => panic!("unexpected error: {err}"),
        }
    }
    assert_eq!((placed, refused), (5, 3));
    assert_eq!(shop.counters(&p).await?, (10, 10, 0));
    assert_eq!(
        shop.stockroom.lifecycle()?.orders_in(OrderStatus::Pending).await?.len(),
        5
    );

    shop.close().await
}
