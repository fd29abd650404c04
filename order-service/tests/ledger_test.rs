mod common;

use common::{new_order, two_service_order, TestApp};
use order_service::models::{
    Actor, Invoice, PaymentMethod, PaymentRecordStatus, PaymentStatus, SaleType, TaxType,
};
use order_service::services::{InvoiceRequest, PaymentRequest, Store};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

async fn invoiced_order(app: &TestApp, actor: &Actor) -> Invoice {
    let order = app
        .state
        .engine
        .create_order(actor, new_order(two_service_order()))
        .await
        .unwrap();
    app.state
        .ledger
        .get_invoice(actor, order.invoice_id.as_deref().unwrap())
        .await
        .unwrap()
}

fn pay(invoice: &Invoice, amount: Decimal) -> PaymentRequest {
    PaymentRequest {
        invoice_id: invoice.id.clone(),
        amount,
        method: PaymentMethod::Upi,
        payment_date: None,
        reference: Some("UPI-REF".to_string()),
        notes: None,
    }
}

#[tokio::test]
async fn full_payment_settles_invoice_order_and_sale_record() {
    let app = TestApp::spawn().await;
    let actor = TestApp::actor();
    let invoice = invoiced_order(&app, &actor).await;
    assert_eq!(invoice.cgst, dec!(135));
    assert_eq!(invoice.sgst, dec!(135));
    assert_eq!(invoice.tax_type, TaxType::Intrastate);
    assert!(invoice.invoice_number.starts_with("INV"));

    let (payment, invoice) = app
        .state
        .ledger
        .record_payment(&actor, pay(&invoice, dec!(1770)))
        .await
        .unwrap();

    assert_eq!(payment.status, PaymentRecordStatus::Completed);
    assert!(payment.payment_number.starts_with("PAY-"));
    assert_eq!(invoice.paid_amount, dec!(1770));
    assert_eq!(invoice.balance_amount, dec!(0));
    assert_eq!(invoice.payment_status, PaymentStatus::Paid);

    let order = app.state.engine.get_order(&actor, &invoice.order_id).await.unwrap();
    assert_eq!(order.financials.advance_payment, dec!(1770));
    assert_eq!(order.financials.balance_payment, dec!(0));
    assert_eq!(order.financials.payment_status, PaymentStatus::Paid);

    let sale = app.store.get_sale_record(&invoice.id).await.unwrap().unwrap();
    assert_eq!(sale.sale_number, format!("SALE-{}", invoice.invoice_number));
    assert_eq!(sale.paid_amount, dec!(1770));
    assert_eq!(sale.total_gst, dec!(270));
    assert_eq!(sale.sale_type, SaleType::Service);
}

#[tokio::test]
async fn overpayment_is_rejected_without_side_effects() {
    let app = TestApp::spawn().await;
    let actor = TestApp::actor();
    let invoice = invoiced_order(&app, &actor).await;

    let err = app
        .state
        .ledger
        .record_payment(&actor, pay(&invoice, dec!(1771)))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "precondition_failed");

    let after = app.state.ledger.get_invoice(&actor, &invoice.id).await.unwrap();
    assert_eq!(after.version, invoice.version);
    assert_eq!(after.paid_amount, dec!(0));
    assert!(app
        .state
        .ledger
        .list_payments_for_order(&actor, &invoice.order_id)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn payments_accumulate_monotonically() {
    let app = TestApp::spawn().await;
    let actor = TestApp::actor();
    let invoice = invoiced_order(&app, &actor).await;

    let mut running = Decimal::ZERO;
    let mut statuses = Vec::new();
    for amount in [dec!(500), dec!(500), dec!(770)] {
        let (_, updated) = app
            .state
            .ledger
            .record_payment(&actor, pay(&invoice, amount))
            .await
            .unwrap();
        running += amount;
        assert_eq!(updated.paid_amount, running);
        assert_eq!(updated.balance_amount, dec!(1770) - running);
        statuses.push(updated.payment_status);
    }

    assert_eq!(
        statuses,
        vec![PaymentStatus::Partial, PaymentStatus::Partial, PaymentStatus::Paid]
    );
}

#[tokio::test]
async fn deleting_a_payment_recomputes_from_the_rest() {
    let app = TestApp::spawn().await;
    let actor = TestApp::actor();
    let invoice = invoiced_order(&app, &actor).await;

    let mut ids = Vec::new();
    for amount in [dec!(100), dec!(250), dec!(400)] {
        let (payment, _) = app
            .state
            .ledger
            .record_payment(&actor, pay(&invoice, amount))
            .await
            .unwrap();
        ids.push(payment.id);
    }

    let after_middle = app.state.ledger.delete_payment(&actor, &ids[1]).await.unwrap();
    assert_eq!(after_middle.paid_amount, dec!(500));
    assert_eq!(after_middle.balance_amount, dec!(1270));

    let after_first = app.state.ledger.delete_payment(&actor, &ids[0]).await.unwrap();
    assert_eq!(after_first.paid_amount, dec!(400));

    let order = app.state.engine.get_order(&actor, &invoice.order_id).await.unwrap();
    assert_eq!(order.financials.advance_payment, dec!(400));
    assert_eq!(order.financials.payment_status, PaymentStatus::Partial);

    let live = app
        .state
        .ledger
        .list_payments_for_order(&actor, &invoice.order_id)
        .await
        .unwrap();
    assert_eq!(live.len(), 1);
    assert_eq!(live[0].id, ids[2]);
}

#[tokio::test]
async fn failed_projection_is_compensated() {
    let app = TestApp::spawn().await;
    let actor = TestApp::actor();
    let invoice = invoiced_order(&app, &actor).await;
    app.store.fail_sale_record_writes(true);

    let err = app
        .state
        .ledger
        .record_payment(&actor, pay(&invoice, dec!(500)))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "internal");

    let after = app.state.ledger.get_invoice(&actor, &invoice.id).await.unwrap();
    assert_eq!(after.paid_amount, dec!(0));
    assert!(after.applied_payment_ids.is_empty());

    let order = app.state.engine.get_order(&actor, &invoice.order_id).await.unwrap();
    assert_eq!(order.financials.advance_payment, dec!(0));

    let payments = app.store.list_payments_for_invoice(&invoice.id).await.unwrap();
    assert_eq!(payments.len(), 1);
    assert_eq!(payments[0].status, PaymentRecordStatus::Failed);

    // Once the sale-record store recovers, a new payment goes through.
    app.store.fail_sale_record_writes(false);
    let (_, settled) = app
        .state
        .ledger
        .record_payment(&actor, pay(&invoice, dec!(500)))
        .await
        .unwrap();
    assert_eq!(settled.paid_amount, dec!(500));
}

#[tokio::test]
async fn payment_that_cannot_reach_the_invoice_is_marked_failed() {
    let app = TestApp::spawn().await;
    let actor = TestApp::actor();
    let invoice = invoiced_order(&app, &actor).await;
    app.store.fail_invoice_writes(true);

    let err = app
        .state
        .ledger
        .record_payment(&actor, pay(&invoice, dec!(500)))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "internal");

    let payments = app.store.list_payments_for_invoice(&invoice.id).await.unwrap();
    assert_eq!(payments.len(), 1);
    assert_eq!(payments[0].status, PaymentRecordStatus::Failed);

    app.store.fail_invoice_writes(false);
    let after = app.state.ledger.get_invoice(&actor, &invoice.id).await.unwrap();
    assert_eq!(after.paid_amount, dec!(0));
    assert_eq!(after.version, invoice.version);
}

#[tokio::test]
async fn reconcile_restores_projections_from_the_invoice() {
    let app = TestApp::spawn().await;
    let actor = TestApp::actor();
    let invoice = invoiced_order(&app, &actor).await;
    app.state
        .ledger
        .record_payment(&actor, pay(&invoice, dec!(600)))
        .await
        .unwrap();

    // Corrupt the order projection directly.
    let mut order = app.store.get_order(&invoice.order_id).await.unwrap().unwrap();
    let expected = order.version;
    order.financials.advance_payment = dec!(9);
    order.financials.balance_payment = dec!(1761);
    order.version += 1;
    app.store.replace_order_if_version(&order, expected).await.unwrap();

    let reconciled = app
        .state
        .ledger
        .reconcile_invoice(&actor, &invoice.id)
        .await
        .unwrap();
    assert_eq!(reconciled.paid_amount, dec!(600));

    let order = app.state.engine.get_order(&actor, &invoice.order_id).await.unwrap();
    assert_eq!(order.financials.advance_payment, dec!(600));
    assert_eq!(order.financials.balance_payment, dec!(1170));
}

#[tokio::test]
async fn regenerating_with_overrides_keeps_the_single_invoice() {
    let app = TestApp::spawn().await;
    let actor = TestApp::actor();
    let invoice = invoiced_order(&app, &actor).await;

    let regenerated = app
        .state
        .ledger
        .generate_invoice(
            &actor,
            InvoiceRequest {
                order_id: invoice.order_id.clone(),
                gst_rate: Some(dec!(18)),
                tax_type: Some(TaxType::Interstate),
                discount: Some(dec!(300)),
                notes: Some("Loyalty discount".to_string()),
            },
        )
        .await
        .unwrap();

    assert_eq!(regenerated.id, invoice.id);
    assert_eq!(regenerated.invoice_number, invoice.invoice_number);
    assert_eq!(regenerated.taxable_amount, dec!(1200));
    assert_eq!(regenerated.igst, dec!(216));
    assert_eq!(regenerated.cgst, dec!(0));
    assert_eq!(regenerated.final_amount, dec!(1416));

    let invoices = app
        .state
        .ledger
        .list_invoices_for_order(&actor, &invoice.order_id)
        .await
        .unwrap();
    assert_eq!(invoices.len(), 1);

    let order = app.state.engine.get_order(&actor, &invoice.order_id).await.unwrap();
    assert_eq!(order.financials.final_cost, Some(dec!(1416)));
}

#[tokio::test]
async fn payment_against_unknown_invoice_is_a_precondition_failure() {
    let app = TestApp::spawn().await;
    let actor = TestApp::actor();
    let invoice = invoiced_order(&app, &actor).await;
    let mut request = pay(&invoice, dec!(10));
    request.invoice_id = "missing".to_string();

    let err = app
        .state
        .ledger
        .record_payment(&actor, request)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "precondition_failed");
}
