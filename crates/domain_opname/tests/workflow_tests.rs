//! Opname Workflow Tests
//!
//! End-to-end tests of `OpnameService` on the in-memory adapters.
//!
//! # Test Organization
//!
//! - `lifecycle` - Draft to completion or cancellation
//! - `drafts` - Editing and deleting drafts
//! - `line_items` - Adding and removing products
//! - `atomicity` - Completion under injected store failures
//! - `policies` - Overwrite and apply-delta stock writes
//! - `ledger` - Manual adjustments and history
//! - `reports` - Discrepancy classification

use std::collections::HashMap;

use core_kernel::ProductId;
use domain_opname::{
    AdjustmentQuery, FaultPlan, OpnameStatus, ReasonCode, SessionQuery, SeverityBands,
    StockWritePolicy,
};
use test_utils::{
    assert_adjustments_balance, assert_reconciled, assert_record_consistent, assert_status,
    assert_variance, count_date_plus, ManualAdjustmentBuilder, OpnameFixtures, OpnameWorld,
    OpnameWorldBuilder,
};

// ============================================================================
// TEST FIXTURES
// ============================================================================

/// Two products: P1 with 100 units and P2 with 50 units
async fn two_product_world() -> OpnameWorld {
    OpnameWorldBuilder::new()
        .with_product("P1", "Rice 5kg", 100)
        .with_product("P2", "Cooking Oil 2L", 50)
        .build()
        .await
}

async fn snapshot(world: &OpnameWorld, products: &[&str]) -> HashMap<ProductId, i64> {
    let mut stock = HashMap::new();
    for product in products {
        stock.insert(ProductId::new(*product), world.stock_of(product).await);
    }
    stock
}

mod lifecycle {
    use super::*;

    #[tokio::test]
    async fn test_completion_reconciles_only_differing_items() {
        let world = two_product_world().await;
        let session = world.started_with(&["P1", "P2"]).await.unwrap();
        let before = snapshot(&world, &["P1", "P2"]).await;

        let recorded = world
            .record_counts(&session, &[("P1", 90), ("P2", 50)])
            .await
            .unwrap();
        assert_variance(&recorded[0], -10);
        assert_variance(&recorded[1], 0);

        let outcome = world.service.complete(session.id, "supervisor").await.unwrap();

        assert_status(&outcome.session, OpnameStatus::Completed);
        assert!(outcome.session.completed_at.is_some());
        assert_eq!(outcome.adjustments.len(), 1);
        let record = &outcome.adjustments[0];
        assert_eq!(record.product_id.as_str(), "P1");
        assert_eq!(record.previous_quantity, 100);
        assert_eq!(record.new_quantity, 90);
        assert_eq!(record.delta, -10);
        assert_eq!(record.reason_code, ReasonCode::CountReconciliation);
        assert_eq!(record.reference_id, Some(session.id.to_string()));
        assert_eq!(record.performed_by, "supervisor");

        assert_eq!(world.stock_of("P1").await, 90);
        assert_eq!(world.stock_of("P2").await, 50);

        let stored = world.service.get_session(session.id).await.unwrap();
        let after = snapshot(&world, &["P1", "P2"]).await;
        let ledger = world.store.adjustments().await;
        assert_reconciled(&stored, &ledger);
        assert_adjustments_balance(&before, &after, &ledger);
    }

    #[tokio::test]
    async fn test_complete_with_unrecorded_item_changes_nothing() {
        let world = two_product_world().await;
        let session = world.started_with(&["P1", "P2"]).await.unwrap();
        world.record_counts(&session, &[("P1", 90)]).await.unwrap();

        let error = world.service.complete(session.id, "supervisor").await.unwrap_err();

        assert!(error.is_validation());
        assert!(error.to_string().contains("P2"));
        assert_eq!(world.stock_of("P1").await, 100);
        assert!(world.store.adjustments().await.is_empty());
        let stored = world.service.get_session(session.id).await.unwrap();
        assert_status(&stored, OpnameStatus::InProgress);
    }

    #[tokio::test]
    async fn test_counting_zero_units_is_a_recorded_count() {
        let world = two_product_world().await;
        let session = world.started_with(&["P1"]).await.unwrap();
        world.record_counts(&session, &[("P1", 0)]).await.unwrap();

        let outcome = world.service.complete(session.id, "supervisor").await.unwrap();

        assert_eq!(outcome.adjustments[0].delta, -100);
        assert_eq!(world.stock_of("P1").await, 0);
    }

    #[tokio::test]
    async fn test_complete_requires_completer() {
        let world = two_product_world().await;
        let session = world.started_with(&["P1"]).await.unwrap();
        world.record_counts(&session, &[("P1", 90)]).await.unwrap();

        let error = world.service.complete(session.id, "   ").await.unwrap_err();

        assert!(error.is_validation());
        assert_eq!(world.stock_of("P1").await, 100);
        assert_eq!(world.store.stock_writes().await, 0);
        assert!(world.store.adjustments().await.is_empty());
        let stored = world.service.get_session(session.id).await.unwrap();
        assert_status(&stored, OpnameStatus::InProgress);
    }

    #[tokio::test]
    async fn test_cancel_in_progress_writes_no_stock() {
        let world = two_product_world().await;
        let session = world.started_with(&["P1"]).await.unwrap();
        world.record_counts(&session, &[("P1", 10)]).await.unwrap();

        let canceled = world.service.cancel(session.id, "supervisor").await.unwrap();

        assert_status(&canceled, OpnameStatus::Canceled);
        assert_eq!(world.stock_of("P1").await, 100);
        assert_eq!(world.store.stock_writes().await, 0);
        assert!(world.store.adjustments().await.is_empty());
    }

    #[tokio::test]
    async fn test_cancel_draft() {
        let world = two_product_world().await;
        let draft = world.draft_with(&["P1"]).await.unwrap();

        let canceled = world.service.cancel(draft.id, "auditor").await.unwrap();
        assert_status(&canceled, OpnameStatus::Canceled);
    }

    #[tokio::test]
    async fn test_start_without_items_fails() {
        let world = two_product_world().await;
        let draft = world.draft_with(&[]).await.unwrap();

        let error = world.service.start(draft.id, "auditor").await.unwrap_err();

        assert!(error.is_validation());
        let stored = world.service.get_session(draft.id).await.unwrap();
        assert_status(&stored, OpnameStatus::Draft);
    }

    #[tokio::test]
    async fn test_recording_twice_keeps_last_value() {
        let world = two_product_world().await;
        let session = world.started_with(&["P1"]).await.unwrap();
        world.record_counts(&session, &[("P1", 80)]).await.unwrap();
        let recorded = world.record_counts(&session, &[("P1", 95)]).await.unwrap();
        assert_variance(&recorded[0], -5);

        let stored = world.service.get_session(session.id).await.unwrap();
        assert_eq!(stored.line_items.len(), 1);

        let outcome = world.service.complete(session.id, "supervisor").await.unwrap();
        assert_eq!(outcome.adjustments.len(), 1);
        assert_eq!(outcome.adjustments[0].delta, -5);
        assert_eq!(world.stock_of("P1").await, 95);
    }

    #[tokio::test]
    async fn test_terminal_session_rejects_every_mutation() {
        let world = two_product_world().await;
        let session = world.started_with(&["P1"]).await.unwrap();
        world.record_counts(&session, &[("P1", 100)]).await.unwrap();
        world.service.complete(session.id, "supervisor").await.unwrap();
        let item_id = session.line_items[0].id;

        assert!(world.service.complete(session.id, "x").await.unwrap_err().is_invalid_state());
        assert!(world.service.cancel(session.id, "x").await.unwrap_err().is_invalid_state());
        assert!(world.service.start(session.id, "x").await.unwrap_err().is_invalid_state());
        assert!(world
            .service
            .record_count(item_id, 1, "x", "")
            .await
            .unwrap_err()
            .is_invalid_state());
        assert!(world
            .service
            .add_line_item(session.id, ProductId::new("P2"))
            .await
            .unwrap_err()
            .is_invalid_state());
    }

    #[tokio::test]
    async fn test_record_count_rejects_negative_quantity() {
        let world = two_product_world().await;
        let session = world.started_with(&["P1"]).await.unwrap();

        let error = world
            .service
            .record_count(session.line_items[0].id, -1, "counter", "")
            .await
            .unwrap_err();
        assert!(error.is_validation());
    }

    #[tokio::test]
    async fn test_unknown_session_is_not_found() {
        let world = two_product_world().await;
        let error = world
            .service
            .start(core_kernel::OpnameId::new(), "auditor")
            .await
            .unwrap_err();
        assert!(error.is_not_found());
    }
}

mod drafts {
    use super::*;

    #[tokio::test]
    async fn test_update_and_delete_draft() {
        let world = two_product_world().await;
        let draft = world.draft_with(&["P1"]).await.unwrap();

        let updated = world
            .service
            .update_draft(draft.id, count_date_plus(1), "recount shelf A")
            .await
            .unwrap();
        assert_eq!(updated.count_date, count_date_plus(1));
        assert_eq!(updated.notes, "recount shelf A");
        assert_eq!(world.service.get_draft(draft.id).await.unwrap().notes, "recount shelf A");

        world.service.delete_draft(draft.id).await.unwrap();
        assert!(world.service.get_session(draft.id).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_started_session_is_not_a_draft() {
        let world = two_product_world().await;
        let session = world.started_with(&["P1"]).await.unwrap();

        assert!(world.service.get_draft(session.id).await.unwrap_err().is_invalid_state());
        assert!(world.service.delete_draft(session.id).await.unwrap_err().is_invalid_state());
        assert!(world
            .service
            .update_draft(session.id, OpnameFixtures::count_date(), "")
            .await
            .unwrap_err()
            .is_invalid_state());
    }

    #[tokio::test]
    async fn test_create_draft_requires_creator() {
        let world = two_product_world().await;
        let error = world
            .service
            .create_draft(OpnameFixtures::count_date(), "", "  ")
            .await
            .unwrap_err();
        assert!(error.is_validation());
    }

    #[tokio::test]
    async fn test_list_sessions_newest_first() {
        let world = two_product_world().await;
        let older = world
            .service
            .create_draft(OpnameFixtures::count_date(), "", "auditor")
            .await
            .unwrap();
        let newer = world
            .service
            .create_draft(OpnameFixtures::next_count_date(), "", "auditor")
            .await
            .unwrap();
        world.service.cancel(older.id, "auditor").await.unwrap();

        let all = world.service.list_sessions(SessionQuery::default()).await.unwrap();
        assert_eq!(all.iter().map(|s| s.id).collect::<Vec<_>>(), vec![newer.id, older.id]);

        let drafts = world
            .service
            .list_sessions(SessionQuery::by_status(OpnameStatus::Draft))
            .await
            .unwrap();
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].id, newer.id);
    }

    #[tokio::test]
    async fn test_list_sessions_by_date_range_and_id() {
        let world = two_product_world().await;
        let mut ids = Vec::new();
        for days in [0, 10, 20, 30] {
            let draft = world
                .service
                .create_draft(count_date_plus(days), "", "auditor")
                .await
                .unwrap();
            ids.push(draft.id);
        }

        let in_range = world
            .service
            .list_sessions(SessionQuery::default().between(count_date_plus(10), count_date_plus(20)))
            .await
            .unwrap();
        assert_eq!(in_range.iter().map(|s| s.id).collect::<Vec<_>>(), vec![ids[2], ids[1]]);

        let single_day = world
            .service
            .list_sessions(SessionQuery::default().between(count_date_plus(30), count_date_plus(30)))
            .await
            .unwrap();
        assert_eq!(single_day.len(), 1);
        assert_eq!(single_day[0].id, ids[3]);

        let empty = world
            .service
            .list_sessions(SessionQuery::default().between(count_date_plus(21), count_date_plus(29)))
            .await
            .unwrap();
        assert!(empty.is_empty());

        let by_id = world
            .service
            .list_sessions(SessionQuery {
                session_id: Some(ids[1]),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(by_id.len(), 1);
        assert_eq!(by_id[0].id, ids[1]);

        let mismatched = world
            .service
            .list_sessions(SessionQuery {
                session_id: Some(ids[1]),
                ..SessionQuery::default().between(count_date_plus(20), count_date_plus(30))
            })
            .await
            .unwrap();
        assert!(mismatched.is_empty());
    }
}

mod line_items {
    use super::*;

    #[tokio::test]
    async fn test_add_snapshots_live_quantity() {
        let world = two_product_world().await;
        let draft = world.draft_with(&[]).await.unwrap();

        let item = world.service.add_line_item(draft.id, ProductId::new("P2")).await.unwrap();

        assert_eq!(item.system_quantity, 50);
        assert!(!item.is_recorded());
        assert_eq!(item.session_id, draft.id);
    }

    #[tokio::test]
    async fn test_duplicate_product_rejected() {
        let world = two_product_world().await;
        let draft = world.draft_with(&["P1"]).await.unwrap();

        let error = world
            .service
            .add_line_item(draft.id, ProductId::new("P1"))
            .await
            .unwrap_err();

        assert!(error.is_validation());
        let stored = world.service.get_session(draft.id).await.unwrap();
        assert_eq!(stored.line_items.len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_product_rejected() {
        let world = two_product_world().await;
        let draft = world.draft_with(&[]).await.unwrap();

        let error = world
            .service
            .add_line_item(draft.id, ProductId::new("GHOST"))
            .await
            .unwrap_err();
        assert!(error.is_not_found());

        let error = world
            .service
            .add_line_item(draft.id, ProductId::new("  "))
            .await
            .unwrap_err();
        assert!(error.is_validation());
    }

    #[tokio::test]
    async fn test_items_frozen_after_start() {
        let world = two_product_world().await;
        let session = world.started_with(&["P1"]).await.unwrap();

        let error = world
            .service
            .add_line_item(session.id, ProductId::new("P2"))
            .await
            .unwrap_err();
        assert!(error.is_invalid_state());

        let error = world
            .service
            .remove_line_item(session.id, session.line_items[0].id)
            .await
            .unwrap_err();
        assert!(error.is_invalid_state());
    }

    #[tokio::test]
    async fn test_remove_from_draft() {
        let world = two_product_world().await;
        let draft = world.draft_with(&["P1", "P2"]).await.unwrap();

        world
            .service
            .remove_line_item(draft.id, draft.line_items[0].id)
            .await
            .unwrap();

        let stored = world.service.get_session(draft.id).await.unwrap();
        assert_eq!(stored.line_items.len(), 1);
        assert_eq!(stored.line_items[0].product_id.as_str(), "P2");
    }
}

mod atomicity {
    use super::*;

    async fn three_item_count() -> (OpnameWorld, domain_opname::OpnameSession) {
        let world = OpnameWorldBuilder::new()
            .with_product("P1", "Rice 5kg", 100)
            .with_product("P2", "Cooking Oil 2L", 50)
            .with_product("P3", "Sugar 1kg", 30)
            .build()
            .await;
        let session = world.started_with(&["P1", "P2", "P3"]).await.unwrap();
        world
            .record_counts(&session, &[("P1", 90), ("P2", 55), ("P3", 0)])
            .await
            .unwrap();
        (world, session)
    }

    async fn assert_untouched(world: &OpnameWorld, session: &domain_opname::OpnameSession) {
        assert_eq!(world.stock_of("P1").await, 100);
        assert_eq!(world.stock_of("P2").await, 50);
        assert_eq!(world.stock_of("P3").await, 30);
        assert_eq!(world.store.stock_writes().await, 0);
        assert!(world.store.adjustments().await.is_empty());
        let stored = world.service.get_session(session.id).await.unwrap();
        assert_status(&stored, OpnameStatus::InProgress);
    }

    #[tokio::test]
    async fn test_stock_write_failure_rolls_back_completion() {
        let (world, session) = three_item_count().await;
        world
            .store
            .inject_faults(FaultPlan {
                fail_stock_write_at: Some(2),
                ..Default::default()
            })
            .await;

        let error = world.service.complete(session.id, "supervisor").await.unwrap_err();

        assert!(error.is_persistence());
        assert_untouched(&world, &session).await;
    }

    #[tokio::test]
    async fn test_adjustment_insert_failure_rolls_back_completion() {
        let (world, session) = three_item_count().await;
        world
            .store
            .inject_faults(FaultPlan {
                fail_adjustment_insert_at: Some(3),
                ..Default::default()
            })
            .await;

        let error = world.service.complete(session.id, "supervisor").await.unwrap_err();

        assert!(error.is_persistence());
        assert_untouched(&world, &session).await;
    }

    #[tokio::test]
    async fn test_commit_failure_rolls_back_completion() {
        let (world, session) = three_item_count().await;
        world
            .store
            .inject_faults(FaultPlan {
                fail_commit: true,
                ..Default::default()
            })
            .await;

        let error = world.service.complete(session.id, "supervisor").await.unwrap_err();

        assert!(error.is_persistence());
        assert_untouched(&world, &session).await;
    }

    #[tokio::test]
    async fn test_retry_after_failure_completes_once() {
        let (world, session) = three_item_count().await;
        world
            .store
            .inject_faults(FaultPlan {
                fail_stock_write_at: Some(3),
                ..Default::default()
            })
            .await;
        assert!(world.service.complete(session.id, "supervisor").await.is_err());

        world.store.clear_faults().await;
        let outcome = world.service.complete(session.id, "supervisor").await.unwrap();

        assert_eq!(outcome.adjustments.len(), 3);
        assert_eq!(world.store.adjustments().await.len(), 3);
        assert_eq!(world.stock_of("P1").await, 90);
        assert_eq!(world.stock_of("P2").await, 55);
        assert_eq!(world.stock_of("P3").await, 0);
        for record in &outcome.adjustments {
            assert_record_consistent(record);
        }
    }
}

mod policies {
    use super::*;

    #[tokio::test]
    async fn test_overwrite_sets_counted_quantity_despite_drift() {
        let world = two_product_world().await;
        let session = world.started_with(&["P1"]).await.unwrap();
        world.store.set_stock("P1", 120).await;
        world.record_counts(&session, &[("P1", 90)]).await.unwrap();

        let outcome = world.service.complete(session.id, "supervisor").await.unwrap();

        assert_eq!(world.stock_of("P1").await, 90);
        assert_eq!(outcome.adjustments[0].previous_quantity, 100);
        assert_eq!(outcome.adjustments[0].delta, -10);
    }

    #[tokio::test]
    async fn test_apply_delta_adds_variance_to_live_stock() {
        let world = OpnameWorldBuilder::new()
            .with_product("P1", "Rice 5kg", 100)
            .with_policy(StockWritePolicy::ApplyDelta)
            .build()
            .await;
        let session = world.started_with(&["P1"]).await.unwrap();
        world.store.set_stock("P1", 120).await;
        world.record_counts(&session, &[("P1", 90)]).await.unwrap();

        let outcome = world.service.complete(session.id, "supervisor").await.unwrap();

        assert_eq!(world.stock_of("P1").await, 110);
        let record = &outcome.adjustments[0];
        assert_eq!(record.previous_quantity, 120);
        assert_eq!(record.new_quantity, 110);
        assert_eq!(record.delta, -10);
    }

    #[tokio::test]
    async fn test_apply_delta_never_drives_stock_negative() {
        let world = OpnameWorldBuilder::new()
            .with_product("P1", "Rice 5kg", 100)
            .with_policy(StockWritePolicy::ApplyDelta)
            .build()
            .await;
        let session = world.started_with(&["P1"]).await.unwrap();
        world.store.set_stock("P1", 5).await;
        world.record_counts(&session, &[("P1", 90)]).await.unwrap();

        let error = world.service.complete(session.id, "supervisor").await.unwrap_err();

        assert!(error.is_validation());
        assert_eq!(world.stock_of("P1").await, 5);
        assert!(world.store.adjustments().await.is_empty());
    }

    #[tokio::test]
    async fn test_apply_delta_rejects_overflowing_stock() {
        let world = OpnameWorldBuilder::new()
            .with_product("P1", "Rice 5kg", 100)
            .with_policy(StockWritePolicy::ApplyDelta)
            .build()
            .await;
        let session = world.started_with(&["P1"]).await.unwrap();
        world.store.set_stock("P1", i64::MAX).await;
        world.record_counts(&session, &[("P1", 150)]).await.unwrap();

        let error = world.service.complete(session.id, "supervisor").await.unwrap_err();

        assert!(error.is_validation());
        assert_eq!(world.stock_of("P1").await, i64::MAX);
        assert!(world.store.adjustments().await.is_empty());
    }
}

mod ledger {
    use super::*;

    #[tokio::test]
    async fn test_manual_adjustment_writes_stock_and_ledger() {
        let world = two_product_world().await;

        let record = world
            .service
            .adjust_stock(ManualAdjustmentBuilder::new("P2", 47).with_note("crushed cartons").build())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(record.delta, -3);
        assert_eq!(record.reason_code, ReasonCode::Damage);
        assert_eq!(record.reference_id, None);
        assert_eq!(world.stock_of("P2").await, 47);

        // Count reconciliations are the default view
        let history = world
            .service
            .adjustment_history(AdjustmentQuery::default())
            .await
            .unwrap();
        assert!(history.is_empty());

        let damage = world
            .service
            .adjustment_history(AdjustmentQuery {
                reason_code: Some(ReasonCode::Damage),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(damage.len(), 1);
        assert_eq!(damage[0].product_name, "Cooking Oil 2L");
        assert_eq!(damage[0].note, "crushed cartons");
    }

    #[tokio::test]
    async fn test_manual_adjustment_to_same_quantity_is_noop() {
        let world = two_product_world().await;

        let record = world
            .service
            .adjust_stock(ManualAdjustmentBuilder::new("P1", 100).build())
            .await
            .unwrap();

        assert!(record.is_none());
        assert!(world.store.adjustments().await.is_empty());
        assert_eq!(world.store.stock_writes().await, 0);
    }

    #[tokio::test]
    async fn test_manual_adjustment_guards() {
        let world = two_product_world().await;

        let reconciliation = ManualAdjustmentBuilder::new("P1", 10)
            .with_reason(ReasonCode::CountReconciliation)
            .build();
        assert!(world.service.adjust_stock(reconciliation).await.unwrap_err().is_validation());

        let negative = ManualAdjustmentBuilder::new("P1", -1).build();
        assert!(world.service.adjust_stock(negative).await.unwrap_err().is_validation());

        let anonymous = ManualAdjustmentBuilder::new("P1", 10).performed_by(" ").build();
        assert!(world.service.adjust_stock(anonymous).await.unwrap_err().is_validation());

        let unknown = ManualAdjustmentBuilder::new("GHOST", 10).build();
        assert!(world.service.adjust_stock(unknown).await.unwrap_err().is_not_found());

        assert_eq!(world.stock_of("P1").await, 100);
    }

    #[tokio::test]
    async fn test_history_for_session_resolves_names() {
        let world = two_product_world().await;
        let session = world.started_with(&["P1", "P2"]).await.unwrap();
        world
            .record_counts(&session, &[("P1", 75), ("P2", 60)])
            .await
            .unwrap();
        world.service.complete(session.id, "supervisor").await.unwrap();

        let history = world
            .service
            .adjustment_history(AdjustmentQuery::for_session(session.id))
            .await
            .unwrap();

        assert_eq!(history.len(), 2);
        let rice = history.iter().find(|e| e.product_id.as_str() == "P1").unwrap();
        assert_eq!(rice.product_name, "Rice 5kg");
        assert_eq!(rice.delta, -25);
        assert!((rice.variance_percent + 25.0).abs() < 1e-9);

        let oil_only = world
            .service
            .adjustment_history(AdjustmentQuery::for_session(session.id).for_product(ProductId::new("P2")))
            .await
            .unwrap();
        assert_eq!(oil_only.len(), 1);
        assert_eq!(oil_only[0].delta, 10);
    }
}

mod reports {
    use super::*;

    #[tokio::test]
    async fn test_report_covers_completed_sessions_only() {
        let world = two_product_world().await;
        let completed = world.started_with(&["P1", "P2"]).await.unwrap();
        world
            .record_counts(&completed, &[("P1", 75), ("P2", 50)])
            .await
            .unwrap();
        world.service.complete(completed.id, "supervisor").await.unwrap();

        let pending = world.started_with(&["P1"]).await.unwrap();
        world.record_counts(&pending, &[("P1", 1)]).await.unwrap();

        let report = world
            .service
            .discrepancy_report(&SeverityBands::default(), SessionQuery::default())
            .await
            .unwrap();

        assert_eq!(report.rows.len(), 2);
        assert!(report.rows.iter().all(|row| row.session_id == completed.id));

        let flagged: Vec<_> = report.requiring_approval().collect();
        assert_eq!(flagged.len(), 1);
        assert_eq!(flagged[0].product_name, "Rice 5kg");
        assert_eq!(flagged[0].severity.as_deref(), Some("HIGH_LOSS"));
        assert_eq!(report.in_band("NORMAL").count(), 1);
    }

    #[tokio::test]
    async fn test_report_empty_without_completed_sessions() {
        let world = two_product_world().await;
        world.started_with(&["P1"]).await.unwrap();

        let report = world
            .service
            .discrepancy_report(&SeverityBands::default(), SessionQuery::by_status(OpnameStatus::InProgress))
            .await
            .unwrap();
        assert!(report.is_empty());
    }
}
