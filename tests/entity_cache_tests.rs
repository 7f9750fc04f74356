mod common;

use std::collections::BTreeSet;
use std::sync::Arc;

use proptest::prelude::*;
use rustbreeze::core::{BreezeError, DataType, Result, Value};
use rustbreeze::entity::{Entity, EntityGroup, EntityState, MergeStrategy};
use rustbreeze::manager::{EntityManager, ManagerConfig};
use rustbreeze::metadata::{DataProperty, EntityType, MetadataStore};

fn manager() -> Result<EntityManager> {
    Ok(EntityManager::new(
        common::northwind()?,
        ManagerConfig::new("breeze/Northwind"),
    ))
}

fn unchanged_order(em: &mut EntityManager, id: i64, freight: f64) -> Result<rustbreeze::EntityRef> {
    let mut order = em.create_entity("Order")?;
    order.set("orderID", id)?;
    order.set("freight", freight)?;
    em.attach_entity(order, EntityState::Unchanged, None)
}

#[test]
fn test_attach_returns_cached_identity() -> Result<()> {
    let mut em = manager()?;
    let order = unchanged_order(&mut em, 10248, 32.38)?;

    let found = em
        .get_entity_by_key("Order", vec![Value::Text("10248".into())])?
        .expect("order should be cached");
    assert!(found.ptr_eq(&order));

    // Re-attaching the same instance only changes its state
    let again = em.attach_entity(order.clone(), EntityState::Modified, None)?;
    assert!(again.ptr_eq(&order));
    assert_eq!(order.state(), EntityState::Modified);
    assert_eq!(em.get_entities(Some(&["Order"]), None).len(), 1);
    Ok(())
}

#[test]
fn test_merge_strategy_matrix() -> Result<()> {
    let cases = [
        (MergeStrategy::OverwriteChanges, false, Some((99.0, EntityState::Unchanged))),
        (MergeStrategy::OverwriteChanges, true, Some((99.0, EntityState::Unchanged))),
        (MergeStrategy::PreserveChanges, false, Some((99.0, EntityState::Unchanged))),
        (MergeStrategy::PreserveChanges, true, Some((20.0, EntityState::Modified))),
        (MergeStrategy::SkipMerge, false, Some((10.0, EntityState::Unchanged))),
        (MergeStrategy::SkipMerge, true, Some((20.0, EntityState::Modified))),
        (MergeStrategy::Disallowed, false, None),
        (MergeStrategy::Disallowed, true, None),
    ];

    for (strategy, modify_first, expected) in cases {
        let mut em = manager()?;
        let cached = unchanged_order(&mut em, 1, 10.0)?;
        if modify_first {
            cached.set("freight", 20.0)?;
            assert_eq!(cached.state(), EntityState::Modified);
        }

        let mut incoming = em.create_entity("Order")?;
        incoming.set("orderID", 1)?;
        incoming.set("freight", 99.0)?;
        let result = em.attach_entity(incoming, EntityState::Unchanged, Some(strategy));

        match expected {
            Some((freight, state)) => {
                let merged = result?;
                assert!(merged.ptr_eq(&cached), "{strategy:?} must keep the cached instance");
                assert_eq!(cached.get("freight"), Some(Value::Float(freight)), "{strategy:?}");
                assert_eq!(cached.state(), state, "{strategy:?} modified={modify_first}");
            }
            None => {
                assert!(matches!(result, Err(BreezeError::EntityAlreadyExists(_))));
                assert_eq!(cached.get("freight").and_then(|v| v.as_f64()), Some(if modify_first { 20.0 } else { 10.0 }));
            }
        }
    }
    Ok(())
}

#[test]
fn test_preserve_changes_keeps_deleted_entity() -> Result<()> {
    let mut em = manager()?;
    let cached = unchanged_order(&mut em, 5, 1.0)?;
    em.delete_entity(&cached)?;

    let mut incoming = em.create_entity("Order")?;
    incoming.set("orderID", 5)?;
    incoming.set("freight", 2.0)?;
    em.attach_entity(incoming, EntityState::Unchanged, Some(MergeStrategy::PreserveChanges))?;

    assert_eq!(cached.state(), EntityState::Deleted);
    assert_eq!(cached.get("freight"), Some(Value::Float(1.0)));
    Ok(())
}

#[test]
fn test_edit_reject_restores_originals() -> Result<()> {
    let mut em = manager()?;
    let order = unchanged_order(&mut em, 7, 15.0)?;

    // 1. Edits move the entity to Modified and keep the first original
    order.set("shipCity", "Reims")?;
    order.set("shipCity", "Lyon")?;
    assert_eq!(order.state(), EntityState::Modified);
    assert_eq!(
        order.borrow().original_value("shipCity"),
        Some(&Value::Null)
    );

    // 2. Key properties of attached entities are read-only
    assert!(matches!(
        order.set("orderID", 8),
        Err(BreezeError::InvalidState(_))
    ));

    // 3. Reject brings the original values back
    let rejected = em.reject_changes()?;
    assert_eq!(rejected.len(), 1);
    assert_eq!(order.state(), EntityState::Unchanged);
    assert_eq!(order.get("shipCity"), Some(Value::Null));
    assert!(!em.has_changes());
    Ok(())
}

#[test]
fn test_deleted_entity_lifecycle() -> Result<()> {
    let mut em = manager()?;
    let order = unchanged_order(&mut em, 9, 3.0)?;

    assert_eq!(em.delete_entity(&order)?, EntityState::Deleted);
    assert!(matches!(
        order.set("freight", 4.0),
        Err(BreezeError::InvalidState(_))
    ));
    assert_eq!(em.get_changes().len(), 1);

    // Rejecting a delete returns the entity to Unchanged
    em.reject_changes()?;
    assert_eq!(order.state(), EntityState::Unchanged);

    // Accepting a delete evicts the entity
    em.delete_entity(&order)?;
    em.accept_changes()?;
    assert_eq!(order.state(), EntityState::Detached);
    assert!(em.get_entity_by_key("Order", vec![9.into()])?.is_none());
    Ok(())
}

#[test]
fn test_add_with_cached_key_is_rejected() -> Result<()> {
    let mut em = manager()?;
    let cached = unchanged_order(&mut em, 5, 10.0)?;

    // 1. A new instance added under a cached key is a duplicate insert
    let mut duplicate = em.create_entity("Order")?;
    duplicate.set("orderID", 5)?;
    duplicate.set("freight", 99.0)?;
    assert!(matches!(
        em.add_entity(duplicate),
        Err(BreezeError::EntityAlreadyExists(_))
    ));

    // 2. Even an overwriting strategy never turns the cached row into an insert
    let mut duplicate = em.create_entity("Order")?;
    duplicate.set("orderID", 5)?;
    assert!(matches!(
        em.attach_entity(duplicate, EntityState::Added, Some(MergeStrategy::OverwriteChanges)),
        Err(BreezeError::EntityAlreadyExists(_))
    ));

    // 3. Explicit attach without a strategy does not merge either
    let mut duplicate = em.create_entity("Order")?;
    duplicate.set("orderID", 5)?;
    assert!(matches!(
        em.attach_entity(duplicate, EntityState::Unchanged, None),
        Err(BreezeError::EntityAlreadyExists(_))
    ));

    assert_eq!(cached.state(), EntityState::Unchanged);
    assert_eq!(cached.get("freight"), Some(Value::Float(10.0)));
    assert_eq!(em.get_entities(Some(&["Order"]), None).len(), 1);
    assert!(!em.has_changes());
    Ok(())
}

#[test]
fn test_datetime_temp_keys_stay_distinct() -> Result<()> {
    let shipment = EntityType::builder("Shipment")
        .resource_name("Shipments")
        .data_property(DataProperty::new("shippedAt", DataType::DateTime).key())
        .data_property(DataProperty::new("carrier", DataType::String))
        .build()?;
    let metadata = MetadataStore::new().with_entity_type(shipment)?;
    let mut em = EntityManager::new(metadata, ManagerConfig::default());

    let first = em.add_entity(em.create_entity("Shipment")?)?;
    let second = em.add_entity(em.create_entity("Shipment")?)?;

    assert!(!first.ptr_eq(&second));
    assert_ne!(first.get("shippedAt"), second.get("shippedAt"));
    assert_eq!(em.get_entities(Some(&["Shipment"]), Some(&[EntityState::Added])).len(), 2);
    assert_eq!(em.key_generator().issued_count(), 2);
    Ok(())
}

#[test]
fn test_detached_entities_leave_the_cache() -> Result<()> {
    let mut em = manager()?;

    // 1. Deleting a never-saved entity evicts it
    let added = em.add_entity(em.create_entity("Order")?)?;
    assert_eq!(em.delete_entity(&added)?, EntityState::Detached);
    assert!(!added.borrow().aspect().is_attached());
    assert!(em.get_entity_by_key("Order", vec![(-1).into()])?.is_none());

    // 2. Accepting a delete evicts the entity
    let order = unchanged_order(&mut em, 3, 1.0)?;
    em.delete_entity(&order)?;
    assert_eq!(em.accept_entity_changes(&order)?, EntityState::Detached);
    assert!(em.get_entity_by_key("Order", vec![3.into()])?.is_none());

    // 3. Rejecting an add evicts the entity and releases its temporary key
    let added = em.add_entity(em.create_entity("Order")?)?;
    assert_eq!(em.reject_entity_changes(&added)?, EntityState::Detached);
    assert!(matches!(
        em.reject_entity_changes(&added),
        Err(BreezeError::InvalidState(_))
    ));

    assert!(em.get_entities(None, None).is_empty());
    assert!(!em.has_changes());
    assert!(em.get_changes().is_empty());
    assert_eq!(em.key_generator().issued_count(), 0);
    Ok(())
}

#[test]
fn test_get_entities_filters_by_type_and_state() -> Result<()> {
    let mut em = manager()?;
    unchanged_order(&mut em, 1, 1.0)?;
    let modified = unchanged_order(&mut em, 2, 2.0)?;
    modified.set("freight", 5.0)?;
    let product = em.create_entity("Product")?;
    em.add_entity(product)?;

    assert_eq!(em.get_entities(None, None).len(), 3);
    assert_eq!(em.get_entities(Some(&["Order"]), None).len(), 2);
    let changed = em.get_entities(None, Some(&[EntityState::Added, EntityState::Modified]));
    assert_eq!(changed.len(), 2);
    // Groups are visited in type-name order
    assert_eq!(changed[0].borrow().type_name(), "Order");
    assert_eq!(changed[1].borrow().type_name(), "Product");
    Ok(())
}

#[test]
fn test_temp_key_fixup_cascades_through_graph() -> Result<()> {
    let mut em = manager()?;

    // 1. New customer gets a temporary Guid key
    let customer = em.add_entity(em.create_entity("Customer")?)?;
    let temp_customer_id = customer.get("customerID").expect("temp key assigned");
    assert!(matches!(temp_customer_id, Value::Guid(_)));

    // 2. New order references it and gets a temporary numeric key
    let mut order = em.create_entity("Order")?;
    order.set("customerID", temp_customer_id.clone())?;
    let order = em.add_entity(order)?;
    assert_eq!(order.get("orderID"), Some(Value::Integer(-1)));

    // 3. Details carry the temporary order id inside their composite key
    let mut details = Vec::new();
    for product_id in [11, 42] {
        let mut detail = em.create_entity("OrderDetail")?;
        detail.set("orderID", -1)?;
        detail.set("productID", product_id)?;
        details.push(em.add_entity(detail)?);
    }
    assert_eq!(em.key_generator().issued_count(), 2);

    // 4. Server assigns real keys
    let real_customer_id = Value::Guid(uuid::Uuid::new_v4());
    em.fixup_key("Customer", &temp_customer_id, &real_customer_id)?;
    em.fixup_key("Order", &Value::Integer(-1), &Value::Integer(10248))?;

    assert_eq!(customer.get("customerID"), Some(real_customer_id.clone()));
    assert_eq!(order.get("customerID"), Some(real_customer_id));
    assert_eq!(order.get("orderID"), Some(Value::Integer(10248)));
    for (detail, product_id) in details.iter().zip([11, 42]) {
        assert_eq!(detail.get("orderID"), Some(Value::Integer(10248)));
        let found = em
            .get_entity_by_key("OrderDetail", vec![10248.into(), product_id.into()])?
            .expect("detail reindexed under the real key");
        assert!(found.ptr_eq(detail));
    }
    assert!(em.get_entity_by_key("Order", vec![(-1).into()])?.is_none());
    assert_eq!(em.key_generator().issued_count(), 0);
    Ok(())
}

#[test]
fn test_fixup_to_existing_key_fails() -> Result<()> {
    let mut em = manager()?;
    unchanged_order(&mut em, 100, 1.0)?;
    let added = em.add_entity(em.create_entity("Order")?)?;

    let result = em.fixup_key("Order", &Value::Integer(-1), &Value::Integer(100));
    assert!(result.is_err());
    assert_eq!(added.get("orderID"), Some(Value::Integer(-1)));
    Ok(())
}

#[test]
fn test_clear_detaches_everything() -> Result<()> {
    let mut em = manager()?;
    let a = unchanged_order(&mut em, 1, 1.0)?;
    let b = em.add_entity(em.create_entity("Order")?)?;

    em.clear();
    assert_eq!(a.state(), EntityState::Detached);
    assert_eq!(b.state(), EntityState::Detached);
    assert!(em.get_entities(None, None).is_empty());
    assert_eq!(em.key_generator().issued_count(), 0);
    Ok(())
}

#[test]
fn test_metadata_frozen_after_first_instance() -> Result<()> {
    let metadata = common::northwind()?;
    let em = EntityManager::new(metadata.clone(), ManagerConfig::default());
    em.create_entity("Product")?;

    let extended =
        metadata.with_data_property("Product", DataProperty::new("discontinued", DataType::Boolean));
    assert!(matches!(extended, Err(BreezeError::TypeFrozen(_))));
    Ok(())
}

// ============================================================================
// Group index invariants
// ============================================================================

fn item_type() -> Arc<EntityType> {
    Arc::new(
        EntityType::builder("Item")
            .data_property(DataProperty::new("id", DataType::Int32).key())
            .data_property(DataProperty::new("label", DataType::String))
            .build()
            .unwrap(),
    )
}

proptest! {
    #[test]
    fn group_index_tracks_attach_detach(ops in prop::collection::vec((any::<bool>(), 1i64..12), 1..80)) {
        let entity_type = item_type();
        let mut group = EntityGroup::new(entity_type.clone()).unwrap();
        let mut model: BTreeSet<i64> = BTreeSet::new();

        for (attach, id) in ops {
            if attach {
                let mut entity = Entity::new(entity_type.clone());
                entity.set("id", id).unwrap();
                let attached = group
                    .attach_entity(entity.into(), EntityState::Unchanged, MergeStrategy::SkipMerge)
                    .unwrap();
                prop_assert_eq!(attached.state(), EntityState::Unchanged);
                model.insert(id);
            } else if let Some(entity) = group.find_entity_by_values(vec![id.into()]).unwrap() {
                prop_assert!(model.remove(&id));
                group.detach_entity(&entity).unwrap();
                prop_assert_eq!(entity.state(), EntityState::Detached);
            } else {
                prop_assert!(!model.contains(&id));
            }

            group.verify_index().unwrap();
            prop_assert_eq!(group.len(), model.len());
        }

        for id in &model {
            let found = group.find_entity_by_values(vec![(*id).into()]).unwrap();
            prop_assert!(found.is_some());
        }
        prop_assert_eq!(group.get_entities(None).count(), model.len());
    }
}
