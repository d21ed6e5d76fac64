//! Generation runs against snapshot files, and the stores they feed.

use proptest::prelude::*;
use slotbox_core::{Config, Store};
use slotbox_model::{
    DeclaredEntity, DeclaredModel, DeclaredProperty, ElementKind, MergeConfig, MergeEngine,
    ModelError, PropertyFlags, PropertyType,
};
use slotbox_testkit::prelude::*;

#[test]
fn second_run_is_byte_identical() {
    let snapshot = TempModelFile::new();
    let (_, first_report) = snapshot.generate(&merge_engine(), &iot_declared()).unwrap();
    assert_eq!(first_report.added(ElementKind::Entity), 2);
    let first = snapshot.bytes().unwrap();

    // A different seed must not matter when nothing is new.
    let other_seed = MergeEngine::new(MergeConfig::new().uid_seed(99));
    let (_, report) = snapshot.generate(&other_seed, &iot_declared()).unwrap();
    assert!(report.is_unchanged());
    assert_eq!(snapshot.bytes().unwrap(), first);
}

#[test]
fn snapshot_json_layout() {
    let snapshot = TempModelFile::new();
    snapshot.generate(&merge_engine(), &iot_declared()).unwrap();
    let json: serde_json::Value = serde_json::from_slice(&snapshot.bytes().unwrap()).unwrap();

    assert!(json["_notes"].is_array());
    assert_eq!(json["lastEntityId"].as_str().unwrap().split(':').next(), Some("2"));
    let event_entity = &json["entities"][0];
    assert_eq!(event_entity["name"], "Event");
    assert_eq!(event_entity["properties"][1]["name"], "device");
    assert_eq!(event_entity["properties"][1]["type"], 9);
    assert!(json["retiredPropertyUids"].as_array().unwrap().is_empty());
}

#[test]
fn rename_by_pinned_uid_keeps_identity_and_data() {
    let snapshot = TempModelFile::new();
    let (model, _) = snapshot.generate(&merge_engine(), &iot_declared()).unwrap();
    let device = model.entity("Event").unwrap().property("device").unwrap().clone();

    let store = TestStore::with_model(&model, Config::default());
    store.put_events(3);
    let stored = store
        .run_with_cursor("Event", false, |cursor| cursor.get_all())
        .unwrap();

    let renamed = DeclaredModel::new()
        .entity(
            DeclaredEntity::new("Event")
                .property(DeclaredProperty::new("id", PropertyType::Long).flags(PropertyFlags::ID))
                .property(DeclaredProperty::new("source", PropertyType::String).uid(device.id.uid()))
                .property(DeclaredProperty::new("date", PropertyType::Date)),
        )
        .entity(iot_declared().entities[1].clone());
    let (model, report) = snapshot.generate(&merge_engine(), &renamed).unwrap();
    let source = model.entity("Event").unwrap().property("source").unwrap();
    assert_eq!(source.id, device.id);
    assert_eq!(report.retired(ElementKind::Relation), 1);

    // Records written under the old name still decode under the new one.
    let reopened = Store::open_in_memory(&model, Config::default()).unwrap();
    let slots = reopened.slot_map("Event").unwrap();
    let reader = slotbox_core::RecordReader::new(slots, &stored[1]);
    assert_eq!(reader.get_string("source").unwrap(), "device 2");
}

#[test]
fn failed_run_leaves_snapshot_untouched() {
    let snapshot = TempModelFile::new();
    snapshot.generate(&merge_engine(), &iot_declared()).unwrap();
    let before = snapshot.bytes().unwrap();

    let clash = DeclaredModel::new().entity(
        DeclaredEntity::new("Event")
            .property(DeclaredProperty::new("id", PropertyType::Long).flags(PropertyFlags::ID))
            .property(DeclaredProperty::new("date", PropertyType::String)),
    );
    let err = snapshot.generate(&merge_engine(), &clash).unwrap_err();
    assert!(matches!(err, ModelError::Incompatible { .. }));
    assert_eq!(snapshot.bytes().unwrap(), before);
    assert_eq!(snapshot.entries(), vec![SNAPSHOT_NAME.to_string()]);
}

#[test]
fn corrupt_snapshot_is_reported() {
    let snapshot = TempModelFile::new();
    snapshot.write_raw("{ not json");
    assert!(matches!(
        snapshot.generate(&merge_engine(), &iot_declared()),
        Err(ModelError::Json(_))
    ));
}

proptest! {
    #![proptest_config(PropTestConfig::quick().to_proptest_config())]

    #[test]
    fn any_declared_model_opens_a_store(declared in declared_model_strategy(3)) {
        let snapshot = TempModelFile::new();
        let (model, _) = snapshot.generate(&merge_engine(), &declared).unwrap();
        let (again, report) = snapshot.generate(&merge_engine(), &declared).unwrap();
        prop_assert!(report.is_unchanged());
        prop_assert_eq!(&again, &model);

        let store = TestStore::with_model(&model, Config::default());
        for entity in &declared.entities {
            let count = store
                .run_with_cursor(&entity.name, false, |cursor| cursor.count())
                .unwrap();
            prop_assert_eq!(count, 0);
        }
    }
}
