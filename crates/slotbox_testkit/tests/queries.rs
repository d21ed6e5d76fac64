//! Query scenarios across model, core and the reference engine.

use slotbox_core::{Config, CoreError, DebugFlags, EngineError};
use slotbox_testkit::prelude::*;

#[test]
fn empty_store_finds_nothing() {
    with_test_store(|store| {
        let query = store
            .query::<Event>()
            .and_then(|builder| builder.build_and_destroy())
            .unwrap();
        let (objects, records) = store
            .run_with_cursor("Event", false, |cursor| {
                Ok((query.find(cursor)?, query.find_bytes(cursor)?))
            })
            .unwrap();
        assert!(objects.is_empty());
        assert!(records.is_empty());
    });
}

#[test]
fn case_insensitive_string_equality() {
    with_test_store(|store| {
        store.put_events(3);

        let mut builder = store.query::<Event>().unwrap();
        builder.string_equal(event::DEVICE, "DEVICE 2", false).unwrap();
        let query = builder.build_and_destroy().unwrap();

        let found = store
            .run_with_cursor("Event", false, |cursor| query.find(cursor))
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].device, "device 2");
        assert_eq!(found[0].id, 2);
    });
}

#[test]
fn case_sensitive_string_equality_misses() {
    with_test_store(|store| {
        store.put_events(3);

        let mut builder = store.query::<Event>().unwrap();
        builder.string_equal(event::DEVICE, "DEVICE 2", true).unwrap();
        let query = builder.build_and_destroy().unwrap();

        let count = store
            .run_with_cursor("Event", false, |cursor| query.count(cursor))
            .unwrap();
        assert_eq!(count, 0);
    });
}

#[test]
fn between_returns_inclusive_range_in_order() {
    let store = TestStore::with_config(
        Config::new().debug_flags(DebugFlags::LOG_QUERIES | DebugFlags::LOG_QUERY_PARAMETERS),
    );
    let events = store.put_events(6);

    let mut builder = store.query::<Event>().unwrap();
    builder
        .int_between(event::DATE, events[2].date, events[4].date)
        .unwrap();
    let query = builder.build_and_destroy().unwrap();

    let found = store
        .run_with_cursor("Event", false, |cursor| query.find(cursor))
        .unwrap();
    assert_eq!(found, events[2..=4].to_vec());
}

#[test]
fn find_bytes_matches_find() {
    with_test_store(|store| {
        store.put_events(5);
        let mut builder = store.query::<Event>().unwrap();
        builder.int_greater(event::DATE, BASE_DATE + 2000).unwrap();
        let query = builder.build_and_destroy().unwrap();

        let slots = store.slot_map("Event").unwrap();
        let (objects, records) = store
            .run_with_cursor("Event", false, |cursor| {
                Ok((query.find(cursor)?, query.find_bytes(cursor)?))
            })
            .unwrap();
        let decoded: Vec<Event> = records
            .iter()
            .map(|record| slotbox_core::decode(slots, record).unwrap())
            .collect();
        assert_eq!(objects, decoded);
        assert_eq!(objects.iter().map(|e| e.id).collect::<Vec<_>>(), vec![3, 4, 5]);
    });
}

#[test]
fn zero_conditions_return_everything_in_id_order() {
    with_test_store(|store| {
        let events = store.put_events(4);
        let query = store
            .query::<Event>()
            .and_then(|builder| builder.build_and_destroy())
            .unwrap();
        let found = store
            .run_with_cursor("Event", false, |cursor| query.find(cursor))
            .unwrap();
        assert_eq!(found, events);
    });
}

#[test]
fn zero_conditions_refused_when_required() {
    let store = TestStore::with_config(Config::new().require_conditions(true));
    let err = store
        .query::<Event>()
        .and_then(|builder| builder.build_and_destroy())
        .unwrap_err();
    assert_eq!(err.engine_code(), Some(EngineError::ILLEGAL_ARGUMENT));
    assert_eq!(store.live_handles(), 0);
}

#[test]
fn uncommitted_writes_are_visible_to_their_own_cursor_only() {
    with_test_store(|store| {
        store.put_events(2);
        let mut builder = store.query::<Event>().unwrap();
        builder.string_starts_with(event::DEVICE, "device", true).unwrap();
        let query = builder.build_and_destroy().unwrap();

        let events = store.entity_box::<Event>().unwrap();
        let seen_inside = store
            .run_with_cursor("Event", true, |cursor| {
                events.put_in(cursor, &mut Event::new("device 9", BASE_DATE))?;
                let inside = query.count(cursor)?;
                Err::<u64, _>(CoreError::invalid_operation(format!("rollback after {inside}")))
            })
            .unwrap_err();
        assert_eq!(seen_inside.to_string(), "invalid operation: rollback after 3");

        let after = store
            .run_with_cursor("Event", false, |cursor| query.count(cursor))
            .unwrap();
        assert_eq!(after, 2);
    });
}

#[test]
fn readings_query_on_doubles() {
    with_test_store(|store| {
        let readings = store.entity_box::<Reading>().unwrap();
        let mut batch: Vec<Reading> = (0..5)
            .map(|i| Reading {
                id: 0,
                date: BASE_DATE + i,
                value: i as f64 * 1.5,
            })
            .collect();
        readings.put_all(&mut batch).unwrap();

        let mut builder = readings.query().unwrap();
        builder.double_between(reading::VALUE, 1.5, 4.5).unwrap();
        builder.int_less(reading::DATE, BASE_DATE + 3).unwrap();
        let query = builder.build_and_destroy().unwrap();
        let found = store
            .run_with_cursor("Reading", false, |cursor| query.find_ids(cursor))
            .unwrap();
        assert_eq!(found, vec![2, 3]);
    });
}
