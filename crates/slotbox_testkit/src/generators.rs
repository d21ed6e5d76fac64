//! Property-based test generators using proptest.
//!
//! Strategies produce declared schemas that always pass
//! `DeclaredModel::validate`, and fixture events.

use crate::fixtures::Event;
use proptest::prelude::*;
use slotbox_model::{
    DeclaredEntity, DeclaredModel, DeclaredProperty, PropertyFlags, PropertyType,
};

/// Strategy for element names.
pub fn name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[A-Za-z][A-Za-z0-9_]{0,15}").expect("Invalid regex")
}

/// Strategy for non-ID property types.
pub fn property_type_strategy() -> impl Strategy<Value = PropertyType> {
    prop_oneof![
        Just(PropertyType::Bool),
        Just(PropertyType::Byte),
        Just(PropertyType::Short),
        Just(PropertyType::Int),
        Just(PropertyType::Long),
        Just(PropertyType::Float),
        Just(PropertyType::Double),
        Just(PropertyType::String),
        Just(PropertyType::Date),
        Just(PropertyType::DateNano),
        Just(PropertyType::ByteVector),
        Just(PropertyType::StringVector),
    ]
}

/// Strategy for one entity with an `id` property and up to `max_properties`
/// more, all uniquely named.
pub fn declared_entity_strategy(max_properties: usize) -> impl Strategy<Value = DeclaredEntity> {
    (
        name_strategy(),
        prop::collection::btree_map(name_strategy(), (property_type_strategy(), any::<bool>()), 0..=max_properties),
    )
        .prop_map(|(name, properties)| {
            let entity = DeclaredEntity::new(name)
                .property(DeclaredProperty::new("id", PropertyType::Long).flags(PropertyFlags::ID));
            properties
                .into_iter()
                .filter(|(property, _)| property != "id")
                .fold(entity, |entity, (property, (property_type, indexed))| {
                    let flags = if indexed && !property_type.is_variable_length() {
                        PropertyFlags::INDEXED
                    } else {
                        PropertyFlags::NONE
                    };
                    entity.property(DeclaredProperty::new(property, property_type).flags(flags))
                })
        })
}

/// Strategy for a model of up to `max_entities` uniquely named entities.
pub fn declared_model_strategy(max_entities: usize) -> impl Strategy<Value = DeclaredModel> {
    prop::collection::vec(declared_entity_strategy(6), 1..=max_entities).prop_map(|entities| {
        let mut seen = std::collections::HashSet::new();
        entities
            .into_iter()
            .filter(|entity| seen.insert(entity.name.clone()))
            .fold(DeclaredModel::new(), DeclaredModel::entity)
    })
}

/// Strategy for unsaved events.
pub fn event_strategy() -> impl Strategy<Value = Event> {
    (
        prop::string::string_regex("device [0-9]{1,3}").expect("Invalid regex"),
        any::<i64>(),
    )
        .prop_map(|(device, date)| Event::new(device, date))
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #![proptest_config(PropTestConfig::quick().to_proptest_config())]

        #[test]
        fn generated_models_validate(model in declared_model_strategy(4)) {
            prop_assert!(model.validate().is_ok());
        }

        #[test]
        fn generated_events_are_unsaved(event in event_strategy()) {
            prop_assert_eq!(event.id, 0);
            prop_assert!(event.device.starts_with("device "));
        }
    }
}
