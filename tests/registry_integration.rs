use crate::subclass_test_utils::shared::{setup_registry, Armor, Game, TournamentGame};
use parse_subclassing::{
    Constructor, Materialized, ParseError, ParseObject, ParseObjectLike, ParseSubclass,
    RegistrationError, RegistrationOutcome, Resolution,
};


#[cfg(test)]
mod registry_tests {
    use super::*;

    #[test]
    fn test_registered_constructor_produces_registered_type() {
        let registry = setup_registry();
        let outcome = registry.register("Game", Constructor::of::<Game>()).unwrap();
        assert_eq!(outcome, RegistrationOutcome::Inserted);

        match registry.resolve_constructor("Game") {
            Resolution::Registered(descriptor) => {
                assert_eq!(descriptor.class_name(), "Game");
                assert!(!descriptor.is_default());
                let instance = descriptor.new_instance();
                assert!(instance.is::<Game>());
                assert_eq!(instance.parse_object().class_name(), "Game");
            }
            other => panic!("Expected a registered resolution, got {:?}", other),
        }
    }

    #[test]
    fn test_last_registration_wins() {
        let registry = setup_registry();
        registry.register_subclass::<Game>().unwrap();
        let before = registry.len();

        let outcome = registry.register_subclass::<TournamentGame>().unwrap();
        assert!(
            matches!(outcome, RegistrationOutcome::Superseded { previous } if previous.ends_with("Game")),
            "Unexpected outcome: {:?}",
            outcome
        );
        assert_eq!(registry.len(), before, "Override must not add an entry");

        let created = registry.create("Game");
        assert!(created.is::<TournamentGame>());
        assert!(!created.is::<Game>());
    }

    #[test]
    fn test_identical_registration_is_a_no_op() {
        let registry = setup_registry();
        registry.register_subclass::<Armor>().unwrap();
        let first = registry.descriptor("Armor").unwrap();

        let outcome = registry.register_subclass::<Armor>().unwrap();
        assert_eq!(outcome, RegistrationOutcome::Unchanged);

        let second = registry.descriptor("Armor").unwrap();
        assert!(std::sync::Arc::ptr_eq(&first, &second));
        assert_eq!(
            registry
                .registered_class_names()
                .iter()
                .filter(|name| *name == "Armor")
                .count(),
            1
        );
    }

    #[test]
    fn test_unregistered_name_resolves_to_generic() {
        let registry = setup_registry();
        let resolution = registry.resolve_constructor("NeverRegistered");
        assert!(!resolution.is_registered());
        assert_eq!(resolution.class_name(), "NeverRegistered");

        match resolution.new_instance() {
            Materialized::Generic(object) => {
                assert_eq!(object.class_name(), "NeverRegistered");
                assert!(object.object_id().is_none());
            }
            other => panic!("Expected a generic instance, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_class_name_is_rejected_and_registry_unchanged() {
        let registry = setup_registry();
        let names_before = registry.registered_class_names();

        let err = registry
            .register("", Constructor::of::<Game>())
            .unwrap_err();
        assert!(err.is_registration_error());
        assert!(matches!(
            err,
            ParseError::Registration(RegistrationError::EmptyClassName)
        ));

        assert_eq!(registry.registered_class_names(), names_before);
        assert!(!registry.is_registered(""));
    }

    #[test]
    fn test_invalid_class_name_is_rejected() {
        let registry = setup_registry();
        for bad in ["has space", "dash-ed", "1stPlace"] {
            let err = registry
                .register(bad, Constructor::generic())
                .unwrap_err();
            assert!(
                matches!(err, ParseError::Registration(RegistrationError::InvalidClassName(ref n)) if n == bad),
                "Unexpected error for '{}': {:?}",
                bad,
                err
            );
        }
    }

    #[test]
    fn test_type_can_be_registered_under_another_name() {
        let registry = setup_registry();
        registry
            .register("LegacyGame", Constructor::from_fn(Game::from_object))
            .unwrap();

        let created = registry.create("LegacyGame");
        assert!(created.is::<Game>());
        assert_eq!(created.class_name(), "LegacyGame");
    }

    #[test]
    fn test_create_is_empty_and_unsaved() {
        let registry = setup_registry();
        registry.register_subclass::<Game>().unwrap();

        let created = registry.create("Game");
        let object: &ParseObject = created.parse_object();
        assert!(object.object_id().is_none());
        assert_eq!(object.fields().count(), 0);
        assert!(object.is_data_available());
        assert!(!object.is_dirty());
    }

    #[test]
    fn test_build_query_targets_class() {
        let registry = setup_registry();
        let query = registry.build_query("Armor");
        assert_eq!(query.class_name(), "Armor");
        assert!(query.build_query_params().is_empty());
    }
}
