use crate::subclass_test_utils::shared::{setup_registry, Armor, Game, Player, TournamentGame};
use parse_subclassing::{
    Constructor, DataAvailability, ObjectReference, ParseError, ParseObjectLike, ParseSubclass,
};


#[cfg(test)]
mod subclass_factory_tests {
    use super::*;

    #[test]
    fn test_object_returns_registered_subclass() {
        let registry = setup_registry();
        Game::register_subclass(&registry).unwrap();

        let mut game = Game::object(&registry).expect("Game is registered");
        assert_eq!(game.parse_object().class_name(), "Game");
        assert!(game.parse_object().object_id().is_none());
        assert!(game.parse_object().is_data_available());

        game.set_title("Bughouse");
        assert_eq!(game.title().as_deref(), Some("Bughouse"));
        assert!(game.parse_object().is_dirty());
    }

    #[test]
    fn test_object_without_data_is_unfetched_reference() {
        let registry = setup_registry();
        Game::register_subclass(&registry).unwrap();

        let game = Game::object_without_data(&registry, "abc123").unwrap();
        let object = game.parse_object();
        assert_eq!(object.object_id(), Some("abc123"));
        assert_eq!(object.availability(), DataAvailability::Unfetched);
        assert!(!object.is_data_available());
        assert_eq!(object.fields().count(), 0);
        assert!(game.title().is_none());
    }

    #[test]
    fn test_object_without_data_rejects_empty_id() {
        let registry = setup_registry();
        Game::register_subclass(&registry).unwrap();
        let err = Game::object_without_data(&registry, "").unwrap_err();
        assert!(matches!(err, ParseError::InvalidInput(_)));
    }

    #[test]
    fn test_new_reference_has_placeholder_identity() {
        let registry = setup_registry();
        Armor::register_subclass(&registry).unwrap();

        let armor = registry
            .create_reference("Armor", ObjectReference::New)
            .unwrap();
        assert!(armor.is::<Armor>());
        assert!(armor.parse_object().object_id().is_none());
        assert!(armor.parse_object().is_data_available());
    }

    #[test]
    fn test_factories_require_registration() {
        let registry = setup_registry();

        let err = Armor::object(&registry).unwrap_err();
        assert!(matches!(err, ParseError::PreconditionViolation(_)), "{:?}", err);

        let err = Armor::object_without_data(&registry, "a1").unwrap_err();
        assert!(matches!(err, ParseError::PreconditionViolation(_)));

        let err = Armor::query(&registry).unwrap_err();
        assert!(matches!(err, ParseError::PreconditionViolation(_)));
    }

    #[test]
    fn test_superseded_type_can_no_longer_construct() {
        let registry = setup_registry();
        Game::register_subclass(&registry).unwrap();
        TournamentGame::register_subclass(&registry).unwrap();

        let err = Game::object(&registry).unwrap_err();
        match err {
            ParseError::PreconditionViolation(message) => {
                assert!(message.contains("TournamentGame"), "{}", message);
            }
            other => panic!("Expected PreconditionViolation, got {:?}", other),
        }

        let tournament = TournamentGame::object(&registry).unwrap();
        assert_eq!(tournament.parse_object().class_name(), "Game");
    }

    #[test]
    fn test_builtin_class_override() {
        let registry = setup_registry();
        // Seeded as a default, which does not satisfy the typed factories.
        assert!(Player::object(&registry).is_err());

        Player::register_subclass(&registry).unwrap();
        let player = Player::object(&registry).unwrap();
        assert_eq!(player.parse_object().class_name(), "_User");
        assert!(!registry.descriptor("_User").unwrap().is_default());
    }

    #[test]
    fn test_default_registration_builds_its_type() {
        let registry = setup_registry();
        registry
            .register_default(Game::parse_class_name(), Constructor::of::<Game>())
            .unwrap();
        assert!(registry.descriptor("Game").unwrap().is_default());

        assert!(registry.create("Game").is::<Game>());
        let game = Game::object(&registry).expect("default registration of Game");
        assert_eq!(game.parse_object().class_name(), "Game");
        let reference = Game::object_without_data(&registry, "d1").unwrap();
        assert!(!reference.parse_object().is_data_available());

        // An explicit registration of the same type promotes it.
        registry.register_subclass::<Game>().unwrap();
        assert!(!registry.descriptor("Game").unwrap().is_default());
    }

    #[test]
    fn test_query_is_scoped_to_class() {
        let registry = setup_registry();
        Game::register_subclass(&registry).unwrap();

        let query = Game::query(&registry).unwrap();
        assert_eq!(query.class_name(), "Game");
        assert!(query.conditions().is_empty());
    }

    #[test]
    fn test_query_with_applies_constraints() {
        let registry = setup_registry();
        Game::register_subclass(&registry).unwrap();

        let query = Game::query_with(&registry, |q| {
            q.equal_to("title", "Bughouse").greater_than("players", 2);
        })
        .unwrap();

        assert_eq!(query.class_name(), "Game");
        assert_eq!(query.conditions()["title"], "Bughouse");
        assert_eq!(query.conditions()["players"]["$gt"], 2);
    }

    #[test]
    fn test_query_with_on_unregistered_type_does_not_run_closure() {
        let registry = setup_registry();
        let mut ran = false;
        let result = Armor::query_with(&registry, |_| ran = true);
        assert!(result.is_err());
        assert!(!ran);
    }
}
