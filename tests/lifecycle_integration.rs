use crate::subclass_test_utils::shared::{generate_object_id, setup_registry, Game};
use parse_subclassing::{DataAvailability, ParseDate, ParseObject, ParseObjectLike, ParseSubclass};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;


#[cfg(test)]
mod lifecycle_tests {
    use super::*;

    #[test]
    fn test_fetch_moves_reference_to_fetched() {
        let registry = setup_registry();
        Game::register_subclass(&registry).unwrap();
        let object_id = generate_object_id();

        let mut game = Game::object_without_data(&registry, &object_id).unwrap();
        assert!(!game.parse_object().is_data_available());

        assert!(game.parse_object().begin_fetch());
        assert_eq!(game.parse_object().availability(), DataAvailability::Fetching);
        assert!(!game.parse_object().is_data_available());

        let payload = json!({
            "objectId": object_id,
            "updatedAt": "2024-06-01T12:00:00.000Z",
            "title": "Blitz"
        });
        game.parse_object_mut()
            .apply_fetched(payload.as_object().unwrap())
            .unwrap();

        assert_eq!(game.parse_object().availability(), DataAvailability::Fetched);
        assert!(game.parse_object().is_data_available());
        assert_eq!(game.title().as_deref(), Some("Blitz"));
    }

    #[test]
    fn test_mutation_keeps_fetched() {
        let registry = setup_registry();
        Game::register_subclass(&registry).unwrap();

        let mut game = Game::object_without_data(&registry, "m1").unwrap();
        let payload = json!({"objectId": "m1", "title": "Before"});
        game.parse_object_mut()
            .apply_fetched(payload.as_object().unwrap())
            .unwrap();

        game.set_title("After");
        game.parse_object_mut().increment("plays", 1);
        game.parse_object_mut().unset("title");

        assert_eq!(game.parse_object().availability(), DataAvailability::Fetched);
        let dirty: Vec<&str> = game.parse_object().dirty_keys().collect();
        assert_eq!(dirty, vec!["plays", "title"]);
    }

    #[test]
    fn test_refetch_does_not_revert() {
        let mut object = ParseObject::new("Game");
        object
            .mark_saved("s1", ParseDate::new("2024-06-01T12:00:00.000Z"))
            .unwrap();
        assert!(!object.begin_fetch(), "Fetched objects are never Unfetched again");

        let payload = json!({"objectId": "s1", "title": "Refreshed"});
        object.apply_fetched(payload.as_object().unwrap()).unwrap();
        assert_eq!(object.availability(), DataAvailability::Fetched);
        assert_eq!(object.get::<String>("title").as_deref(), Some("Refreshed"));
    }

    #[test]
    fn test_failed_fetch_returns_to_unfetched() {
        let object = ParseObject::without_data("Game", "f1");
        assert!(object.begin_fetch());
        assert!(object.abort_fetch());
        assert_eq!(object.availability(), DataAvailability::Unfetched);
        assert!(!object.abort_fetch());
    }

    #[test]
    fn test_save_sets_timestamps_and_clears_changes() {
        let mut object = ParseObject::new("Game");
        object.set("title", "Draft").unwrap();
        let saved_at = ParseDate::now();
        object.mark_saved("n1", saved_at.clone()).unwrap();

        assert_eq!(object.object_id(), Some("n1"));
        assert_eq!(object.created_at(), Some(&saved_at));
        assert_eq!(object.updated_at(), Some(&saved_at));
        assert!(!object.is_dirty());
        assert!(saved_at.to_datetime().is_ok());
    }

    #[test]
    fn test_delete_is_terminal() {
        let mut object = ParseObject::without_data("Game", "d1");
        object.mark_deleted();
        assert_eq!(object.availability(), DataAvailability::Deleted);
        assert!(!object.is_data_available());

        object.mark_saved("d1", ParseDate::now()).unwrap();
        assert_eq!(object.availability(), DataAvailability::Deleted);
        let payload = json!({"objectId": "d1"});
        assert!(object.apply_fetched(payload.as_object().unwrap()).is_err());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_fetch_claims_have_single_winner() {
        let object = Arc::new(ParseObject::without_data("Game", "race"));
        let winners = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..32 {
            let object = Arc::clone(&object);
            let winners = Arc::clone(&winners);
            handles.push(tokio::spawn(async move {
                if object.begin_fetch() {
                    winners.fetch_add(1, Ordering::SeqCst);
                }
                // Readers never see a half-transitioned state.
                let state = object.availability();
                assert!(matches!(
                    state,
                    DataAvailability::Unfetched | DataAvailability::Fetching
                ));
            }));
        }
        for handle in handles {
            handle.await.expect("task panicked");
        }

        assert_eq!(winners.load(Ordering::SeqCst), 1);
        assert_eq!(object.availability(), DataAvailability::Fetching);
    }
}
