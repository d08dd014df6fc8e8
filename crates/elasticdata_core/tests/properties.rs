//! Property tests for change tracking.

use elasticdata_core::{
    ChangeRecord, Entity, EntityRef, FieldChange, Operation, RecordState, ID_FIELD,
};
use elasticdata_testkit::prelude::*;
use proptest::prelude::*;
use serde_json::Value;

fn persisted(mut data: elasticdata_core::Source) -> EntityRef<Note> {
    data.insert(ID_FIELD.to_owned(), Value::from("doc-1"));
    EntityRef::new(Note::new(data))
}

proptest! {
    #[test]
    fn diff_matches_applied_edits(initial in source_strategy(), edits in edits_strategy()) {
        let entity = persisted(initial.clone());
        let mut record = ChangeRecord::new(entity.erase(), RecordState::PendingUpdate);

        let mut expected = initial;
        expected.insert(ID_FIELD.to_owned(), Value::from("doc-1"));
        let before = expected.clone();
        {
            let mut doc = entity.write();
            for edit in &edits {
                match edit {
                    FieldEdit::Set(field, value) => doc.set(field.clone(), value.clone()),
                    FieldEdit::Remove(field) => {
                        doc.unset(field);
                    }
                }
                edit.apply(&mut expected);
            }
        }

        let changed = before != expected;
        prop_assert_eq!(record.is_action_needed(), changed);
        match record.diff() {
            None => prop_assert!(!changed),
            Some(diff) => {
                for (field, change) in diff.iter() {
                    match change {
                        FieldChange::Set(value) => {
                            prop_assert_eq!(expected.get(field), Some(value));
                            prop_assert_ne!(before.get(field), Some(value));
                        }
                        FieldChange::Removed => {
                            prop_assert!(before.contains_key(field));
                            prop_assert!(!expected.contains_key(field));
                        }
                    }
                }
                for (field, value) in &expected {
                    if before.get(field) != Some(value) {
                        prop_assert!(diff.contains(field));
                    }
                }
            }
        }
    }

    #[test]
    fn statement_is_stable_until_reset(initial in source_strategy(), edits in edits_strategy()) {
        let entity = persisted(initial);
        let mut record = ChangeRecord::new(entity.erase(), RecordState::PendingUpdate);
        {
            let mut doc = entity.write();
            for edit in &edits {
                match edit {
                    FieldEdit::Set(field, value) => doc.set(field.clone(), value.clone()),
                    FieldEdit::Remove(field) => {
                        doc.unset(field);
                    }
                }
            }
        }

        let first = record.statement(TEST_INDEX);
        let second = record.statement(TEST_INDEX);
        prop_assert_eq!(&first, &second);

        record.reset_state();
        prop_assert!(record.statement(TEST_INDEX).is_none());
    }

    #[test]
    fn create_body_is_storage_without_id(initial in source_strategy()) {
        let entity = note(Value::Object(initial.clone()));
        let mut record = ChangeRecord::new(entity.erase(), RecordState::PendingCreate);

        let stmt = record.statement(TEST_INDEX);
        prop_assert!(stmt.is_some());
        let stmt = stmt.unwrap();
        prop_assert_eq!(stmt.op, Operation::Create);
        prop_assert!(stmt.id.is_none());

        let mut storage = entity.read().to_storage();
        storage.remove(ID_FIELD);
        prop_assert_eq!(stmt.body, Some(storage));
    }

    #[test]
    fn flushed_documents_read_back(initial in source_strategy()) {
        let (mut em, mut em2) = shared_managers();
        let entity = note(Value::Object(initial.clone()));
        em.persist(&entity);
        em.flush().unwrap();

        let id = entity.read().id().unwrap();
        let fetched = em2.get::<Note>(&id).unwrap();
        let mut stored = fetched.read().to_storage();
        prop_assert_eq!(stored.remove(ID_FIELD), Some(Value::String(id)));
        prop_assert_eq!(stored, initial);
    }
}
