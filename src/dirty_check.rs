//! Dirty checking between a current table model and a persisted snapshot

use crate::table::TableEntity;

/// Compares two snapshots of the same identity and marks changed fields on the current one
///
/// Marks are reset at the start of every comparison, so the changed-field set
/// reflects only the most recent call.
pub struct DirtyCheckMarker<'a> {
    current: &'a mut TableEntity,
    snapshot: &'a TableEntity,
}

impl<'a> DirtyCheckMarker<'a> {
    pub fn new(current: &'a mut TableEntity, snapshot: &'a TableEntity) -> Self {
        Self { current, snapshot }
    }

    /// Mark every non-identity field whose value differs from the snapshot
    ///
    /// Fields are matched by position; returns whether any field was marked.
    pub fn compare_and_mark_changed_fields(self) -> bool {
        let id_index = self.current.id_index();
        let snapshot = self.snapshot.all_fields();
        let fields = self.current.fields_mut();
        fields.reset_changed();

        let mut dirty = false;
        for index in 0..fields.len() {
            if index == id_index {
                continue;
            }
            let previous = snapshot.get(index).map(|f| f.value());
            let changed = match (fields.get(index), previous) {
                (Some(field), Some(previous)) => field.value() != previous,
                (Some(_), None) => true,
                (None, _) => false,
            };
            if changed {
                fields.mark_changed(index);
                dirty = true;
            }
        }

        tracing::trace!(table = self.current.table_name(), dirty, "Compared snapshots");
        dirty
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OrmConfig;
    use crate::entity::{Entity, FieldDef};
    use crate::types::Value;

    #[derive(Debug, Default, Clone)]
    struct Person {
        id: Option<i64>,
        name: Option<String>,
        age: i32,
    }

    impl Entity for Person {
        fn fields() -> Vec<FieldDef<Self>> {
            vec![
                FieldDef::id("id", |p: &Self| &p.id, |p: &mut Self| &mut p.id),
                FieldDef::field("name", |p: &Self| &p.name, |p: &mut Self| &mut p.name),
                FieldDef::field("age", |p: &Self| &p.age, |p: &mut Self| &mut p.age),
            ]
        }
    }

    fn table(person: &Person) -> TableEntity {
        TableEntity::from_entity(person, &OrmConfig::default()).unwrap()
    }

    fn ann() -> Person {
        Person {
            id: Some(1),
            name: Some("Ann".to_string()),
            age: 30,
        }
    }

    // =========================================================================
    // Comparison Tests
    // =========================================================================

    #[test]
    fn test_identical_snapshots_are_clean() {
        let snapshot = table(&ann());
        let mut current = table(&ann());

        let dirty = DirtyCheckMarker::new(&mut current, &snapshot).compare_and_mark_changed_fields();

        assert!(!dirty);
        assert!(current.changed_fields().is_empty());
    }

    #[test]
    fn test_single_changed_field_is_marked() {
        let snapshot = table(&ann());
        let mut changed = ann();
        changed.age = 31;
        let mut current = table(&changed);

        let dirty = DirtyCheckMarker::new(&mut current, &snapshot).compare_and_mark_changed_fields();

        assert!(dirty);
        let fields = current.changed_fields();
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].column_name(), "age");
        assert_eq!(fields[0].value(), &Value::Int(31));
    }

    #[test]
    fn test_null_safe_comparison() {
        let snapshot = table(&ann());
        let mut cleared = ann();
        cleared.name = None;
        let mut current = table(&cleared);

        assert!(DirtyCheckMarker::new(&mut current, &snapshot).compare_and_mark_changed_fields());
        assert_eq!(current.changed_fields()[0].column_name(), "name");

        let null_snapshot = table(&cleared);
        assert!(
            !DirtyCheckMarker::new(&mut current, &null_snapshot).compare_and_mark_changed_fields()
        );
    }

    #[test]
    fn test_identity_is_never_marked() {
        let snapshot = table(&ann());
        let mut other = ann();
        other.id = Some(2);
        let mut current = table(&other);

        assert!(!DirtyCheckMarker::new(&mut current, &snapshot).compare_and_mark_changed_fields());
    }

    #[test]
    fn test_marks_reset_between_comparisons() {
        let snapshot = table(&ann());
        let mut changed = ann();
        changed.age = 31;
        let mut current = table(&changed);
        assert!(DirtyCheckMarker::new(&mut current, &snapshot).compare_and_mark_changed_fields());

        let caught_up = table(&changed);
        let dirty = DirtyCheckMarker::new(&mut current, &caught_up).compare_and_mark_changed_fields();

        assert!(!dirty);
        assert!(current.changed_fields().is_empty());
    }
}
