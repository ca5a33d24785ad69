//! Session (unit of work)
//!
//! A [`Session`] owns an identity map that guarantees one [`Managed`] instance
//! per `(type, identifier)` and keeps a persisted snapshot ("shadow") of every
//! managed entity for dirty checking on merge. All SQL goes through the
//! session's [`QueryRunner`]; transactions are the caller's concern.

use std::any::{Any, TypeId};
use std::cell::{Ref, RefCell, RefMut};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use tracing::{debug, trace};
use uuid::Uuid;

use crate::classifier::EntityMeta;
use crate::config::OrmConfig;
use crate::dirty_check::DirtyCheckMarker;
use crate::entity::Entity;
use crate::error::{OrmError, Result};
use crate::runner::QueryRunner;
use crate::sql::dml::{render_delete, render_insert, render_update};
use crate::sql::select::Select;
use crate::table::TableEntity;
use crate::types::{GenerationType, Value};

// ============================================================================
// Managed references
// ============================================================================

/// Shared handle to an entity instance
///
/// Clones point at the same instance; [`Managed::ptr_eq`] tells whether two
/// handles are the same reference.
pub struct Managed<E>(Rc<RefCell<E>>);

impl<E> Managed<E> {
    pub fn new(entity: E) -> Self {
        Self(Rc::new(RefCell::new(entity)))
    }

    /// Borrow the entity
    ///
    /// # Panics
    /// Panics if the entity is currently mutably borrowed.
    pub fn borrow(&self) -> Ref<'_, E> {
        self.0.borrow()
    }

    /// Mutably borrow the entity
    ///
    /// # Panics
    /// Panics if the entity is currently borrowed.
    pub fn borrow_mut(&self) -> RefMut<'_, E> {
        self.0.borrow_mut()
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl<E> Clone for Managed<E> {
    fn clone(&self) -> Self {
        Self(Rc::clone(&self.0))
    }
}

impl<E> From<E> for Managed<E> {
    fn from(entity: E) -> Self {
        Self::new(entity)
    }
}

impl<E: fmt::Debug> fmt::Debug for Managed<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.try_borrow() {
            Ok(entity) => f.debug_tuple("Managed").field(&*entity).finish(),
            Err(_) => f.write_str("Managed(<borrowed>)"),
        }
    }
}

// ============================================================================
// Identity map
// ============================================================================

/// Identifier value usable as a map key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IdKey {
    Int(i64),
    Text(String),
    Uuid(Uuid),
    Bool(bool),
}

impl TryFrom<&Value> for IdKey {
    type Error = OrmError;

    fn try_from(value: &Value) -> Result<Self> {
        match value {
            Value::Int(i) => Ok(IdKey::Int(*i)),
            Value::Text(s) => Ok(IdKey::Text(s.clone())),
            Value::Uuid(u) => Ok(IdKey::Uuid(*u)),
            Value::Bool(b) => Ok(IdKey::Bool(*b)),
            Value::Null => Err(OrmError::missing_identifier("identifier is NULL")),
            other => Err(OrmError::value_conversion(format!(
                "{} cannot be used as an identifier",
                other
            ))),
        }
    }
}

/// `(type, identifier)` key of the identity map
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntityKey {
    type_id: TypeId,
    type_name: &'static str,
    id: IdKey,
}

impl EntityKey {
    pub fn of<E: Entity>(id: &Value) -> Result<Self> {
        Ok(Self {
            type_id: TypeId::of::<E>(),
            type_name: E::entity_name(),
            id: IdKey::try_from(id)?,
        })
    }

    pub fn id(&self) -> &IdKey {
        &self.id
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

struct Entry {
    instance: Rc<dyn Any>,
    shadow: TableEntity,
}

/// Managed instances of one session, with their persisted snapshots
#[derive(Default)]
pub struct IdentityMap {
    entries: HashMap<EntityKey, Entry>,
}

impl IdentityMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get<E: Entity>(&self, key: &EntityKey) -> Option<Managed<E>> {
        let entry = self.entries.get(key)?;
        Rc::downcast::<RefCell<E>>(Rc::clone(&entry.instance))
            .ok()
            .map(Managed)
    }

    /// Persisted snapshot of the instance under `key`
    pub fn shadow(&self, key: &EntityKey) -> Option<&TableEntity> {
        self.entries.get(key).map(|e| &e.shadow)
    }

    pub fn insert<E: Entity>(&mut self, key: EntityKey, entity: &Managed<E>, shadow: TableEntity) {
        let instance: Rc<dyn Any> = Rc::clone(&entity.0) as Rc<dyn Any>;
        self.entries.insert(key, Entry { instance, shadow });
    }

    pub fn remove(&mut self, key: &EntityKey) -> bool {
        self.entries.remove(key).is_some()
    }

    pub fn contains(&self, key: &EntityKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl fmt::Debug for IdentityMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.entries.keys()).finish()
    }
}

// ============================================================================
// Session
// ============================================================================

/// Unit of work over one [`QueryRunner`]
pub struct Session<R: QueryRunner> {
    runner: R,
    config: OrmConfig,
    identity_map: IdentityMap,
    metas: HashMap<TypeId, Rc<dyn Any>>,
}

impl<R: QueryRunner> Session<R> {
    /// Open a session with the default configuration
    pub fn new(runner: R) -> Self {
        Self::with_config(runner, OrmConfig::default())
    }

    pub fn with_config(runner: R, config: OrmConfig) -> Self {
        debug!("Opening session");
        Self {
            runner,
            config,
            identity_map: IdentityMap::new(),
            metas: HashMap::new(),
        }
    }

    pub fn config(&self) -> &OrmConfig {
        &self.config
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    pub fn runner_mut(&mut self) -> &mut R {
        &mut self.runner
    }

    /// Classified metadata of `E`, computed once per session
    pub fn meta<E: Entity>(&mut self) -> Result<Rc<EntityMeta<E>>> {
        let type_id = TypeId::of::<E>();
        if let Some(meta) = self.metas.get(&type_id) {
            if let Ok(meta) = Rc::downcast::<EntityMeta<E>>(Rc::clone(meta)) {
                return Ok(meta);
            }
        }
        let meta = Rc::new(EntityMeta::<E>::classify(&self.config)?);
        self.metas
            .insert(type_id, Rc::clone(&meta) as Rc<dyn Any>);
        Ok(meta)
    }

    /// Look up `E` by identifier
    ///
    /// Returns the managed instance when the identity map has one; otherwise
    /// reads it (eager relations joined in) and registers it.
    #[tracing::instrument(level = "debug", skip_all, fields(entity = E::entity_name()))]
    pub fn find<E: Entity>(&mut self, id: impl Into<Value>) -> Result<Option<Managed<E>>> {
        let meta = self.meta::<E>()?;
        let id = meta.normalize_identity(id.into())?;
        let key = EntityKey::of::<E>(&id)?;
        if let Some(managed) = self.identity_map.get::<E>(&key) {
            trace!(id = %id, "Identity map hit");
            return Ok(Some(managed));
        }
        trace!(id = %id, "Identity map miss");

        let Some(entity) = self.load(&meta, &id)? else {
            return Ok(None);
        };
        let shadow = meta.table_entity(&entity);
        let key = EntityKey::of::<E>(shadow.id().value())?;
        if let Some(managed) = self.identity_map.get::<E>(&key) {
            return Ok(Some(managed));
        }
        let managed = Managed::new(entity);
        self.identity_map.insert(key, &managed, shadow);
        Ok(Some(managed))
    }

    /// Insert `entity` and register it
    ///
    /// Returns the same reference. Storage-generated identifiers are written
    /// back onto the entity; UUID identifiers are assigned when empty.
    #[tracing::instrument(level = "debug", skip_all, fields(entity = E::entity_name()))]
    pub fn persist<E: Entity>(&mut self, entity: &Managed<E>) -> Result<Managed<E>> {
        let meta = self.meta::<E>()?;
        let id_field = meta.id_field();
        let generation = id_field.generation;

        {
            let mut instance = entity.borrow_mut();
            if meta.identity_value(&instance).is_null() {
                match generation {
                    GenerationType::Uuid => {
                        meta.set_identity(&mut instance, Value::Uuid(Uuid::new_v4()))?;
                    }
                    GenerationType::Assigned => {
                        return Err(OrmError::missing_identifier(format!(
                            "{} has no identifier to persist",
                            meta.type_name()
                        )));
                    }
                    GenerationType::Identity => {}
                }
            }
        }

        let sql = render_insert(&meta.table_entity(&entity.borrow()));
        debug!(sql = %sql, "Inserting");
        let generated = self.runner.insert(&sql)?;

        if generation == GenerationType::Identity {
            let mut instance = entity.borrow_mut();
            match generated {
                Some(key) => meta.set_identity(&mut instance, key)?,
                None if meta.identity_value(&instance).is_null() => {
                    return Err(OrmError::missing_identifier(format!(
                        "storage returned no key for {}",
                        meta.type_name()
                    )));
                }
                None => {}
            }
        }

        let shadow = meta.table_entity(&entity.borrow());
        let key = EntityKey::of::<E>(shadow.id().value())?;
        trace!(id = %shadow.id().value(), "Registering persisted entity");
        self.identity_map.insert(key, entity, shadow);
        Ok(entity.clone())
    }

    /// Update the stored row of `entity` with its changed columns
    ///
    /// New entities (no identifier, or no stored row) are persisted instead.
    /// Always returns the managed reference for the identity; when `entity` is
    /// a different instance its values are copied onto the managed one.
    #[tracing::instrument(level = "debug", skip_all, fields(entity = E::entity_name()))]
    pub fn merge<E: Entity>(&mut self, entity: &Managed<E>) -> Result<Managed<E>> {
        let meta = self.meta::<E>()?;
        let id = meta.identity_value(&entity.borrow());
        if id.is_null() {
            trace!("No identifier, persisting");
            return self.persist(entity);
        }

        let key = EntityKey::of::<E>(&id)?;
        let cached = self
            .identity_map
            .get::<E>(&key)
            .zip(self.identity_map.shadow(&key).cloned());
        let (managed, snapshot) = match cached {
            Some(cached) => cached,
            None => match self.load(&meta, &id)? {
                Some(stored) => (entity.clone(), meta.table_entity(&stored)),
                None => {
                    trace!(id = %id, "No stored row, persisting");
                    return self.persist(entity);
                }
            },
        };

        let mut current = meta.table_entity(&entity.borrow());
        let dirty = DirtyCheckMarker::new(&mut current, &snapshot).compare_and_mark_changed_fields();
        if dirty {
            if let Some(sql) = render_update(&current) {
                debug!(sql = %sql, "Updating");
                self.runner.execute(&sql)?;
            }
        } else {
            trace!(id = %id, "No changes");
        }

        if !managed.ptr_eq(entity) {
            let mut target = meta.table_entity(&managed.borrow());
            target.replace_all_fields(current.all_fields());
            target.apply_to(&*meta, &mut *managed.borrow_mut())?;
        }

        let shadow = meta.table_entity(&managed.borrow());
        self.identity_map.insert(key, &managed, shadow);
        Ok(managed)
    }

    /// Delete the stored row of `entity` and evict it from the identity map
    #[tracing::instrument(level = "debug", skip_all, fields(entity = E::entity_name()))]
    pub fn remove<E: Entity>(&mut self, entity: &Managed<E>) -> Result<()> {
        let meta = self.meta::<E>()?;
        let table = meta.table_entity(&entity.borrow());
        let key = EntityKey::of::<E>(table.id().value())?;

        let sql = render_delete(&table);
        debug!(sql = %sql, "Deleting");
        self.runner.execute(&sql)?;

        self.identity_map.remove(&key);
        Ok(())
    }

    /// Whether an instance of `E` with this identifier is managed
    pub fn contains<E: Entity>(&self, id: impl Into<Value>) -> bool {
        // no cached meta means nothing of `E` was ever registered
        let Some(meta) = self
            .metas
            .get(&TypeId::of::<E>())
            .and_then(|meta| Rc::downcast::<EntityMeta<E>>(Rc::clone(meta)).ok())
        else {
            return false;
        };
        meta.normalize_identity(id.into())
            .and_then(|id| EntityKey::of::<E>(&id))
            .is_ok_and(|key| self.identity_map.contains(&key))
    }

    /// Stop managing `entity` without touching storage
    pub fn detach<E: Entity>(&mut self, entity: &Managed<E>) -> Result<bool> {
        let meta = self.meta::<E>()?;
        let key = EntityKey::of::<E>(&meta.identity_value(&entity.borrow()))?;
        Ok(self.identity_map.remove(&key))
    }

    /// Forget every managed instance
    pub fn clear(&mut self) {
        self.identity_map.clear();
    }

    /// Number of managed instances
    pub fn len(&self) -> usize {
        self.identity_map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identity_map.is_empty()
    }

    /// End the unit of work, handing the runner back
    pub fn close(self) -> R {
        debug!(managed = self.identity_map.len(), "Closing session");
        self.runner
    }

    fn load<E: Entity>(&mut self, meta: &Rc<EntityMeta<E>>, id: &Value) -> Result<Option<E>> {
        let select = Select::with_meta(Rc::clone(meta));
        let select = if meta.has_eager_relations() {
            select.join_all_eager().where_with_id(id.clone())
        } else {
            select.find_by_id(id.clone())
        };
        select.fetch_one(&mut self.runner)
    }
}

impl<R: QueryRunner + fmt::Debug> fmt::Debug for Session<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("runner", &self.runner)
            .field("identity_map", &self.identity_map)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::FieldDef;
    use crate::row::Row;

    #[derive(Debug, Default, Clone, PartialEq)]
    struct Person {
        id: Option<i64>,
        name: String,
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

    #[derive(Debug, Default)]
    struct Token {
        id: Option<Uuid>,
    }

    impl Entity for Token {
        fn fields() -> Vec<FieldDef<Self>> {
            vec![
                FieldDef::id("id", |t: &Self| &t.id, |t: &mut Self| &mut t.id)
                    .generated(GenerationType::Uuid),
            ]
        }
    }

    #[derive(Debug, Default)]
    struct Recording {
        statements: Vec<String>,
        rows: Vec<Row>,
    }

    impl QueryRunner for Recording {
        fn query(&mut self, sql: &str) -> Result<Vec<Row>> {
            self.statements.push(sql.to_string());
            Ok(std::mem::take(&mut self.rows))
        }

        fn execute(&mut self, sql: &str) -> Result<u64> {
            self.statements.push(sql.to_string());
            Ok(1)
        }

        fn insert(&mut self, sql: &str) -> Result<Option<Value>> {
            self.statements.push(sql.to_string());
            Ok(None)
        }
    }

    fn ann() -> Managed<Person> {
        Managed::new(Person {
            id: Some(1),
            name: "Ann".to_string(),
            age: 30,
        })
    }

    // =========================================================================
    // Managed Tests
    // =========================================================================

    #[test]
    fn test_managed_clones_share_instance() {
        let a = ann();
        let b = a.clone();
        b.borrow_mut().age = 31;

        assert!(a.ptr_eq(&b));
        assert_eq!(a.borrow().age, 31);
        assert!(!a.ptr_eq(&ann()));
    }

    // =========================================================================
    // Identity Map Tests
    // =========================================================================

    #[test]
    fn test_id_key_rejects_null_and_float() {
        assert!(matches!(
            IdKey::try_from(&Value::Null),
            Err(OrmError::MissingIdentifier(_))
        ));
        assert!(matches!(
            IdKey::try_from(&Value::Float(1.5)),
            Err(OrmError::ValueConversion(_))
        ));
        assert_eq!(IdKey::try_from(&Value::Int(3)).unwrap(), IdKey::Int(3));
    }

    #[test]
    fn test_identity_map_keys_by_type() {
        let mut map = IdentityMap::new();
        let person = ann();
        let key = EntityKey::of::<Person>(&Value::Int(1)).unwrap();
        let shadow = TableEntity::from_entity(&*person.borrow(), &OrmConfig::default()).unwrap();
        map.insert(key.clone(), &person, shadow);

        assert!(map.get::<Person>(&key).unwrap().ptr_eq(&person));
        let token_key = EntityKey::of::<Token>(&Value::Int(1)).unwrap();
        assert!(map.get::<Token>(&token_key).is_none());
        assert_eq!(map.len(), 1);
        assert!(map.remove(&key));
        assert!(map.is_empty());
    }

    // =========================================================================
    // Session Tests
    // =========================================================================

    #[test]
    fn test_persist_registers_same_reference() {
        let mut session = Session::new(Recording::default());
        let person = ann();

        let returned = session.persist(&person).unwrap();
        let found = session.find::<Person>(1).unwrap().unwrap();

        assert!(returned.ptr_eq(&person));
        assert!(found.ptr_eq(&person));
        assert_eq!(
            session.runner().statements,
            vec!["INSERT INTO person (id,name,age) VALUES (1,'Ann',30)"]
        );
    }

    #[test]
    fn test_persist_without_identifier_fails() {
        let mut session = Session::new(Recording::default());
        let person = Managed::new(Person::default());

        let err = session.persist(&person).unwrap_err();

        assert!(matches!(err, OrmError::MissingIdentifier(_)));
        assert!(session.runner().statements.is_empty());
    }

    #[test]
    fn test_persist_assigns_uuid() {
        let mut session = Session::new(Recording::default());
        let token = Managed::new(Token::default());

        session.persist(&token).unwrap();

        let id = token.borrow().id.unwrap();
        assert!(session.contains::<Token>(id));
        assert!(session.runner().statements[0].contains(&id.to_string()));
    }

    #[test]
    fn test_find_miss_reads_and_caches() {
        let mut runner = Recording::default();
        runner.rows = vec![Row::new().with("id", 2).with("name", "Bob").with("age", 40)];
        let mut session = Session::new(runner);

        let first = session.find::<Person>(2).unwrap().unwrap();
        let second = session.find::<Person>(2).unwrap().unwrap();

        assert!(first.ptr_eq(&second));
        assert_eq!(first.borrow().name, "Bob");
        assert_eq!(
            session.runner().statements,
            vec!["SELECT id,name,age FROM person WHERE id = 2"]
        );
    }

    #[test]
    fn test_find_by_text_uuid_hits_persisted_instance() {
        let mut session = Session::new(Recording::default());
        let token = Managed::new(Token::default());
        session.persist(&token).unwrap();
        let id = token.borrow().id.unwrap();

        let by_text = session.find::<Token>(id.to_string()).unwrap().unwrap();
        let by_text_again = session.find::<Token>(id.to_string()).unwrap().unwrap();
        let by_uuid = session.find::<Token>(id).unwrap().unwrap();

        assert!(by_text.ptr_eq(&token));
        assert!(by_text_again.ptr_eq(&token));
        assert!(by_uuid.ptr_eq(&token));
        assert!(session.contains::<Token>(id.to_string()));
        assert_eq!(session.len(), 1);
        assert_eq!(session.runner().statements.len(), 1);
        assert!(session.runner().statements[0].starts_with("INSERT INTO token"));
    }

    #[test]
    fn test_find_by_text_integer_reads_once() {
        let mut runner = Recording::default();
        runner.rows = vec![Row::new().with("id", 2).with("name", "Bob").with("age", 40)];
        let mut session = Session::new(runner);

        let by_text = session.find::<Person>("2").unwrap().unwrap();
        let by_int = session.find::<Person>(2).unwrap().unwrap();

        assert!(by_text.ptr_eq(&by_int));
        assert_eq!(session.len(), 1);
        assert_eq!(
            session.runner().statements,
            vec!["SELECT id,name,age FROM person WHERE id = 2"]
        );
    }

    #[test]
    fn test_find_with_unconvertible_id_fails() {
        let mut session = Session::new(Recording::default());

        let err = session.find::<Person>("abc").unwrap_err();

        assert!(matches!(err, OrmError::ValueConversion(_)));
        assert!(session.runner().statements.is_empty());
    }

    #[test]
    fn test_find_absent_is_none() {
        let mut session = Session::new(Recording::default());
        assert!(session.find::<Person>(9).unwrap().is_none());
        assert!(session.is_empty());
    }

    #[test]
    fn test_merge_unchanged_issues_no_update() {
        let mut session = Session::new(Recording::default());
        let person = ann();
        session.persist(&person).unwrap();

        let merged = session.merge(&person).unwrap();

        assert!(merged.ptr_eq(&person));
        assert_eq!(session.runner().statements.len(), 1);
    }

    #[test]
    fn test_merge_updates_changed_columns_only() {
        let mut session = Session::new(Recording::default());
        let person = ann();
        session.persist(&person).unwrap();
        person.borrow_mut().age = 31;

        session.merge(&person).unwrap();
        session.merge(&person).unwrap();

        assert_eq!(
            session.runner().statements[1..],
            ["UPDATE person SET age = 31 WHERE id = 1".to_string()]
        );
    }

    #[test]
    fn test_merge_copy_onto_managed_instance() {
        let mut session = Session::new(Recording::default());
        let person = ann();
        session.persist(&person).unwrap();
        let detached_copy = Managed::new(Person {
            name: "Annie".to_string(),
            ..person.borrow().clone()
        });

        let merged = session.merge(&detached_copy).unwrap();

        assert!(merged.ptr_eq(&person));
        assert!(!merged.ptr_eq(&detached_copy));
        assert_eq!(person.borrow().name, "Annie");
        assert_eq!(
            session.runner().statements.last().map(String::as_str),
            Some("UPDATE person SET name = 'Annie' WHERE id = 1")
        );
    }

    #[test]
    fn test_remove_evicts() {
        let mut session = Session::new(Recording::default());
        let person = ann();
        session.persist(&person).unwrap();

        session.remove(&person).unwrap();

        assert!(!session.contains::<Person>(1));
        assert!(session.find::<Person>(1).unwrap().is_none());
        assert_eq!(session.runner().statements[1], "DELETE FROM person WHERE id = 1");
    }

    #[test]
    fn test_detach_clear_and_close() {
        let mut session = Session::new(Recording::default());
        let person = ann();
        session.persist(&person).unwrap();

        assert!(session.detach(&person).unwrap());
        assert!(!session.detach(&person).unwrap());

        session.persist(&Managed::new(Person {
            id: Some(2),
            ..Person::default()
        }))
        .unwrap();
        assert_eq!(session.len(), 1);
        session.clear();
        assert!(session.is_empty());

        let runner = session.close();
        assert_eq!(runner.statements.len(), 2);
    }
}
