//! Schema registry (§4.2): an in-memory, version-indexed catalog of
//! entities, transactions, roles, and modules, plus the case-insensitive
//! name→uuid indexes and precomputed per-entity transaction views the
//! validator consumes.
//!
//! Registry updates are whole-version swaps under an exclusive lock —
//! writers (schema publish/downgrade) are rare, reads (every sync session)
//! dominate, so each context's version table lives behind a
//! [`parking_lot::RwLock`] rather than anything fancier.

use crate::codec::AttributeValue;
use crate::errors::SchemaError;
use crate::identifiers::{AttributeId, EntityId, ModuleId, RoleId, TransactionId, Version};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Type of a declared key column (§3 "Entity").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyType {
    /// Signed 64-bit integer.
    Integer,
    /// UTF-8 text.
    Text,
    /// Opaque bytes.
    Blob,
    /// Time-ordered UUID (RFC 4122 version 1 / DCE time).
    UuidV1,
    /// Random UUID (RFC 4122 version 4).
    UuidV4,
}

/// Type of a declared (non-key) attribute column (§3 "Entity").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrType {
    /// Signed 64-bit integer.
    Integer,
    /// IEEE-754 double.
    Real,
    /// UTF-8 text.
    Text,
    /// Opaque bytes.
    Blob,
    /// Time-ordered UUID (RFC 4122 version 1 / DCE time).
    UuidV1,
    /// Random UUID (RFC 4122 version 4).
    UuidV4,
}

impl AttrType {
    /// Whether an incoming [`AttributeValue`] is type-compatible with this
    /// declared attribute type. `UuidV1`/`UuidV4` widen to `Text` since both
    /// forms carry UUID bytes tagged `Text` (§4.1); the UUID-specific parse
    /// checks (DCE_TIME etc.) happen in the validator, not here.
    pub fn accepts_tag(&self, value: &AttributeValue) -> bool {
        match (self, value) {
            (Self::Integer, AttributeValue::Integer(_)) => true,
            (Self::Real, AttributeValue::Real(_)) => true,
            (Self::Text, AttributeValue::Text(_)) => true,
            (Self::Blob, AttributeValue::Blob(_)) => true,
            (Self::UuidV1 | Self::UuidV4, AttributeValue::Text(_)) => true,
            _ => false,
        }
    }
}

/// A minimal, typed subset of the source system's per-attribute "check
/// expression" (§4.3). The original embeds an arbitrary scripting runtime
/// for this; per `spec.md` §9 the core treats rich scripting as an opaque
/// external collaborator, so this enum covers the structural checks the
/// core can evaluate on its own. Anything richer is a pre/post script hook.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeCheck {
    /// Always accepts (the default when no check is declared).
    Always,
    /// Text length must be in `1..=max` (rejects empty and overlong text).
    TextMaxLen(usize),
    /// Integer must be `>= min`.
    IntegerMin(i64),
    /// Integer must be in `min..=max`.
    IntegerRange(i64, i64),
}

impl AttributeCheck {
    /// Evaluate this check against a non-null value. Null values are
    /// handled separately by the `notnull` flag, not by checks.
    pub fn accepts(&self, value: &AttributeValue) -> bool {
        match self {
            Self::Always => true,
            Self::TextMaxLen(max) => match value {
                AttributeValue::Text(s) => !s.is_empty() && s.len() <= *max,
                _ => true,
            },
            Self::IntegerMin(min) => match value {
                AttributeValue::Integer(v) => v >= min,
                _ => true,
            },
            Self::IntegerRange(min, max) => match value {
                AttributeValue::Integer(v) => v >= min && v <= max,
                _ => true,
            },
        }
    }
}

/// One declared key column (§3).
#[derive(Debug, Clone)]
pub struct Key {
    /// Small positive integer address, unique within the entity's key set.
    pub id: AttributeId,
    /// Column name.
    pub name: String,
    /// Declared type.
    pub ty: KeyType,
}

/// One declared attribute column (§3).
#[derive(Debug, Clone)]
pub struct Attribute {
    /// Small positive integer address, unique within the entity's attribute set.
    pub id: AttributeId,
    /// Column name.
    pub name: String,
    /// Declared type.
    pub ty: AttrType,
    /// Whether a non-null value is required on insert / whenever updated.
    pub notnull: bool,
    /// Optional structural check, compiled once at registry publish.
    pub check: AttributeCheck,
}

/// A table-like schema object (§3 "Entity").
#[derive(Debug, Clone)]
pub struct Entity {
    /// Stable identity.
    pub id: EntityId,
    /// Unique (case-insensitively) within a schema version.
    pub name: String,
    /// Non-empty; ids unique within this set. The composite of all key
    /// values is the entity's primary key.
    pub keys: Vec<Key>,
    /// Ordered attribute columns.
    pub attributes: Vec<Attribute>,
}

impl Entity {
    /// Find a key by its attribute id.
    pub fn key(&self, id: AttributeId) -> Option<&Key> {
        self.keys.iter().find(|k| k.id == id)
    }

    /// Find an attribute by its attribute id.
    pub fn attribute(&self, id: AttributeId) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.id == id)
    }
}

/// What one [`Transaction`] permits on one [`Entity`] (§3, §4.2).
///
/// This is the precomputed reshape the registry derives from `Transaction`
/// definitions on publish — the "per-entity transaction view" §9 calls out
/// as worth breaking out of the cyclic Entity↔Transaction reference.
#[derive(Debug, Clone, Default)]
pub struct EntityTxView {
    /// Transaction allows `Insert` on this entity.
    pub add: bool,
    /// Transaction allows `Delete` on this entity.
    pub remove: bool,
    /// Attribute ids this transaction may set on `Update`.
    pub update_ids: HashSet<AttributeId>,
}

/// A named operation template (§3 "Transaction (schema)").
#[derive(Debug, Clone)]
pub struct Transaction {
    /// Stable identity.
    pub id: TransactionId,
    /// Unique (case-insensitively) within a schema version.
    pub name: String,
    /// Per-entity permissions this transaction grants.
    pub touches: HashMap<EntityId, EntityTxView>,
    /// Opaque pre-apply script name (§9); `None` means "accept".
    pub pre_script: Option<String>,
    /// Opaque post-apply script name (§9); `None` means "accept".
    pub post_script: Option<String>,
}

/// Capability bag + visible-attribute mask + allowed-transaction set (§3 "Role").
#[derive(Debug, Clone, Default)]
pub struct Role {
    /// Stable identity.
    pub id: RoleId,
    /// Unique (case-insensitively) within a schema version.
    pub name: String,
    /// Exactly one role per context has `default_role = true`; assigned to
    /// a dataset's creator (§3).
    pub default_role: bool,
    /// Can list a dataset's members.
    pub readmembers: bool,
    /// Can change member roles / remove members.
    pub managemembers: bool,
    /// Can see member email addresses (gated additionally by `readmembers`).
    pub reademail: bool,
    /// Can create/invite via share tokens.
    pub sharedataset: bool,
    /// Can list/cancel outstanding share tokens.
    pub manageshare: bool,
    /// Per-entity visible-attribute mask.
    pub entity_masks: HashMap<EntityId, HashSet<AttributeId>>,
    /// Transactions this role is allowed to submit.
    pub allowed_transactions: HashSet<TransactionId>,
}

/// Per-entity visible-attribute mask declared by a client build (§3 "Module").
#[derive(Debug, Clone, Default)]
pub struct Module {
    /// Stable identity.
    pub id: ModuleId,
    /// Unique (case-insensitively) within a schema version.
    pub name: String,
    /// Per-entity visible-attribute mask.
    pub entity_masks: HashMap<EntityId, HashSet<AttributeId>>,
}

fn lower_index<T>(items: &HashMap<uuid::Uuid, T>, name_of: impl Fn(&T) -> &str) -> HashMap<String, uuid::Uuid> {
    items
        .iter()
        .map(|(id, item)| (name_of(item).to_lowercase(), *id))
        .collect()
}

/// An immutable snapshot of entities/transactions/roles/modules at one
/// published or draft version (§3 "SchemaVersion").
pub struct SchemaVersion {
    /// The version number this snapshot represents.
    pub version: Version,
    entities: HashMap<uuid::Uuid, Entity>,
    transactions: HashMap<uuid::Uuid, Transaction>,
    roles: HashMap<uuid::Uuid, Role>,
    modules: HashMap<uuid::Uuid, Module>,
    entities_by_name: HashMap<String, uuid::Uuid>,
    transactions_by_name: HashMap<String, uuid::Uuid>,
    roles_by_name: HashMap<String, uuid::Uuid>,
    modules_by_name: HashMap<String, uuid::Uuid>,
}

impl SchemaVersion {
    /// Build a version snapshot, computing the case-insensitive name
    /// indexes once (§4.2).
    pub fn new(
        version: Version,
        entities: Vec<Entity>,
        transactions: Vec<Transaction>,
        roles: Vec<Role>,
        modules: Vec<Module>,
    ) -> Result<Self, SchemaError> {
        let entities: HashMap<_, _> = entities.into_iter().map(|e| (e.id.uuid(), e)).collect();
        let transactions: HashMap<_, _> = transactions.into_iter().map(|t| (t.id.uuid(), t)).collect();
        let roles: HashMap<_, _> = roles.into_iter().map(|r| (r.id.uuid(), r)).collect();
        let modules: HashMap<_, _> = modules.into_iter().map(|m| (m.id.uuid(), m)).collect();

        let entities_by_name = lower_index(&entities, |e| &e.name);
        check_no_collision("entity", &entities, &entities_by_name)?;
        let transactions_by_name = lower_index(&transactions, |t| &t.name);
        check_no_collision("transaction", &transactions, &transactions_by_name)?;
        let roles_by_name = lower_index(&roles, |r| &r.name);
        check_no_collision("role", &roles, &roles_by_name)?;
        let modules_by_name = lower_index(&modules, |m| &m.name);
        check_no_collision("module", &modules, &modules_by_name)?;

        Ok(Self {
            version,
            entities,
            transactions,
            roles,
            modules,
            entities_by_name,
            transactions_by_name,
            roles_by_name,
            modules_by_name,
        })
    }

    /// Resolve an entity by uuid.
    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id.uuid())
    }

    /// Iterate every entity declared in this version, in no particular
    /// order. Used when streaming a first-sync snapshot across every
    /// visible entity (§4.9 Phase C(iv)).
    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    /// Resolve an entity by case-insensitive name.
    pub fn entity_by_name(&self, name: &str) -> Option<&Entity> {
        self.entities_by_name
            .get(&name.to_lowercase())
            .and_then(|id| self.entities.get(id))
    }

    /// Resolve a transaction by uuid.
    pub fn transaction(&self, id: TransactionId) -> Option<&Transaction> {
        self.transactions.get(&id.uuid())
    }

    /// Resolve a transaction by case-insensitive name.
    pub fn transaction_by_name(&self, name: &str) -> Option<&Transaction> {
        self.transactions_by_name
            .get(&name.to_lowercase())
            .and_then(|id| self.transactions.get(id))
    }

    /// Resolve a role by uuid.
    pub fn role(&self, id: RoleId) -> Option<&Role> {
        self.roles.get(&id.uuid())
    }

    /// Resolve a role by case-insensitive name.
    pub fn role_by_name(&self, name: &str) -> Option<&Role> {
        self.roles_by_name
            .get(&name.to_lowercase())
            .and_then(|id| self.roles.get(id))
    }

    /// The context's single default role (assigned to a dataset's creator).
    pub fn default_role(&self) -> Option<&Role> {
        self.roles.values().find(|r| r.default_role)
    }

    /// Resolve a module by uuid.
    pub fn module(&self, id: ModuleId) -> Option<&Module> {
        self.modules.get(&id.uuid())
    }

    /// Resolve a module by case-insensitive name.
    pub fn module_by_name(&self, name: &str) -> Option<&Module> {
        self.modules_by_name
            .get(&name.to_lowercase())
            .and_then(|id| self.modules.get(id))
    }

    /// The intersection of a role's and a module's visible-attribute masks
    /// for one entity — what §4.9 Phase C calls "the visible mask" when
    /// filtering peer changes for download.
    pub fn visible_mask(&self, entity: EntityId, role: &Role, module: &Module) -> HashSet<AttributeId> {
        let role_mask = role.entity_masks.get(&entity).cloned().unwrap_or_default();
        let module_mask = module.entity_masks.get(&entity).cloned().unwrap_or_default();
        role_mask.intersection(&module_mask).copied().collect()
    }
}

fn check_no_collision<T>(
    kind: &'static str,
    items: &HashMap<uuid::Uuid, T>,
    index: &HashMap<String, uuid::Uuid>,
) -> Result<(), SchemaError> {
    if index.len() != items.len() {
        // Find one colliding name to report.
        let mut seen = HashSet::new();
        for id in items.keys() {
            let name = index
                .iter()
                .find(|(_, v)| *v == id)
                .map(|(k, _)| k.clone())
                .unwrap_or_default();
            if !seen.insert(name.clone()) {
                return Err(SchemaError::DuplicateName { kind, name });
            }
        }
    }
    Ok(())
}

/// In-memory, per-context, version-indexed catalog (§4.2).
///
/// Holds every version ever published (plus the current draft) so peers
/// that authored a Header against an older version can still be validated
/// against it; only [`SchemaRegistry::downgrade`] actually discards
/// versions.
#[derive(Default)]
pub struct SchemaRegistry {
    versions: RwLock<HashMap<u32, Arc<SchemaVersion>>>,
    current: RwLock<u32>,
    edited: RwLock<u32>,
}

impl SchemaRegistry {
    /// An empty registry with no published versions.
    pub fn new() -> Self {
        Self::default()
    }

    /// The currently published version number.
    pub fn current_version(&self) -> u32 {
        *self.current.read()
    }

    /// The mutable draft version number (`edited >= version`).
    pub fn edited_version(&self) -> u32 {
        *self.edited.read()
    }

    /// Install a new version snapshot (whole-version swap under the
    /// exclusive writer lock).
    pub fn put_version(&self, snapshot: SchemaVersion) {
        let v = snapshot.version.0;
        self.versions.write().insert(v, Arc::new(snapshot));
        let mut edited = self.edited.write();
        if v > *edited {
            *edited = v;
        }
    }

    /// Publish: promote the draft to current (`edited -> version+1`, per
    /// §3). The newly published version must already have been installed
    /// via [`SchemaRegistry::put_version`].
    pub fn publish(&self) -> Result<u32, SchemaError> {
        let edited = *self.edited.read();
        if !self.versions.read().contains_key(&edited) {
            return Err(SchemaError::VersionNotFound(edited));
        }
        *self.current.write() = edited;
        Ok(edited)
    }

    /// Downgrade: discard all versions `> edited` and reset the draft
    /// pointer to `edited` (§3).
    pub fn downgrade(&self, edited: u32) {
        self.versions.write().retain(|v, _| *v <= edited);
        *self.edited.write() = edited;
        let mut current = self.current.write();
        if *current > edited {
            *current = edited;
        }
    }

    /// Fetch a specific published/draft version.
    pub fn get(&self, version: u32) -> Option<Arc<SchemaVersion>> {
        self.versions.read().get(&version).cloned()
    }

    /// Fetch the currently published version.
    pub fn current(&self) -> Option<Arc<SchemaVersion>> {
        self.get(self.current_version())
    }

    /// Resolve the version a header declared, enforcing §4.3(a): a header
    /// may not target a version newer than what's currently published.
    pub fn resolve_for_header(&self, declared: u32) -> Result<Arc<SchemaVersion>, SchemaError> {
        let current = self.current_version();
        if declared > current {
            return Err(SchemaError::VersionTooNew {
                requested: declared,
                current,
            });
        }
        self.get(declared).ok_or(SchemaError::VersionNotFound(declared))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identifiers::EntityId as Eid;

    fn item_entity_v(keys: Vec<Key>, attrs: Vec<Attribute>) -> Entity {
        Entity {
            id: Eid::new(),
            name: "Item".into(),
            keys,
            attributes: attrs,
        }
    }

    #[test]
    fn name_lookup_is_case_insensitive() {
        let entity = item_entity_v(
            vec![Key {
                id: AttributeId(1),
                name: "k1".into(),
                ty: KeyType::Integer,
            }],
            vec![],
        );
        let version = SchemaVersion::new(Version(1), vec![entity], vec![], vec![], vec![]).unwrap();
        assert!(version.entity_by_name("ITEM").is_some());
        assert!(version.entity_by_name("item").is_some());
        assert!(version.entity_by_name("nope").is_none());
    }

    #[test]
    fn duplicate_name_rejected() {
        let e1 = item_entity_v(vec![], vec![]);
        let mut e2 = item_entity_v(vec![], vec![]);
        e2.name = "ITEM".into(); // collides case-insensitively with e1's "Item"
        let err = SchemaVersion::new(Version(1), vec![e1, e2], vec![], vec![], vec![]).unwrap_err();
        assert!(matches!(err, SchemaError::DuplicateName { kind: "entity", .. }));
    }

    #[test]
    fn registry_resolves_header_version_and_rejects_future_versions() {
        let registry = SchemaRegistry::new();
        let v1 = SchemaVersion::new(Version(1), vec![], vec![], vec![], vec![]).unwrap();
        registry.put_version(v1);
        registry.publish().unwrap();
        assert_eq!(registry.current_version(), 1);
        assert!(registry.resolve_for_header(1).is_ok());
        let err = registry.resolve_for_header(2).unwrap_err();
        assert!(matches!(err, SchemaError::VersionTooNew { requested: 2, current: 1 }));
    }

    #[test]
    fn downgrade_discards_newer_versions() {
        let registry = SchemaRegistry::new();
        registry.put_version(SchemaVersion::new(Version(1), vec![], vec![], vec![], vec![]).unwrap());
        registry.put_version(SchemaVersion::new(Version(2), vec![], vec![], vec![], vec![]).unwrap());
        registry.publish().unwrap();
        assert_eq!(registry.current_version(), 2);
        registry.downgrade(1);
        assert!(registry.get(2).is_none());
        assert_eq!(registry.current_version(), 1);
        assert_eq!(registry.edited_version(), 1);
    }
}
