//! Transaction validator (§4.3).
//!
//! Takes a decoded Header (one transaction name, an ordered sequence of
//! Changes naming entities/attributes by **name** and carrying text-form
//! values) and, against one resolved [`SchemaVersion`], enforces the
//! structural and authorization rules §4.3 lists per operation, reshapes
//! UUID-typed fields from text form into the binary form storage expects,
//! and reports a single [`ValidationCode`] per change plus an overall
//! header status.
//!
//! UUID reshape note: `spec.md` describes the binary form of a `UuidV1`/
//! `UuidV4` attribute as "16 raw bytes tagged as Text". [`crate::codec`]'s
//! `Text` variant is a Rust [`String`], which must be valid UTF-8 — 16
//! arbitrary bytes generally aren't. This validator reshapes such fields
//! into [`AttributeValue::Blob`] instead, preserving the same 16-byte
//! layout and round-trip behavior without smuggling non-UTF-8 bytes through
//! a `String`.

use crate::codec::{AttributeRecord, AttributeValue};
use crate::errors::ValidationCode;
use crate::schema::{AttrType, Entity, KeyType, Role, SchemaVersion, Transaction};
use std::collections::HashSet;

/// The three row-level mutation kinds a Header's Changes carry (§3 "Change").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Create a new row.
    Insert,
    /// Modify attributes of an existing row.
    Update,
    /// Remove an existing row.
    Delete,
}

/// One as-received, text-form Change (§3 "Change", §4.3).
///
/// `new_pk`/`new_data`/`old_pk`/`old_data` are the decoded
/// `(attribute_id, value)` tuples named by the wire fields of the same
/// name; which are populated depends on `operation` (§4.9 Phase B).
#[derive(Debug, Clone)]
pub struct Change {
    /// Name of the entity this change targets, resolved against the
    /// header's declared schema version.
    pub entity_name: String,
    /// Mutation kind.
    pub operation: Operation,
    /// New primary key (Insert, Update).
    pub new_pk: Vec<AttributeRecord>,
    /// New attribute values (Insert, Update).
    pub new_data: Vec<AttributeRecord>,
    /// Existing primary key (Update, Delete).
    pub old_pk: Vec<AttributeRecord>,
}

/// A [`Change`] after successful validation: entity resolved to its uuid,
/// every field reshaped into binary form, ready for [`crate::codec::merge`]
/// and row storage.
#[derive(Debug, Clone)]
pub struct ValidatedChange {
    /// Resolved entity.
    pub entity: crate::identifiers::EntityId,
    /// Mutation kind (carried through unchanged).
    pub operation: Operation,
    /// Binary-form new primary key.
    pub new_pk: Vec<AttributeRecord>,
    /// Binary-form new attribute values.
    pub new_data: Vec<AttributeRecord>,
    /// Binary-form existing primary key.
    pub old_pk: Vec<AttributeRecord>,
}

/// The result of validating one Change: a status, and the reshaped change
/// when the status is [`ValidationCode::Success`].
#[derive(Debug, Clone)]
pub struct ChangeOutcome {
    /// Outcome of validating this one change.
    pub status: ValidationCode,
    /// Present only when `status == ValidationCode::Success`.
    pub validated: Option<ValidatedChange>,
}

impl ChangeOutcome {
    fn code(status: ValidationCode) -> Self {
        Self {
            status,
            validated: None,
        }
    }

    fn ok(validated: ValidatedChange) -> Self {
        Self {
            status: ValidationCode::Success,
            validated: Some(validated),
        }
    }
}

/// The result of validating an entire Header: one overall status (the code
/// that short-circuited it, or `Success` if every change applied or was
/// skipped) plus the per-change outcomes up to and including the
/// short-circuiting one (§4.3, §4.4 step 2b).
#[derive(Debug, Clone)]
pub struct HeaderValidation {
    /// Overall header status, to be persisted as `Header.status`.
    pub status: ValidationCode,
    /// Per-change outcomes, in header order. Stops at the first
    /// short-circuiting failure; later changes are never evaluated.
    pub changes: Vec<ChangeOutcome>,
}

/// Validate an entire header's changes against one resolved schema version
/// and the submitting member's role (§4.3).
///
/// Does not itself check dataset membership/active status — that's
/// [`crate::schema`]'s capability resolution (§4.6), performed by the
/// caller before this runs.
pub fn validate_header(
    schema: &SchemaVersion,
    role: &Role,
    transaction_name: &str,
    changes: &[Change],
) -> HeaderValidation {
    let transaction = match schema.transaction_by_name(transaction_name) {
        Some(t) => t,
        None => {
            return HeaderValidation {
                status: ValidationCode::EntityDefinition,
                changes: vec![],
            }
        }
    };
    if !role.allowed_transactions.contains(&transaction.id) {
        return HeaderValidation {
            status: ValidationCode::NotValidOperation,
            changes: vec![],
        };
    }

    let mut outcomes = Vec::with_capacity(changes.len());
    let mut status = ValidationCode::Success;
    for change in changes {
        let outcome = validate_change(schema, transaction, change);
        let code = outcome.status;
        outcomes.push(outcome);
        if code.short_circuits() {
            status = code;
            break;
        }
    }
    HeaderValidation {
        status,
        changes: outcomes,
    }
}

fn validate_change(schema: &SchemaVersion, transaction: &Transaction, change: &Change) -> ChangeOutcome {
    let entity = match schema.entity_by_name(&change.entity_name) {
        Some(e) => e,
        None => return ChangeOutcome::code(ValidationCode::SkipEntity),
    };
    let tx_view = match transaction.touches.get(&entity.id) {
        Some(view) => view,
        None => return ChangeOutcome::code(ValidationCode::NotValidOperation),
    };

    match change.operation {
        Operation::Insert => {
            if !tx_view.add {
                return ChangeOutcome::code(ValidationCode::NotValidOperation);
            }
            validate_insert(entity, change)
        }
        Operation::Update => {
            if tx_view.update_ids.is_empty() {
                return ChangeOutcome::code(ValidationCode::NotValidOperation);
            }
            validate_update(entity, &tx_view.update_ids, change)
        }
        Operation::Delete => {
            if !tx_view.remove {
                return ChangeOutcome::code(ValidationCode::NotValidOperation);
            }
            validate_delete(entity, change)
        }
    }
}

fn validate_insert(entity: &Entity, change: &Change) -> ChangeOutcome {
    let new_pk = match validate_pk(entity, &change.new_pk) {
        Ok(pk) => pk,
        Err(code) => return ChangeOutcome::code(code),
    };
    let new_data = match validate_data(entity, &change.new_data) {
        Ok(data) => data,
        Err(code) => return ChangeOutcome::code(code),
    };
    ChangeOutcome::ok(ValidatedChange {
        entity: entity.id,
        operation: Operation::Insert,
        new_pk,
        new_data,
        old_pk: vec![],
    })
}

fn validate_update(entity: &Entity, updatable: &HashSet<crate::identifiers::AttributeId>, change: &Change) -> ChangeOutcome {
    let new_pk = match validate_pk(entity, &change.new_pk) {
        Ok(pk) => pk,
        Err(code) => return ChangeOutcome::code(code),
    };
    let old_pk = match validate_pk(entity, &change.old_pk) {
        Ok(pk) => pk,
        Err(code) => return ChangeOutcome::code(code),
    };
    for (id, _) in &change.new_data {
        if !updatable.contains(&crate::identifiers::AttributeId(*id)) {
            return ChangeOutcome::code(ValidationCode::NotValidOperation);
        }
    }
    let new_data = match validate_data(entity, &change.new_data) {
        Ok(data) => data,
        Err(code) => return ChangeOutcome::code(code),
    };
    ChangeOutcome::ok(ValidatedChange {
        entity: entity.id,
        operation: Operation::Update,
        new_pk,
        new_data,
        old_pk,
    })
}

fn validate_delete(entity: &Entity, change: &Change) -> ChangeOutcome {
    let old_pk = match validate_pk(entity, &change.old_pk) {
        Ok(pk) => pk,
        Err(code) => return ChangeOutcome::code(code),
    };
    ChangeOutcome::ok(ValidatedChange {
        entity: entity.id,
        operation: Operation::Delete,
        new_pk: vec![],
        new_data: vec![],
        old_pk,
    })
}

/// Validate a primary key tuple against `entity.keys`: the schema must
/// declare at least one key ([`ValidationCode::EntityDefinition`] if not),
/// every declared key must appear exactly once, non-null and
/// type-compatible, with `UuidV1` additionally requiring a DCE-time uuid
/// (§4.3 Insert/Update/Delete rules).
fn validate_pk(entity: &Entity, pk: &[AttributeRecord]) -> Result<Vec<AttributeRecord>, ValidationCode> {
    if entity.keys.is_empty() {
        return Err(ValidationCode::EntityDefinition);
    }

    let mut seen = HashSet::new();
    let mut by_id = std::collections::HashMap::new();
    for (id, value) in pk {
        if !seen.insert(*id) {
            return Err(ValidationCode::NotValidIncomeData);
        }
        by_id.insert(*id, value);
    }

    let mut out = Vec::with_capacity(entity.keys.len());
    for key in &entity.keys {
        let value = match by_id.get(&key.id.0) {
            Some(v) => *v,
            None => return Err(ValidationCode::NotValidIncomeData),
        };
        if value.is_null() {
            return Err(ValidationCode::NotValidIncomeData);
        }
        let reshaped = match key.ty {
            KeyType::Integer => match value {
                AttributeValue::Integer(_) => value.clone(),
                _ => return Err(ValidationCode::NotValidIncomeData),
            },
            KeyType::Text => match value {
                AttributeValue::Text(_) => value.clone(),
                _ => return Err(ValidationCode::NotValidIncomeData),
            },
            KeyType::Blob => match value {
                AttributeValue::Blob(_) => value.clone(),
                _ => return Err(ValidationCode::NotValidIncomeData),
            },
            KeyType::UuidV1 => match uuid_bytes(value, true) {
                Some(bytes) => AttributeValue::Blob(bytes.to_vec()),
                None => return Err(ValidationCode::NotValidIncomeData),
            },
            KeyType::UuidV4 => match uuid_bytes(value, false) {
                Some(bytes) => AttributeValue::Blob(bytes.to_vec()),
                None => return Err(ValidationCode::NotValidIncomeData),
            },
        };
        out.push((key.id.0, reshaped));
    }
    // Reject a payload naming keys the entity doesn't declare.
    if pk.len() != entity.keys.len() {
        return Err(ValidationCode::NotValidIncomeData);
    }
    Ok(out)
}

/// Validate a data tuple against `entity.attributes`: unknown attribute ids
/// are dropped with a warning, declared `notnull` attributes must be
/// present and non-null, present values must type-match (with `UuidV1`
/// requiring DCE-time), duplicate ids abort, and each attribute's compiled
/// check must accept the (non-null) value (§4.3).
fn validate_data(entity: &Entity, data: &[AttributeRecord]) -> Result<Vec<AttributeRecord>, ValidationCode> {
    let mut seen = HashSet::new();
    let mut present = std::collections::HashMap::new();
    for (id, value) in data {
        if !seen.insert(*id) {
            return Err(ValidationCode::NotValidIncomeData);
        }
        match entity.attribute(crate::identifiers::AttributeId(*id)) {
            Some(_) => {
                present.insert(*id, value);
            }
            None => {
                tracing::warn!(entity = %entity.name, attribute = id, "dropping unknown attribute id on insert/update");
            }
        }
    }

    let mut out = Vec::with_capacity(present.len());
    for attr in &entity.attributes {
        let value = match present.get(&attr.id.0) {
            Some(v) => *v,
            None => {
                if attr.notnull {
                    return Err(ValidationCode::NotValidIncomeData);
                }
                continue;
            }
        };
        if value.is_null() {
            if attr.notnull {
                return Err(ValidationCode::NotValidIncomeData);
            }
            out.push((attr.id.0, AttributeValue::Null));
            continue;
        }
        let reshaped = match attr.ty {
            AttrType::Integer | AttrType::Real | AttrType::Text | AttrType::Blob => {
                if !attr.ty.accepts_tag(value) {
                    return Err(ValidationCode::NotValidIncomeData);
                }
                value.clone()
            }
            AttrType::UuidV1 => match uuid_bytes(value, true) {
                Some(bytes) => AttributeValue::Blob(bytes.to_vec()),
                None => return Err(ValidationCode::NotValidIncomeData),
            },
            AttrType::UuidV4 => match uuid_bytes(value, false) {
                Some(bytes) => AttributeValue::Blob(bytes.to_vec()),
                None => return Err(ValidationCode::NotValidIncomeData),
            },
        };
        if !attr.check.accepts(&reshaped) {
            return Err(ValidationCode::NotValidIncomeData);
        }
        out.push((attr.id.0, reshaped));
    }
    Ok(out)
}

/// Parse a text-form UUID (36-char canonical string) into its 16 raw
/// bytes, optionally requiring version 1 (DCE time-based, §4.3).
fn uuid_bytes(value: &AttributeValue, require_dce_time: bool) -> Option<[u8; 16]> {
    let AttributeValue::Text(s) = value else {
        return None;
    };
    let parsed = uuid::Uuid::parse_str(s).ok()?;
    if require_dce_time && parsed.get_version_num() != 1 {
        return None;
    }
    Some(*parsed.as_bytes())
}
