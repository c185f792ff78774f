//! Codec, schema registry, and transaction validator for the Beehive sync
//! server (§4.1–§4.3).
//!
//! This crate is pure domain logic: it knows how to encode/decode row
//! tuples, hold an in-memory per-context schema catalog, and validate a
//! header's changes against it. It does not know about TCP, storage
//! engines, or authentication — those live in `beehive-wire`,
//! `beehive-storage`, and `beehive-auth` respectively, all built on top of
//! the types exported here.

pub mod codec;
pub mod errors;
pub mod identifiers;
pub mod schema;
pub mod validator;

pub use codec::{AttributeRecord, AttributeValue, TupleEncoder};
pub use errors::{CodecError, SchemaError, ValidationCode};
pub use identifiers::{
    AttributeId, ChangeId, ContextId, DatasetId, EntityId, HeaderId, ModuleId, NodeId, NodeSeq,
    RoleId, TransactionId, UserId, Version,
};
pub use schema::{
    AttrType, Attribute, AttributeCheck, Entity, EntityTxView, Key, KeyType, Module, Role,
    SchemaRegistry, SchemaVersion, Transaction,
};
pub use validator::{validate_header, Change, ChangeOutcome, HeaderValidation, Operation, ValidatedChange};
