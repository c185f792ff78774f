//! Header-log storage engine (§4.4): the two-phase apply path for one
//! incoming header, under the caller-held per-dataset exclusive lock (§5).

use crate::dao::Dao;
use crate::errors::StorageError;
use crate::hooks::{HookContext, ScriptHooks};
use crate::model::{ChangeRecord, HeaderRecord};
use crate::row_apply;
use beehive_core::{
    validate_header, Change, ChangeId, DatasetId, NodeId, NodeSeq, Role, SchemaVersion, ValidationCode,
    Version,
};

/// Everything needed to validate and apply one incoming header (§3 "Header").
pub struct HeaderInput {
    /// Dataset the header targets.
    pub dataset: DatasetId,
    /// Authoring node.
    pub node: NodeId,
    /// Client-side per-(dataset, node) sequence number (invariant I2).
    pub id_node: NodeSeq,
    /// Name of the transaction this header invokes.
    pub transaction_name: String,
    /// Schema version the author targeted.
    pub version: Version,
    /// Ordered, text-form changes as decoded off the wire.
    pub changes: Vec<Change>,
}

/// Run the full apply path for one header (§4.4):
///
/// 1. Allocate `idHeader`; the header is persisted with its validator
///    result as `status` regardless of outcome (invariant I3).
/// 2. If validation succeeded: run the optional pre-script, then apply each
///    change in order via [`row_apply::apply_change`]. `skipEntity` changes
///    are dropped without affecting `status`; any other failure rolls back
///    every row effect this header produced and short-circuits the rest.
/// 3. Run the optional post-script; a rejection downgrades a successful
///    apply to `userValidation` and rolls back.
/// 4. Persist the header and the advanced dataset counter.
///
/// The caller is responsible for holding the per-dataset lock (via
/// [`Dao::lock`]) for the duration of this call.
pub async fn apply_header(
    dao: &dyn Dao,
    schema: &SchemaVersion,
    role: &Role,
    hooks: &dyn ScriptHooks,
    input: HeaderInput,
) -> Result<HeaderRecord, StorageError> {
    let validation = validate_header(schema, role, &input.transaction_name, &input.changes);
    let id = dao.next_header_id(input.dataset).await?;
    let txn = dao.begin(input.dataset).await?;

    let ctx = HookContext {
        dataset: input.dataset,
        transaction_name: &input.transaction_name,
    };

    let mut status = validation.status;
    let mut change_records = Vec::with_capacity(validation.changes.len());

    if status == ValidationCode::Success {
        let transaction = schema.transaction_by_name(&input.transaction_name);
        let pre_ok = transaction
            .and_then(|t| t.pre_script.as_deref())
            .map(|name| hooks.run_pre(name, ctx))
            .unwrap_or(true);

        if !pre_ok {
            status = ValidationCode::UserValidation;
        } else {
            'apply: for (idx, outcome) in validation.changes.iter().enumerate() {
                let Some(validated) = &outcome.validated else {
                    // SkipEntity: dropped without persisting (§4.4 step 2b),
                    // status stays success, move on to the next change.
                    continue;
                };
                let applied = row_apply::apply_change(dao, input.dataset, validated).await?;
                change_records.push(ChangeRecord {
                    id_change: ChangeId(idx as u16),
                    entity: validated.entity,
                    operation: validated.operation,
                    new_pk: validated.new_pk.clone(),
                    new_data: validated.new_data.clone(),
                    old_pk: validated.old_pk.clone(),
                    status: applied,
                });
                if applied.short_circuits() {
                    status = applied;
                    break 'apply;
                }
            }

            if status == ValidationCode::Success {
                let post_ok = transaction
                    .and_then(|t| t.post_script.as_deref())
                    .map(|name| hooks.run_post(name, ctx))
                    .unwrap_or(true);
                if !post_ok {
                    status = ValidationCode::UserValidation;
                }
            }
        }
    }

    if status == ValidationCode::Success {
        dao.commit(txn).await?;
    } else {
        dao.rollback(txn).await?;
    }

    let record = HeaderRecord {
        id,
        dataset: input.dataset,
        node: input.node,
        id_node: input.id_node,
        transaction_name: input.transaction_name,
        version: input.version,
        status,
        changes: change_records,
    };
    dao.save_header(record.clone()).await?;
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryDao;
    use crate::model::DatasetRecord;
    use beehive_core::{
        AttrType, Attribute, AttributeCheck, AttributeValue, DatasetId as Did, Entity, EntityId,
        EntityTxView, Key, KeyType, Operation as Op, RoleId, SchemaRegistry, Transaction, TransactionId,
    };

    fn schema_for_insert_only() -> (SchemaVersion, Role, TransactionId) {
        let entity = Entity {
            id: EntityId::new(),
            name: "Item".into(),
            keys: vec![Key {
                id: beehive_core::AttributeId(1),
                name: "id".into(),
                ty: KeyType::Integer,
            }],
            attributes: vec![Attribute {
                id: beehive_core::AttributeId(2),
                name: "label".into(),
                ty: AttrType::Text,
                notnull: false,
                check: AttributeCheck::Always,
            }],
        };
        let tx_id = TransactionId::new();
        let mut touches = std::collections::HashMap::new();
        touches.insert(
            entity.id,
            EntityTxView {
                add: true,
                remove: false,
                update_ids: Default::default(),
            },
        );
        let transaction = Transaction {
            id: tx_id,
            name: "Create".into(),
            touches,
            pre_script: None,
            post_script: None,
        };
        let role_id = RoleId::new();
        let mut role = Role {
            id: role_id,
            name: "Writer".into(),
            ..Default::default()
        };
        role.allowed_transactions.insert(tx_id);
        let schema = SchemaVersion::new(beehive_core::Version(1), vec![entity], vec![transaction], vec![role], vec![]).unwrap();
        let role = schema.role(role_id).unwrap().clone();
        (schema, role, tx_id)
    }

    #[tokio::test]
    async fn successful_header_commits_and_allocates_dense_ids() {
        let dao = MemoryDao::new();
        let (schema, role, _tx) = schema_for_insert_only();
        let dataset = Did::new();
        dao.save_dataset(DatasetRecord {
            id: dataset,
            context: beehive_core::ContextId::new(),
            owner: beehive_core::UserId::new(),
            id_header: beehive_core::HeaderId(0),
            status: crate::model::DatasetStatus::Active,
        })
        .await
        .unwrap();

        let input = HeaderInput {
            dataset,
            node: NodeId::new(),
            id_node: NodeSeq(1),
            transaction_name: "Create".into(),
            version: Version(1),
            changes: vec![Change {
                entity_name: "Item".into(),
                operation: Op::Insert,
                new_pk: vec![(1, AttributeValue::Integer(1))],
                new_data: vec![],
                old_pk: vec![],
            }],
        };
        let record = apply_header(&dao, &schema, &role, &crate::hooks::NoopHooks, input).await.unwrap();
        assert_eq!(record.status, ValidationCode::Success);
        assert_eq!(record.id, beehive_core::HeaderId(1));

        let headers = dao.read_headers_after(dataset, beehive_core::HeaderId(0)).await.unwrap();
        assert_eq!(headers.len(), 1);
    }

    #[tokio::test]
    async fn failed_header_is_persisted_with_failure_status_and_rolled_back() {
        let dao = MemoryDao::new();
        let (schema, role, _tx) = schema_for_insert_only();
        let dataset = Did::new();

        let input = HeaderInput {
            dataset,
            node: NodeId::new(),
            id_node: NodeSeq(1),
            transaction_name: "Create".into(),
            version: Version(1),
            changes: vec![Change {
                entity_name: "Item".into(),
                operation: Op::Insert,
                new_pk: vec![], // missing the declared key -> notValidIncomeData
                new_data: vec![],
                old_pk: vec![],
            }],
        };
        let record = apply_header(&dao, &schema, &role, &crate::hooks::NoopHooks, input).await.unwrap();
        assert_eq!(record.status, ValidationCode::NotValidIncomeData);

        // The header id is still allocated and recorded even on failure.
        let headers = dao.read_headers_after(dataset, beehive_core::HeaderId(0)).await.unwrap();
        assert_eq!(headers.len(), 1);
        assert_eq!(headers[0].status, ValidationCode::NotValidIncomeData);
    }

    #[test]
    fn registry_smoke() {
        let registry = SchemaRegistry::new();
        assert_eq!(registry.current_version(), 0);
    }
}
