//! Leaf frame shapes for the `z` (fullSync) exchange (§4.9).
//!
//! These types frame the *bytes* of one sub-message; they don't decide how
//! many of them to read or loop, and they don't interpret `newPk`/`newData`
//! as attribute tuples — that's `beehive_core::codec`'s job, one layer up,
//! in `beehive-sync`. Each `read`/`write` pair here operates on an
//! already-open [`FrameReader`]/[`FrameWriter`] rather than opening and
//! closing its own frame, since these are sub-fields of a larger envelope
//! the caller frames (and CRCs) as a whole.
//!
//! Two assumptions not spelled out by the literal wire table, recorded
//! here rather than left implicit:
//! - A header frame's repeated `(changes)*` is prefixed with a u16 count.
//! - `operation` is encoded `0 = insert, 1 = update, 2 = delete`.

use crate::errors::WireError;
use crate::framer::{FrameReader, FrameWriter};
use uuid::Uuid;

/// Raw wire encoding of one `Change` (§3), before the validator resolves
/// entity/attribute names against a schema version.
#[derive(Debug, Clone)]
pub struct ChangeFrame {
    pub id_change: u16,
    /// `0 = insert, 1 = update, 2 = delete`.
    pub operation: u8,
    pub entity_name: String,
    /// Text-form encoded primary key tuple (u8-length-prefixed).
    pub new_pk: Vec<u8>,
    /// Text-form encoded prior primary key tuple (u8-length-prefixed).
    pub old_pk: Vec<u8>,
    /// Text-form encoded attribute tuple (u16-length-prefixed, ≤ 32 767 B).
    pub new_data: Vec<u8>,
    /// Text-form encoded prior attribute tuple (u16-length-prefixed).
    pub old_data: Vec<u8>,
}

impl ChangeFrame {
    pub fn read(r: &mut FrameReader<'_>) -> Result<Self, WireError> {
        let id_change = r.read_u16("idChange")?;
        let operation = r.read_u8("operation")?;
        let entity_name = r.read_string_u8("entityName")?;
        let new_pk_len = r.read_u8("newPkLen")? as usize;
        let new_pk = r.read_blob_exact(new_pk_len, "newPk")?;
        let old_pk_len = r.read_u8("oldPkLen")? as usize;
        let old_pk = r.read_blob_exact(old_pk_len, "oldPk")?;
        let new_data = r.read_blob_u16("newData")?;
        let old_data = r.read_blob_u16("oldData")?;
        Ok(Self {
            id_change,
            operation,
            entity_name,
            new_pk,
            old_pk,
            new_data,
            old_data,
        })
    }

    pub fn write(&self, w: &mut FrameWriter) -> Result<(), WireError> {
        w.write_u16(self.id_change);
        w.write_u8(self.operation);
        w.write_string_u8(&self.entity_name)?;
        if self.new_pk.len() > 255 {
            return Err(WireError::LengthExceeded {
                field: "newPk",
                len: self.new_pk.len(),
                cap: 255,
            });
        }
        w.write_u8(self.new_pk.len() as u8);
        w.write_blob_exact(&self.new_pk);
        if self.old_pk.len() > 255 {
            return Err(WireError::LengthExceeded {
                field: "oldPk",
                len: self.old_pk.len(),
                cap: 255,
            });
        }
        w.write_u8(self.old_pk.len() as u8);
        w.write_blob_exact(&self.old_pk);
        w.write_blob_u16(&self.new_data)?;
        w.write_blob_u16(&self.old_data)?;
        Ok(())
    }
}

fn read_changes(r: &mut FrameReader<'_>) -> Result<Vec<ChangeFrame>, WireError> {
    let count = r.read_u16("changeCount")?;
    (0..count).map(|_| ChangeFrame::read(r)).collect()
}

fn write_changes(w: &mut FrameWriter, changes: &[ChangeFrame]) -> Result<(), WireError> {
    w.write_u16(changes.len() as u16);
    for change in changes {
        change.write(w)?;
    }
    Ok(())
}

/// One uploaded `Header` (§4.9 Phase B `newGroupAvailable`).
#[derive(Debug, Clone)]
pub struct HeaderUpload {
    pub id_node: u32,
    pub transaction_name: String,
    pub version: u32,
    pub changes: Vec<ChangeFrame>,
}

impl HeaderUpload {
    pub fn read(r: &mut FrameReader<'_>) -> Result<Self, WireError> {
        let id_node = r.read_u32("idNode")?;
        let transaction_name = r.read_string_u8("transactionName")?;
        let version = r.read_u32("version")?;
        let changes = read_changes(r)?;
        Ok(Self {
            id_node,
            transaction_name,
            version,
            changes,
        })
    }

    pub fn write(&self, w: &mut FrameWriter) -> Result<(), WireError> {
        w.write_u32(self.id_node);
        w.write_string_u8(&self.transaction_name)?;
        w.write_u32(self.version);
        write_changes(w, &self.changes)
    }
}

/// Phase A: one dataset the client declares it knows about.
pub fn read_dataset_uuid(r: &mut FrameReader<'_>) -> Result<Uuid, WireError> {
    r.read_uuid_text("datasetUuid")
}

/// Phase B: `newContainerAvailable` upload announcing one dataset's cursor.
#[derive(Debug, Clone)]
pub struct DatasetUpload {
    pub dataset: Uuid,
    pub reported_id_header: u32,
    /// `2` means "create this dataset"; any other value requires the
    /// dataset to already exist (§4.9 Phase B).
    pub status: u8,
}

impl DatasetUpload {
    pub fn read(r: &mut FrameReader<'_>) -> Result<Self, WireError> {
        let dataset = r.read_uuid_text("dataset")?;
        let reported_id_header = r.read_u32("reportedIdHeader")?;
        let status = r.read_u8("status")?;
        Ok(Self {
            dataset,
            reported_id_header,
            status,
        })
    }

    pub fn write(&self, w: &mut FrameWriter) -> Result<(), WireError> {
        w.write_uuid_text(self.dataset);
        w.write_u32(self.reported_id_header);
        w.write_u8(self.status);
        Ok(())
    }
}

/// Phase B: one direct-invite tuple in a `newElementAvailable` sub-stream.
#[derive(Debug, Clone)]
pub struct InviteUpload {
    pub email: String,
    pub name: String,
    pub role_name: String,
}

impl InviteUpload {
    pub fn read(r: &mut FrameReader<'_>) -> Result<Self, WireError> {
        Ok(Self {
            email: r.read_string_u8("email")?,
            name: r.read_string_u8("name")?,
            role_name: r.read_string_u8("role")?,
        })
    }

    pub fn write(&self, w: &mut FrameWriter) -> Result<(), WireError> {
        w.write_string_u8(&self.email)?;
        w.write_string_u8(&self.name)?;
        w.write_string_u8(&self.role_name)
    }
}

/// Phase C(i): announce a dataset and its current head before streaming
/// its members/pushes/headers.
#[derive(Debug, Clone)]
pub struct ContainerAnnounce {
    pub dataset: Uuid,
    pub id_header: u32,
}

impl ContainerAnnounce {
    pub fn write(&self, w: &mut FrameWriter) {
        w.write_uuid_text(self.dataset);
        w.write_u32(self.id_header);
    }

    pub fn read(r: &mut FrameReader<'_>) -> Result<Self, WireError> {
        Ok(Self {
            dataset: r.read_uuid_text("dataset")?,
            id_header: r.read_u32("idHeader")?,
        })
    }
}

/// Phase C(ii): one member row.
#[derive(Debug, Clone)]
pub struct MemberAnnounce {
    pub user: Uuid,
    /// Falls back to `"Unknown"` server-side if the role no longer
    /// resolves against the current schema version.
    pub role_name: String,
    pub email: String,
    pub name: String,
    pub status: u8,
}

impl MemberAnnounce {
    pub fn write(&self, w: &mut FrameWriter) -> Result<(), WireError> {
        w.write_uuid_text(self.user);
        w.write_string_u8(&self.role_name)?;
        w.write_string_u8(&self.email)?;
        w.write_string_u8(&self.name)?;
        w.write_u8(self.status);
        Ok(())
    }

    pub fn read(r: &mut FrameReader<'_>) -> Result<Self, WireError> {
        Ok(Self {
            user: r.read_uuid_text("user")?,
            role_name: r.read_string_u8("role")?,
            email: r.read_string_u8("email")?,
            name: r.read_string_u8("name")?,
            status: r.read_u8("status")?,
        })
    }
}

/// Phase C(iii): one outstanding share token.
#[derive(Debug, Clone)]
pub struct PushAnnounce {
    pub uuid: String,
    pub role_name: String,
    pub until: i64,
    pub number: u32,
}

impl PushAnnounce {
    pub fn write(&self, w: &mut FrameWriter) -> Result<(), WireError> {
        w.write_string_u8(&self.uuid)?;
        w.write_string_u8(&self.role_name)?;
        w.write_u64(self.until as u64);
        w.write_u32(self.number);
        Ok(())
    }

    pub fn read(r: &mut FrameReader<'_>) -> Result<Self, WireError> {
        Ok(Self {
            uuid: r.read_string_u8("uuid")?,
            role_name: r.read_string_u8("role")?,
            until: r.read_u64("until")? as i64,
            number: r.read_u32("number")?,
        })
    }
}

/// Phase C(iv): one row of a first-sync full-entity snapshot. `oldPk`/
/// `oldData` are always empty for a snapshot row, so they're omitted here
/// rather than carried as dead weight.
#[derive(Debug, Clone)]
pub struct RowSnapshot {
    pub id_change: u16,
    pub entity_name: String,
    pub new_pk: Vec<u8>,
    pub new_data: Vec<u8>,
}

impl RowSnapshot {
    pub fn write(&self, w: &mut FrameWriter) -> Result<(), WireError> {
        w.write_u16(self.id_change);
        w.write_string_u8(&self.entity_name)?;
        if self.new_pk.len() > 255 {
            return Err(WireError::LengthExceeded {
                field: "newPk",
                len: self.new_pk.len(),
                cap: 255,
            });
        }
        w.write_u8(self.new_pk.len() as u8);
        w.write_blob_exact(&self.new_pk);
        w.write_blob_u16(&self.new_data)
    }

    pub fn read(r: &mut FrameReader<'_>) -> Result<Self, WireError> {
        let id_change = r.read_u16("idChange")?;
        let entity_name = r.read_string_u8("entityName")?;
        let new_pk_len = r.read_u8("newPkLen")? as usize;
        let new_pk = r.read_blob_exact(new_pk_len, "newPk")?;
        let new_data = r.read_blob_u16("newData")?;
        Ok(Self {
            id_change,
            entity_name,
            new_pk,
            new_data,
        })
    }
}

/// Phase C(v): one downloaded `Header`, either the caller's own (echoed
/// with its real status) or a peer's successful header (re-tagged
/// `approved` with `idNode = 0` and its changes visible-mask filtered).
#[derive(Debug, Clone)]
pub struct HeaderDownload {
    pub id_header: u32,
    pub id_node: u32,
    pub status: u16,
    pub transaction_name: String,
    pub version: u32,
    pub changes: Vec<ChangeFrame>,
}

impl HeaderDownload {
    pub fn write(&self, w: &mut FrameWriter) -> Result<(), WireError> {
        w.write_u32(self.id_header);
        w.write_u32(self.id_node);
        w.write_u16(self.status);
        w.write_string_u8(&self.transaction_name)?;
        w.write_u32(self.version);
        write_changes(w, &self.changes)
    }

    pub fn read(r: &mut FrameReader<'_>) -> Result<Self, WireError> {
        let id_header = r.read_u32("idHeader")?;
        let id_node = r.read_u32("idNode")?;
        let status = r.read_u16("status")?;
        let transaction_name = r.read_string_u8("transactionName")?;
        let version = r.read_u32("version")?;
        let changes = read_changes(r)?;
        Ok(Self {
            id_header,
            id_node,
            status,
            transaction_name,
            version,
            changes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_upload_round_trips_with_changes() {
        let upload = HeaderUpload {
            id_node: 5,
            transaction_name: "createItem".into(),
            version: 1,
            changes: vec![ChangeFrame {
                id_change: 1,
                operation: 0,
                entity_name: "Item".into(),
                new_pk: vec![1, 2, 3],
                old_pk: vec![],
                new_data: vec![4, 5, 6],
                old_data: vec![],
            }],
        };
        let mut w = FrameWriter::new();
        upload.write(&mut w).unwrap();
        let bytes = w.finish();
        // Strip the trailing CRC FrameWriter::finish appended; read_changes
        // doesn't expect a CRC of its own since it's a sub-field.
        let body = &bytes[..bytes.len() - 2];
        let mut r = FrameReader::new(body);
        let decoded = HeaderUpload::read(&mut r).unwrap();
        assert_eq!(decoded.id_node, 5);
        assert_eq!(decoded.changes.len(), 1);
        assert_eq!(decoded.changes[0].entity_name, "Item");
    }

    #[test]
    fn row_snapshot_round_trips() {
        let row = RowSnapshot {
            id_change: 9,
            entity_name: "Item".into(),
            new_pk: vec![9, 9],
            new_data: vec![1, 2, 3, 4],
        };
        let mut w = FrameWriter::new();
        row.write(&mut w).unwrap();
        let bytes = w.finish();
        let body = &bytes[..bytes.len() - 2];
        let mut r = FrameReader::new(body);
        let decoded = RowSnapshot::read(&mut r).unwrap();
        assert_eq!(decoded.id_change, 9);
        assert_eq!(decoded.new_data, vec![1, 2, 3, 4]);
    }
}
