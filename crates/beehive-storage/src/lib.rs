//! DAO contract, header-log storage engine, and row apply for the Beehive
//! sync server (§4.4, §4.5, §6.3).
//!
//! Everything here is built against the [`Dao`] trait rather than a
//! concrete store; [`MemoryDao`] is the only implementation shipped, since
//! real SQL persistence is explicitly out of scope (`spec.md` §1).

pub mod dao;
pub mod errors;
pub mod header_log;
pub mod hooks;
pub mod memory;
pub mod model;
pub mod row_apply;

pub use dao::{Dao, LockGuard, TxnId};
pub use errors::StorageError;
pub use header_log::{apply_header, HeaderInput};
pub use hooks::{HookContext, NoopHooks, ScriptHooks};
pub use memory::MemoryDao;
pub use model::{
    ChangeRecord, DatasetRecord, DatasetStatus, Downloaded, HeaderRecord, MemberRecord, MemberStatus,
    NodeRecord, PushRecord, UserRecord, UserType,
};
