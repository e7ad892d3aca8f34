//! Typed operations on management API resources.
//!
//! Every path carries its own API version; versions differ per call and are
//! kept exactly as the cluster expects them.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::session::{Action, Session, SuccessCodes};

const SNAPSHOTS_PATH: &str = "/platform/1/snapshot/snapshots";
const JOBS_PATH: &str = "/platform/7/job/jobs";
const CHANGELISTS_PATH: &str = "/platform/3/snapshot/changelists";
const OPENFILES_PATH: &str = "/platform/1/protocols/smb/openfiles";
const QUOTAS_PATH: &str = "/platform/15/quota/quotas";

fn locks_path(snapshot_id: u64) -> String {
    format!("/platform/12/snapshot/snapshots/{snapshot_id}/locks")
}

fn changelist_entries_path(changelist_id: &str) -> String {
    format!("/platform/10/snapshot/changelists/{changelist_id}/entries")
}

fn changelist_path(changelist_id: &str) -> String {
    format!("/platform/1/snapshot/changelists/{changelist_id}")
}

fn openfile_path(file_id: u64) -> String {
    format!("{OPENFILES_PATH}/{file_id}")
}

/// Path of a job's status resource.
#[must_use]
pub fn job_status_path(job_id: u64) -> String {
    format!("{JOBS_PATH}/{job_id}")
}

/// A point-in-time snapshot.
///
/// The listing only says whether locks exist; the exact number comes from
/// [`LockManager::count`](crate::locks::LockManager::count).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Snapshot id.
    pub id: u64,
    /// Snapshot name.
    #[serde(default)]
    pub name: String,
    /// Filesystem path the snapshot covers.
    #[serde(default)]
    pub path: String,
    /// Size in bytes.
    #[serde(default)]
    pub size: u64,
    /// Whether any lock is held.
    #[serde(default)]
    pub has_locks: bool,
}

#[derive(Deserialize)]
struct SnapshotList {
    #[serde(default)]
    snapshots: Vec<Snapshot>,
}

/// Request body for snapshot creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewSnapshot {
    /// Path to snapshot.
    pub path: String,
    /// Optional custom name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Optional expiry as epoch seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires: Option<i64>,
}

#[derive(Deserialize)]
struct Created {
    id: u64,
}

/// A lock held on a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotLock {
    /// Lock id, scoped to its snapshot.
    pub id: u64,
    /// Expiry as epoch seconds; `None` never expires.
    #[serde(default)]
    pub expires: Option<i64>,
    /// Free-form comment.
    #[serde(default)]
    pub comment: String,
    /// Reference count.
    #[serde(default)]
    pub count: u64,
}

/// Locks on one snapshot plus the cluster's total.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct LockList {
    /// Individual locks.
    #[serde(default)]
    pub locks: Vec<SnapshotLock>,
    /// Number of locks currently held.
    #[serde(default)]
    pub total: u64,
}

/// Request body for lock creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewLock {
    /// Comment recorded on the lock.
    pub comment: String,
    /// Expiry as epoch seconds; omitted for a lock that never expires.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires: Option<i64>,
}

/// One entry of a job status response.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct JobStatusEntry {
    /// Job id.
    #[serde(default)]
    pub id: Option<u64>,
    /// Raw state string.
    #[serde(default)]
    pub state: String,
}

#[derive(Deserialize)]
struct JobStatusList {
    #[serde(default)]
    jobs: Vec<JobStatusEntry>,
}

/// A changelist between two snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeList {
    /// Changelist id (`<older>_<newer>`).
    pub id: String,
    /// Job that produced it.
    #[serde(default)]
    pub job_id: Option<u64>,
    /// Root path compared.
    #[serde(default)]
    pub root_path: String,
    /// Number of entries.
    #[serde(default)]
    pub num_entries: u64,
}

#[derive(Deserialize)]
struct ChangeListList {
    #[serde(default)]
    changelists: Vec<ChangeList>,
}

/// One changed path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeListEntry {
    /// Path that changed.
    #[serde(default)]
    pub path: String,
    /// Logical size.
    #[serde(default)]
    pub size: u64,
    /// Physical size.
    #[serde(default)]
    pub physical_size: u64,
    /// Kinds of change.
    #[serde(default)]
    pub change_types: Vec<String>,
}

#[derive(Deserialize)]
struct ChangeListEntries {
    #[serde(default)]
    entries: Vec<ChangeListEntry>,
}

/// A file held open over SMB.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenFile {
    /// Id, unique only within the host that reported it.
    pub id: u64,
    /// Path of the open file.
    #[serde(default)]
    pub file: String,
    /// Client user holding the handle.
    #[serde(default)]
    pub user: Option<String>,
    /// Number of locks on the handle.
    #[serde(default)]
    pub locks: u64,
    /// Access granted to the handle.
    #[serde(default)]
    pub permissions: Vec<String>,
}

#[derive(Deserialize)]
struct OpenFileList {
    #[serde(default)]
    openfiles: Vec<OpenFile>,
}

/// Usage counters of a quota, in bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaUsage {
    /// Physical usage.
    #[serde(default)]
    pub fsphysical: u64,
    /// Logical usage.
    #[serde(default)]
    pub fslogical: u64,
    /// Application logical usage.
    #[serde(default)]
    pub applogical: u64,
}

/// A directory quota.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quota {
    /// Path the quota applies to.
    #[serde(default)]
    pub path: String,
    /// Description.
    #[serde(default)]
    pub description: Option<String>,
    /// Usage counters.
    #[serde(default)]
    pub usage: QuotaUsage,
}

#[derive(Deserialize)]
struct QuotaList {
    #[serde(default)]
    quotas: Vec<Quota>,
}

/// Resource operations over one session.
#[derive(Debug, Clone, Copy)]
pub struct ResourceClient<'a> {
    session: &'a Session,
}

impl<'a> ResourceClient<'a> {
    /// Wraps a session.
    #[must_use]
    pub const fn new(session: &'a Session) -> Self {
        Self { session }
    }

    /// Lists all snapshots.
    pub async fn list_snapshots(&self) -> Result<Vec<Snapshot>> {
        let list: SnapshotList = self
            .session
            .get(SNAPSHOTS_PATH, Action::Query, SuccessCodes::OK_OR_CREATED)
            .await?;
        Ok(list.snapshots)
    }

    /// Creates a snapshot and returns its id.
    pub async fn create_snapshot(&self, snapshot: &NewSnapshot) -> Result<u64> {
        let created: Created = self
            .session
            .post(
                SNAPSHOTS_PATH,
                snapshot,
                Action::Create,
                SuccessCodes::OK_OR_CREATED,
            )
            .await?;
        Ok(created.id)
    }

    /// Lists the locks on a snapshot.
    pub async fn list_locks(&self, snapshot_id: u64) -> Result<LockList> {
        self.session
            .get(
                &locks_path(snapshot_id),
                Action::Query,
                SuccessCodes::OK_OR_CREATED,
            )
            .await
    }

    /// Creates a lock and returns its id.
    pub async fn create_lock(&self, snapshot_id: u64, lock: &NewLock) -> Result<u64> {
        let created: Created = self
            .session
            .post(
                &locks_path(snapshot_id),
                lock,
                Action::Create,
                SuccessCodes::OK_OR_CREATED,
            )
            .await?;
        Ok(created.id)
    }

    /// Deletes one lock.
    pub async fn delete_lock(&self, snapshot_id: u64, lock_id: u64) -> Result<()> {
        let path = format!("{}/{lock_id}", locks_path(snapshot_id));
        self.session
            .delete(&path, SuccessCodes::OK_OR_NO_CONTENT)
            .await
    }

    /// Deletes every lock on a snapshot.
    pub async fn delete_all_locks(&self, snapshot_id: u64) -> Result<()> {
        self.session
            .delete(&locks_path(snapshot_id), SuccessCodes::OK_OR_NO_CONTENT)
            .await
    }

    /// Submits a job description and returns the job id.
    pub async fn submit_job<B: Serialize + ?Sized>(&self, job: &B) -> Result<u64> {
        let created: Created = self
            .session
            .post(JOBS_PATH, job, Action::Submit, SuccessCodes::OK_OR_CREATED)
            .await?;
        Ok(created.id)
    }

    /// Reads a job's status entries.
    pub async fn job_status(&self, job_id: u64) -> Result<Vec<JobStatusEntry>> {
        let list: JobStatusList = self
            .session
            .get(
                &job_status_path(job_id),
                Action::Poll,
                SuccessCodes::OK_OR_CREATED,
            )
            .await?;
        Ok(list.jobs)
    }

    /// Lists changelists.
    pub async fn list_changelists(&self) -> Result<Vec<ChangeList>> {
        let list: ChangeListList = self
            .session
            .get(CHANGELISTS_PATH, Action::Query, SuccessCodes::OK_OR_CREATED)
            .await?;
        Ok(list.changelists)
    }

    /// Reads a changelist's entries.
    pub async fn changelist_entries(&self, changelist_id: &str) -> Result<Vec<ChangeListEntry>> {
        let list: ChangeListEntries = self
            .session
            .get(
                &changelist_entries_path(changelist_id),
                Action::Query,
                SuccessCodes::OK_OR_CREATED,
            )
            .await?;
        Ok(list.entries)
    }

    /// Deletes a changelist.
    pub async fn delete_changelist(&self, changelist_id: &str) -> Result<()> {
        self.session
            .delete(&changelist_path(changelist_id), SuccessCodes::NO_CONTENT)
            .await
    }

    /// Lists files held open over SMB on this host.
    pub async fn list_open_files(&self) -> Result<Vec<OpenFile>> {
        let list: OpenFileList = self
            .session
            .get(OPENFILES_PATH, Action::Query, SuccessCodes::OK_OR_CREATED)
            .await?;
        Ok(list.openfiles)
    }

    /// Force-closes an open file, breaking its locks.
    pub async fn close_open_file(&self, file_id: u64) -> Result<()> {
        self.session
            .delete(&openfile_path(file_id), SuccessCodes::NO_CONTENT)
            .await
    }

    /// Lists quotas.
    pub async fn list_quotas(&self) -> Result<Vec<Quota>> {
        let list: QuotaList = self
            .session
            .get(QUOTAS_PATH, Action::Query, SuccessCodes::OK_OR_CREATED)
            .await?;
        Ok(list.quotas)
    }
}
