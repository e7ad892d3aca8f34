//! Output formatting for CLI commands.
//!
//! Supports table (human-readable) and JSON output formats.

use std::io::Write;

use chrono::DateTime;
use isi_api::{
    ChangeList, ChangeListEntry, HostFailure, HostedOpenFile, JobOutcome, MAX_LOCKS_PER_SNAPSHOT,
    Quota, SearchReport, Snapshot, SnapshotLock,
};
use serde::Serialize;

use crate::cli::{Format, SizeUnit};
use crate::error::CliError;

/// Output formatter that handles both table and JSON output.
#[derive(Debug, Clone)]
pub struct OutputFormat {
    format: Format,
}

impl OutputFormat {
    /// Create a new output formatter.
    #[must_use]
    pub const fn new(format: Format) -> Self {
        Self { format }
    }

    /// Write a serializable value to the output.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn write<W, T>(&self, writer: &mut W, value: &T) -> Result<(), CliError>
    where
        W: Write,
        T: Serialize + TableDisplay,
    {
        match self.format {
            Format::Json => {
                serde_json::to_writer_pretty(&mut *writer, value)
                    .map_err(|e| CliError::Format(format!("JSON serialization failed: {e}")))?;
                writeln!(writer)?;
            }
            Format::Table => {
                value.write_table(writer)?;
            }
        }
        Ok(())
    }

    /// Write a serializable value to a string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_string<T>(&self, value: &T) -> Result<String, CliError>
    where
        T: Serialize + TableDisplay,
    {
        let mut buf = Vec::new();
        self.write(&mut buf, value)?;
        String::from_utf8(buf).map_err(|e| CliError::Format(format!("UTF-8 error: {e}")))
    }
}

impl Default for OutputFormat {
    fn default() -> Self {
        Self::new(Format::Table)
    }
}

/// Trait for types that can be displayed as a table.
pub trait TableDisplay {
    /// Write the value as a human-readable table.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError>;
}

/// Snapshots on a cluster.
#[derive(Debug, Clone, Serialize)]
pub struct SnapshotTable {
    /// Snapshots as reported.
    pub snapshots: Vec<Snapshot>,
}

impl TableDisplay for SnapshotTable {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        if self.snapshots.is_empty() {
            writeln!(writer, "There are no snapshots")?;
            return Ok(());
        }

        writeln!(
            writer,
            "{:>8}  {:<28}  {:<36}  {:>14}  {:<5}",
            "ID", "NAME", "PATH", "SIZE", "LOCKS"
        )?;
        writeln!(writer, "{}", "─".repeat(99))?;
        for snap in &self.snapshots {
            writeln!(
                writer,
                "{:>8}  {:<28}  {:<36}  {:>14}  {:<5}",
                snap.id,
                truncate(&snap.name, 28),
                truncate(&snap.path, 36),
                snap.size,
                if snap.has_locks { "yes" } else { "no" }
            )?;
        }

        writeln!(writer)?;
        writeln!(writer, "Total: {} snapshot(s)", self.snapshots.len())?;
        Ok(())
    }
}

/// Locks held on one snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct LockTable {
    /// Snapshot the locks belong to.
    pub snapshot_id: u64,
    /// Locks as reported.
    pub locks: Vec<SnapshotLock>,
}

impl TableDisplay for LockTable {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        if self.locks.is_empty() {
            writeln!(writer, "There are no locks on snapshot {}", self.snapshot_id)?;
            return Ok(());
        }

        writeln!(writer, "Locks on snapshot {}", self.snapshot_id)?;
        writeln!(
            writer,
            "{:>6}  {:<19}  {:>5}  {:<40}",
            "ID", "EXPIRES (GMT)", "COUNT", "COMMENT"
        )?;
        writeln!(writer, "{}", "─".repeat(76))?;
        for lock in &self.locks {
            writeln!(
                writer,
                "{:>6}  {:<19}  {:>5}  {:<40}",
                lock.id,
                format_expiry(lock.expires),
                lock.count,
                truncate(&lock.comment, 40)
            )?;
        }
        writeln!(writer)?;
        writeln!(
            writer,
            "Total: {} of {MAX_LOCKS_PER_SNAPSHOT} lock(s)",
            self.locks.len()
        )?;
        Ok(())
    }
}

/// Outcome of locking one snapshot in a batch.
#[derive(Debug, Clone, Serialize)]
pub struct BatchLockEntry {
    /// Snapshot locked.
    pub snapshot_id: u64,
    /// New lock id on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lock_id: Option<u64>,
    /// Lock slots left after this lock.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining: Option<u64>,
    /// Failure reason.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Outcome of a batch lock run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchLockReport {
    /// Per-snapshot results, in request order.
    pub results: Vec<BatchLockEntry>,
}

impl BatchLockReport {
    /// Number of snapshots that could not be locked.
    #[must_use]
    pub fn failures(&self) -> usize {
        self.results.iter().filter(|r| r.error.is_some()).count()
    }
}

impl TableDisplay for BatchLockReport {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        for entry in &self.results {
            match (&entry.error, entry.lock_id) {
                (Some(reason), _) => {
                    writeln!(writer, "✗ snapshot {}: {reason}", entry.snapshot_id)?;
                }
                (None, Some(lock_id)) => writeln!(
                    writer,
                    "✓ snapshot {}: lock {lock_id} created, {} more allowed",
                    entry.snapshot_id,
                    entry.remaining.unwrap_or_default()
                )?,
                (None, None) => writeln!(writer, "? snapshot {}", entry.snapshot_id)?,
            }
        }
        writeln!(writer)?;
        writeln!(
            writer,
            "Locked {} of {} snapshot(s)",
            self.results.len() - self.failures(),
            self.results.len()
        )?;
        Ok(())
    }
}

/// Changelists on a cluster.
#[derive(Debug, Clone, Serialize)]
pub struct ChangeListTable {
    /// Changelists as reported.
    pub changelists: Vec<ChangeList>,
}

impl TableDisplay for ChangeListTable {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        if self.changelists.is_empty() {
            writeln!(writer, "There are no changelists")?;
            return Ok(());
        }

        writeln!(
            writer,
            "{:<16}  {:>8}  {:<36}  {:>10}",
            "ID", "JOB", "ROOT PATH", "ENTRIES"
        )?;
        writeln!(writer, "{}", "─".repeat(76))?;
        for list in &self.changelists {
            writeln!(
                writer,
                "{:<16}  {:>8}  {:<36}  {:>10}",
                list.id,
                list.job_id.map_or_else(|| "-".to_owned(), |id| id.to_string()),
                truncate(&list.root_path, 36),
                list.num_entries
            )?;
        }
        Ok(())
    }
}

/// Entries of one changelist.
#[derive(Debug, Clone, Serialize)]
pub struct ChangeListEntryTable {
    /// Changelist id.
    pub changelist_id: String,
    /// Changed paths.
    pub entries: Vec<ChangeListEntry>,
}

impl TableDisplay for ChangeListEntryTable {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        if self.entries.is_empty() {
            writeln!(writer, "Changelist {} has no entries", self.changelist_id)?;
            return Ok(());
        }

        writeln!(writer, "Changelist {}", self.changelist_id)?;
        writeln!(
            writer,
            "{:<48}  {:>12}  {:>12}  {:<20}",
            "PATH", "SIZE", "PHYSICAL", "CHANGE"
        )?;
        writeln!(writer, "{}", "─".repeat(98))?;
        for entry in &self.entries {
            writeln!(
                writer,
                "{:<48}  {:>12}  {:>12}  {:<20}",
                truncate(&entry.path, 48),
                entry.size,
                entry.physical_size,
                entry.change_types.join(",")
            )?;
        }
        Ok(())
    }
}

/// One quota with usage converted to the report unit.
#[derive(Debug, Clone, Serialize)]
pub struct QuotaRow {
    /// Quota path.
    pub path: String,
    /// Description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Physical usage.
    pub physical: f64,
    /// Logical usage.
    pub logical: f64,
    /// Application logical usage.
    pub app_logical: f64,
}

/// Quota usage report.
#[derive(Debug, Clone, Serialize)]
pub struct QuotaReport {
    /// Unit the usage figures are expressed in.
    pub unit: &'static str,
    /// Quotas.
    pub quotas: Vec<QuotaRow>,
}

impl QuotaReport {
    /// Converts raw byte counters into `unit`, rounded to two decimals.
    #[must_use]
    pub fn new(quotas: Vec<Quota>, unit: SizeUnit) -> Self {
        let convert = |bytes: u64| {
            let value = bytes as f64 / unit.divisor() as f64;
            (value * 100.0).round() / 100.0
        };
        Self {
            unit: unit.label(),
            quotas: quotas
                .into_iter()
                .map(|q| QuotaRow {
                    physical: convert(q.usage.fsphysical),
                    logical: convert(q.usage.fslogical),
                    app_logical: convert(q.usage.applogical),
                    path: q.path,
                    description: q.description,
                })
                .collect(),
        }
    }
}

impl TableDisplay for QuotaReport {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        if self.quotas.is_empty() {
            writeln!(writer, "There are no quotas")?;
            return Ok(());
        }

        let unit = self.unit;
        writeln!(
            writer,
            "{:<40}  {:>14}  {:>14}  {:>14}  {:<24}",
            "PATH",
            format!("PHYSICAL ({unit})"),
            format!("LOGICAL ({unit})"),
            format!("APP ({unit})"),
            "DESCRIPTION"
        )?;
        writeln!(writer, "{}", "─".repeat(114))?;
        for quota in &self.quotas {
            writeln!(
                writer,
                "{:<40}  {:>14.2}  {:>14.2}  {:>14.2}  {:<24}",
                truncate(&quota.path, 40),
                quota.physical,
                quota.logical,
                quota.app_logical,
                truncate(quota.description.as_deref().unwrap_or(""), 24)
            )?;
        }
        Ok(())
    }
}

/// Open files matched across hosts.
#[derive(Debug, Clone, Serialize)]
pub struct OpenFileTable {
    /// Matches, tagged with the host that reported them.
    pub files: Vec<HostedOpenFile>,
    /// Hosts that could not be queried.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<HostFailure>,
}

impl From<&SearchReport> for OpenFileTable {
    fn from(report: &SearchReport) -> Self {
        Self {
            files: report.index.entries().to_vec(),
            skipped: report.skipped.clone(),
        }
    }
}

impl TableDisplay for OpenFileTable {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        for failure in &self.skipped {
            writeln!(writer, "! skipped {}: {}", failure.host, failure.reason)?;
        }
        if self.files.is_empty() {
            writeln!(writer, "No matching open files")?;
            return Ok(());
        }

        writeln!(
            writer,
            "{:>10}  {:<15}  {:<16}  {:>5}  {:<48}",
            "ID", "HOST", "USER", "LOCKS", "FILE"
        )?;
        writeln!(writer, "{}", "─".repeat(102))?;
        for entry in &self.files {
            writeln!(
                writer,
                "{:>10}  {:<15}  {:<16}  {:>5}  {:<48}",
                entry.file.id,
                entry.host,
                truncate(entry.file.user.as_deref().unwrap_or("-"), 16),
                entry.file.locks,
                entry.file.file
            )?;
        }

        writeln!(writer)?;
        writeln!(writer, "Total: {} open file(s)", self.files.len())?;
        Ok(())
    }
}

/// Result of a submitted job.
#[derive(Debug, Clone, Serialize)]
pub struct JobSummary {
    /// Job id.
    pub job_id: u64,
    /// `succeeded`, the terminal failure state, or `timed_out`.
    pub status: String,
    /// Where to check the job by hand after a timeout.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_url: Option<String>,
}

impl From<&JobOutcome> for JobSummary {
    fn from(outcome: &JobOutcome) -> Self {
        match outcome {
            JobOutcome::Succeeded { job_id } => Self {
                job_id: *job_id,
                status: "succeeded".to_owned(),
                status_url: None,
            },
            JobOutcome::Failed { job_id, state } => Self {
                job_id: *job_id,
                status: state.to_string(),
                status_url: None,
            },
            JobOutcome::TimedOut {
                job_id,
                status_url,
                ..
            } => Self {
                job_id: *job_id,
                status: "timed_out".to_owned(),
                status_url: Some(status_url.clone()),
            },
        }
    }
}

impl TableDisplay for JobSummary {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        match (self.status.as_str(), &self.status_url) {
            ("succeeded", _) => writeln!(writer, "✓ Job {} succeeded", self.job_id)?,
            (_, Some(url)) => {
                writeln!(writer, "Job {} is still running.", self.job_id)?;
                writeln!(writer, "Check its status at {url}")?;
            }
            (state, None) => writeln!(writer, "✗ Job {} ended as {state}", self.job_id)?,
        }
        Ok(())
    }
}

/// Simple message output.
#[derive(Debug, Clone, Serialize)]
pub struct Message {
    /// Message text.
    pub message: String,
    /// Whether this is a success message.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub success: bool,
}

impl Message {
    /// Create a success message.
    #[must_use]
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            success: true,
        }
    }

    /// Create an informational message.
    #[must_use]
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            success: false,
        }
    }
}

impl TableDisplay for Message {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        if self.success {
            writeln!(writer, "✓ {}", self.message)?;
        } else {
            writeln!(writer, "{}", self.message)?;
        }
        Ok(())
    }
}

fn format_expiry(expires: Option<i64>) -> String {
    match expires.and_then(|secs| DateTime::from_timestamp(secs, 0)) {
        Some(at) => at.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => "never".to_owned(),
    }
}

/// Truncate a string to a maximum number of characters.
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_owned()
    } else if max_len > 3 {
        let head: String = s.chars().take(max_len - 3).collect();
        format!("{head}...")
    } else {
        s.chars().take(max_len).collect()
    }
}
