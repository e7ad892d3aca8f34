//! Multi-host open-file search and single-target lock break.
//!
//! Open-file ids are only unique within the host that reports them. The
//! merged [`OpenFileIndex`] therefore keys every record by `(id, host)`, and
//! resolution refuses to guess when an id appears on more than one host.
//!
//! ```text
//! "10.0.0.5,10.0.0.9-11" ──expand──► [h1, h2, h3, h4]
//!        for each host (in order): open session ─► list open files ─► filter ─► stamp host
//!                                                     └─ query failure: skip host, keep going
//! index ──resolve(id, host?)──► confirm (y/yes) ──► open session on that host ─► DELETE
//! ```

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::resources::{OpenFile, ResourceClient};
use crate::session::SessionOpener;

/// Expands a host-range specification into an ordered host list.
///
/// Tokens are comma-separated. A token containing `-` is `a.b.c.x-<end>`:
/// the last octet sweeps from `x` to the last dotted segment of `<end>`
/// inclusive, keeping `a.b.c`. Other tokens are taken literally.
pub fn expand_hosts(spec: &str) -> Result<Vec<String>> {
    let mut hosts = Vec::new();
    for token in spec.split(',').map(str::trim) {
        if token.is_empty() {
            return Err(Error::validation(format!("empty host in '{spec}'")));
        }
        let Some((start, end)) = token.split_once('-') else {
            hosts.push(token.to_owned());
            continue;
        };

        let (prefix, first) = start
            .rsplit_once('.')
            .ok_or_else(|| Error::validation(format!("range '{token}' needs a dotted start address")))?;
        let first = octet(first, token)?;
        let last = octet(end.rsplit('.').next().unwrap_or(end), token)?;
        if last < first {
            return Err(Error::validation(format!(
                "range '{token}' ends before it starts"
            )));
        }
        hosts.extend((first..=last).map(|n| format!("{prefix}.{n}")));
    }
    Ok(hosts)
}

fn octet(segment: &str, token: &str) -> Result<u8> {
    segment
        .trim()
        .parse()
        .map_err(|_| Error::validation(format!("'{segment}' in range '{token}' is not an octet")))
}

/// An open file together with the host that reported it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostedOpenFile {
    /// Host the record came from.
    pub host: String,
    /// The record.
    #[serde(flatten)]
    pub file: OpenFile,
}

/// Which record to act on. The host is needed when the id is shared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    /// Chosen record id.
    pub id: u64,
    /// Host the record must come from.
    pub host: Option<String>,
}

impl Selection {
    /// Selects by id only.
    #[must_use]
    pub const fn id(id: u64) -> Self {
        Self { id, host: None }
    }

    /// Selects by id on a specific host.
    pub fn on_host(id: u64, host: impl Into<String>) -> Self {
        Self {
            id,
            host: Some(host.into()),
        }
    }
}

/// Open files merged across hosts, addressed by `(id, host)`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct OpenFileIndex {
    entries: Vec<HostedOpenFile>,
}

impl OpenFileIndex {
    /// Creates an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a record from `host`.
    pub fn push(&mut self, host: &str, file: OpenFile) {
        self.entries.push(HostedOpenFile {
            host: host.to_owned(),
            file,
        });
    }

    /// All records, in discovery order.
    #[must_use]
    pub fn entries(&self) -> &[HostedOpenFile] {
        &self.entries
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing matched.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Hosts reporting `id`, in discovery order.
    #[must_use]
    pub fn hosts_for(&self, id: u64) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|e| e.file.id == id)
            .map(|e| e.host.as_str())
            .collect()
    }

    /// Finds the single record a selection refers to.
    ///
    /// # Errors
    ///
    /// - [`Error::NotFound`] if no record has the id (on the pinned host)
    /// - [`Error::Ambiguous`] if the id is on several hosts and none is pinned
    pub fn resolve(&self, selection: &Selection) -> Result<&HostedOpenFile> {
        let mut matches = self.entries.iter().filter(|e| e.file.id == selection.id);

        if let Some(host) = &selection.host {
            return matches.find(|e| &e.host == host).ok_or_else(|| Error::NotFound {
                id: selection.id,
                host: Some(host.clone()),
            });
        }

        let first = matches.next().ok_or(Error::NotFound {
            id: selection.id,
            host: None,
        })?;
        if matches.next().is_some() {
            return Err(Error::Ambiguous {
                id: selection.id,
                hosts: self
                    .hosts_for(selection.id)
                    .into_iter()
                    .map(str::to_owned)
                    .collect(),
            });
        }
        Ok(first)
    }
}

/// A host whose query failed during a search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostFailure {
    /// The host.
    pub host: String,
    /// What went wrong.
    pub reason: String,
}

/// Outcome of a multi-host search.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SearchReport {
    /// Matching records from every host that answered.
    pub index: OpenFileIndex,
    /// Hosts whose contribution was dropped.
    pub skipped: Vec<HostFailure>,
}

/// Searches every host, in order, for open files whose path contains
/// `filter` (case-sensitive substring).
///
/// A host whose open-file query fails is skipped with a warning. Failing to
/// open a session is fatal and ends the search.
pub async fn search<O: SessionOpener>(
    opener: &O,
    hosts: &[String],
    filter: &str,
) -> Result<SearchReport> {
    if filter.is_empty() {
        return Err(Error::validation("file name filter cannot be empty"));
    }

    let mut report = SearchReport::default();
    for host in hosts {
        let session = opener.open(host).await?;
        match ResourceClient::new(&session).list_open_files().await {
            Ok(files) => {
                let before = report.index.len();
                for file in files.into_iter().filter(|f| f.file.contains(filter)) {
                    report.index.push(host, file);
                }
                debug!(host = %host, matched = report.index.len() - before, "host searched");
            }
            Err(e) => {
                warn!(host = %host, error = %e, "open file query failed, skipping host");
                report.skipped.push(HostFailure {
                    host: host.clone(),
                    reason: e.to_string(),
                });
            }
        }
    }
    Ok(report)
}

/// Operator answer to a destructive-action prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    /// Proceed.
    Yes,
    /// Decline.
    No,
}

impl FromStr for Confirmation {
    type Err = Error;

    /// Strict comparison: anything but `y`/`yes`/`n`/`no` is invalid.
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "y" | "yes" => Ok(Self::Yes),
            "n" | "no" => Ok(Self::No),
            other => Err(Error::validation(format!(
                "'{other}' is not a valid answer; expected y or n"
            ))),
        }
    }
}

impl fmt::Display for Confirmation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Yes => write!(f, "yes"),
            Self::No => write!(f, "no"),
        }
    }
}

/// Resolves `selection` inside `index`, checks the operator's answer, then
/// closes the file on the host it came from.
///
/// Nothing is sent to any host unless the selection resolves to exactly one
/// record and the answer is affirmative.
pub async fn resolve_and_act<O: SessionOpener>(
    opener: &O,
    index: &OpenFileIndex,
    selection: &Selection,
    answer: &str,
) -> Result<HostedOpenFile> {
    let target = index.resolve(selection)?.clone();

    if answer.trim().parse::<Confirmation>()? == Confirmation::No {
        info!(id = target.file.id, host = %target.host, "lock break declined");
        return Err(Error::Aborted);
    }

    let session = opener.open(&target.host).await?;
    ResourceClient::new(&session)
        .close_open_file(target.file.id)
        .await?;
    info!(id = target.file.id, host = %target.host, file = %target.file.file, "open file closed");
    Ok(target)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use httpmock::prelude::*;
    use proptest::prelude::*;
    use serde_json::json;
    use test_case::test_case;

    use super::*;
    use crate::credentials::Credentials;
    use crate::session::{Endpoint, Session};
    use crate::session::tests::mock_login;

    const OPENFILES: &str = "/platform/1/protocols/smb/openfiles";

    /// Routes host names to mock servers.
    struct MockHosts<'a> {
        servers: HashMap<&'static str, &'a MockServer>,
    }

    impl SessionOpener for MockHosts<'_> {
        async fn open(&self, host: &str) -> Result<Session> {
            let server = self.servers.get(host).ok_or_else(|| Error::Auth {
                endpoint: host.to_owned(),
                reason: "unknown host".to_owned(),
            })?;
            let endpoint = Endpoint::from_uri(&server.base_url())?;
            Session::open(endpoint, &Credentials::new("admin", "pw")).await
        }
    }

    fn file(id: u64, path: &str) -> OpenFile {
        OpenFile {
            id,
            file: path.to_owned(),
            user: None,
            locks: 0,
            permissions: Vec::new(),
        }
    }

    #[test]
    fn range_expands_last_octet() {
        assert_eq!(
            expand_hosts("10.1.1.2-10.1.1.5").expect("valid"),
            vec!["10.1.1.2", "10.1.1.3", "10.1.1.4", "10.1.1.5"]
        );
    }

    #[test]
    fn mixed_spec_preserves_order() {
        assert_eq!(
            expand_hosts("10.1.1.2,10.1.1.9-10.1.1.11").expect("valid"),
            vec!["10.1.1.2", "10.1.1.9", "10.1.1.10", "10.1.1.11"]
        );
    }

    #[test]
    fn short_range_end_and_literals() {
        assert_eq!(
            expand_hosts("node1.lab,192.168.0.254-255").expect("valid"),
            vec!["node1.lab", "192.168.0.254", "192.168.0.255"]
        );
    }

    #[test_case("10.1.1.5-10.1.1.2" ; "descending")]
    #[test_case("10.1.1.5-300" ; "octet overflow")]
    #[test_case("10.1.1.x-4" ; "non numeric start")]
    #[test_case("10.1.1.1,,10.1.1.2" ; "empty token")]
    #[test_case("host-4" ; "undotted range start")]
    fn malformed_specs_are_rejected(spec: &str) {
        let err = expand_hosts(spec).expect_err("malformed");
        assert!(err.is_fatal());
    }

    proptest! {
        #[test]
        fn range_yields_end_minus_start_plus_one(
            a in 0u8..=255, b in 0u8..=255, c in 0u8..=255,
            start in 0u8..=255, span in 0u8..=255,
        ) {
            let end = start.saturating_add(span);
            let spec = format!("{a}.{b}.{c}.{start}-{a}.{b}.{c}.{end}");
            let hosts = expand_hosts(&spec).expect("valid");

            prop_assert_eq!(hosts.len(), usize::from(end - start) + 1);
            let prefix = format!("{a}.{b}.{c}.");
            let mut previous = None;
            for host in &hosts {
                let last: u8 = host
                    .strip_prefix(&prefix)
                    .expect("same /24")
                    .parse()
                    .expect("octet");
                if let Some(prev) = previous {
                    prop_assert_eq!(last, prev + 1);
                }
                previous = Some(last);
            }
        }
    }

    #[test]
    fn resolve_distinguishes_shared_ids() {
        let mut index = OpenFileIndex::new();
        index.push("10.0.0.5", file(7, "/ifs/a/report.csv"));
        index.push("10.0.0.6", file(7, "/ifs/b/report.csv"));
        index.push("10.0.0.6", file(8, "/ifs/c/report.csv"));

        let err = index.resolve(&Selection::id(7)).expect_err("ambiguous");
        assert!(matches!(&err, Error::Ambiguous { id: 7, hosts } if hosts == &["10.0.0.5", "10.0.0.6"]));

        let pinned = index
            .resolve(&Selection::on_host(7, "10.0.0.6"))
            .expect("pinned");
        assert_eq!(pinned.file.file, "/ifs/b/report.csv");

        let unique = index.resolve(&Selection::id(8)).expect("unique");
        assert_eq!(unique.host, "10.0.0.6");

        assert!(matches!(
            index.resolve(&Selection::id(9)),
            Err(Error::NotFound { id: 9, host: None })
        ));
        assert!(matches!(
            index.resolve(&Selection::on_host(8, "10.0.0.5")),
            Err(Error::NotFound { id: 8, host: Some(_) })
        ));
    }

    #[test_case("y", Confirmation::Yes)]
    #[test_case("yes", Confirmation::Yes)]
    #[test_case("n", Confirmation::No)]
    #[test_case("no", Confirmation::No)]
    fn confirmation_accepts_exact_answers(input: &str, expected: Confirmation) {
        assert_eq!(input.parse::<Confirmation>().expect("valid"), expected);
    }

    #[test_case("Y" ; "uppercase")]
    #[test_case("yep" ; "other word")]
    #[test_case("" ; "empty")]
    fn confirmation_rejects_anything_else(input: &str) {
        assert!(input.parse::<Confirmation>().is_err());
    }

    async fn mock_openfiles<'a>(server: &'a MockServer, files: serde_json::Value) -> httpmock::Mock<'a> {
        server
            .mock_async(|when, then| {
                when.method(GET).path(OPENFILES);
                then.status(200).json_body(json!({"openfiles": files, "total": 0}));
            })
            .await
    }

    #[tokio::test]
    async fn shared_id_across_hosts_requires_disambiguation() {
        let node5 = MockServer::start_async().await;
        let node6 = MockServer::start_async().await;
        mock_login(&node5).await;
        mock_login(&node6).await;
        mock_openfiles(
            &node5,
            json!([{"id": 7, "file": "C:\\ifs\\finance\\report.csv"}, {"id": 3, "file": "C:\\ifs\\x.txt"}]),
        )
        .await;
        mock_openfiles(&node6, json!([{"id": 7, "file": "C:\\ifs\\sales\\report.csv"}])).await;
        let delete5 = node5
            .mock_async(|when, then| {
                when.method(DELETE).path(format!("{OPENFILES}/7"));
                then.status(204);
            })
            .await;
        let delete6 = node6
            .mock_async(|when, then| {
                when.method(DELETE)
                    .path(format!("{OPENFILES}/7"))
                    .header("X-CSRF-Token", "tok-1");
                then.status(204);
            })
            .await;

        let opener = MockHosts {
            servers: HashMap::from([("10.0.0.5", &node5), ("10.0.0.6", &node6)]),
        };
        let hosts = expand_hosts("10.0.0.5,10.0.0.6").expect("hosts");
        let report = search(&opener, &hosts, "report.csv").await.expect("search");

        assert!(report.skipped.is_empty());
        assert_eq!(report.index.len(), 2);
        assert_eq!(report.index.hosts_for(7), vec!["10.0.0.5", "10.0.0.6"]);

        let err = resolve_and_act(&opener, &report.index, &Selection::id(7), "y")
            .await
            .expect_err("ambiguous");
        assert!(matches!(err, Error::Ambiguous { id: 7, .. }));
        delete5.assert_hits_async(0).await;
        delete6.assert_hits_async(0).await;

        let closed = resolve_and_act(
            &opener,
            &report.index,
            &Selection::on_host(7, "10.0.0.6"),
            "yes",
        )
        .await
        .expect("closed");
        assert_eq!(closed.host, "10.0.0.6");
        assert!(closed.file.file.contains("sales"));
        delete5.assert_hits_async(0).await;
        delete6.assert_hits_async(1).await;
    }

    #[tokio::test]
    async fn failing_host_is_skipped() {
        let good = MockServer::start_async().await;
        let bad = MockServer::start_async().await;
        mock_login(&good).await;
        mock_login(&bad).await;
        mock_openfiles(&good, json!([{"id": 1, "file": "/ifs/Report.CSV"}, {"id": 2, "file": "/ifs/report.csv"}])).await;
        bad.mock_async(|when, then| {
            when.method(GET).path(OPENFILES);
            then.status(500);
        })
        .await;

        let opener = MockHosts {
            servers: HashMap::from([("a", &bad), ("b", &good)]),
        };
        let report = search(&opener, &["a".to_owned(), "b".to_owned()], "report.csv")
            .await
            .expect("partial success");

        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].host, "a");
        assert_eq!(report.index.len(), 1, "match is case-sensitive");
        assert_eq!(report.index.entries()[0].file.id, 2);
        assert_eq!(report.index.entries()[0].host, "b");
    }

    #[tokio::test]
    async fn unreachable_session_is_fatal() {
        let opener = MockHosts {
            servers: HashMap::new(),
        };
        let err = search(&opener, &["10.9.9.9".to_owned()], "x")
            .await
            .expect_err("auth");
        assert!(err.is_fatal());
    }

    #[test_case("n" ; "declined")]
    #[test_case("maybe" ; "invalid")]
    #[tokio::test]
    async fn non_affirmative_answer_sends_nothing(answer: &str) {
        let server = MockServer::start_async().await;
        let login = mock_login(&server).await;
        let delete = server
            .mock_async(|when, then| {
                when.method(DELETE).path(format!("{OPENFILES}/4"));
                then.status(204);
            })
            .await;

        let mut index = OpenFileIndex::new();
        index.push("h", file(4, "/ifs/a"));
        let opener = MockHosts {
            servers: HashMap::from([("h", &server)]),
        };

        let err = resolve_and_act(&opener, &index, &Selection::id(4), answer)
            .await
            .expect_err("aborted");
        assert!(matches!(err, Error::Aborted | Error::Validation { .. }));
        login.assert_hits_async(0).await;
        delete.assert_hits_async(0).await;
    }

    #[tokio::test]
    async fn unknown_id_sends_nothing() {
        let server = MockServer::start_async().await;
        let login = mock_login(&server).await;

        let mut index = OpenFileIndex::new();
        index.push("h", file(4, "/ifs/a"));
        let opener = MockHosts {
            servers: HashMap::from([("h", &server)]),
        };

        let err = resolve_and_act(&opener, &index, &Selection::id(5), "y")
            .await
            .expect_err("not found");
        assert!(matches!(err, Error::NotFound { id: 5, .. }));
        login.assert_hits_async(0).await;
    }
}
