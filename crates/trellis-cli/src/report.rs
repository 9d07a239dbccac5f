use serde::Serialize;
use trellis_request::{Request, RequestKind, SearchResults};

use crate::cli::RunMode;

/// What happened to one request of a run.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RequestSummary {
    pub index: usize,
    pub request_type: String,
    pub ordinal: u16,
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Ok,
    Failed,
    Cancelled,
}

/// The result of running a whole script.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RunReport {
    pub mode: RunMode,
    pub requests: Vec<RequestSummary>,
}

impl RunReport {
    pub fn failed(&self) -> usize {
        self.requests
            .iter()
            .filter(|r| r.status == Status::Failed)
            .count()
    }
}

impl RequestSummary {
    pub fn of(index: usize, request: &Request) -> Self {
        let status = if request.has_error() {
            Status::Failed
        } else if request.is_cancelled() {
            Status::Cancelled
        } else {
            Status::Ok
        };
        Self {
            index,
            request_type: request.request_type().label().to_string(),
            ordinal: request.request_type().ordinal(),
            status,
            error: request.error().map(ToString::to_string),
            details: if request.has_error() { Vec::new() } else { details(request) },
        }
    }
}

fn search_rows(results: &SearchResults) -> Vec<String> {
    results
        .tuples()
        .iter()
        .map(|row| {
            row.iter()
                .map(|cell| cell.as_ref().map_or_else(|| "-".to_string(), ToString::to_string))
                .collect::<Vec<_>>()
                .join(" | ")
        })
        .collect()
}

fn moved(before: Option<&impl ToString>, after: Option<&impl ToString>) -> Vec<String> {
    match (before, after) {
        (Some(before), Some(after)) => vec![format!("{} -> {}", before.to_string(), after.to_string())],
        _ => Vec::new(),
    }
}

/// Key results worth printing for a successful request.
fn details(request: &Request) -> Vec<String> {
    match request {
        Request::ReadNode(r) => r
            .properties()
            .values()
            .map(ToString::to_string)
            .chain(r.children().iter().map(|c| format!("child {c}")))
            .collect(),
        Request::ReadAllChildren(r) => r.children().iter().map(ToString::to_string).collect(),
        Request::ReadBlockOfChildren(r) => r.children().iter().map(ToString::to_string).collect(),
        Request::ReadNextBlockOfChildren(r) => {
            r.children().iter().map(ToString::to_string).collect()
        }
        Request::ReadAllProperties(r) => r
            .properties()
            .values()
            .map(ToString::to_string)
            .chain(r.number_of_children().map(|n| format!("{n} children")))
            .collect(),
        Request::ReadProperty(r) => r.property().map(ToString::to_string).into_iter().collect(),
        Request::ReadBranch(r) => r
            .nodes()
            .iter()
            .map(|node| format!("{} ({} children)", node.location, node.children.len()))
            .collect(),
        Request::VerifyNode(r) => r.actual_location().map(ToString::to_string).into_iter().collect(),
        Request::VerifyWorkspace(r) => r.actual_workspace_name().map(str::to_string).into_iter().collect(),
        Request::GetWorkspaces(r) => r.available_workspace_names().iter().cloned().collect(),
        Request::FullTextSearch(r) => search_rows(r.results()),
        Request::AccessQuery(r) => search_rows(r.results()),
        Request::CreateNode(r) => r.actual_location_of_node().map(ToString::to_string).into_iter().collect(),
        Request::UpdateProperties(r) => r
            .created_properties()
            .iter()
            .map(|name| format!("created {name}"))
            .collect(),
        Request::SetProperty(r) if r.is_new_property() => vec![format!("created {}", r.property().name())],
        Request::UpdateValues(r) => r
            .actual_added_values()
            .iter()
            .map(|v| format!("+ {v}"))
            .chain(r.actual_removed_values().iter().map(|v| format!("- {v}")))
            .collect(),
        Request::RenameNode(r) => moved(r.actual_location_before(), r.actual_location_after()),
        Request::MoveBranch(r) => moved(r.actual_location_before(), r.actual_location_after()),
        Request::CopyBranch(r) => moved(r.actual_location_before(), r.actual_location_after()),
        Request::CloneBranch(r) => moved(r.actual_location_before(), r.actual_location_after())
            .into_iter()
            .chain(r.removed_existing_nodes().iter().map(|l| format!("removed {l}")))
            .collect(),
        Request::DeleteChildren(r) => r
            .actual_children_deleted()
            .iter()
            .map(|l| format!("deleted {l}"))
            .collect(),
        Request::LockBranch(r) => r.actual_location().map(|l| format!("locked {l}")).into_iter().collect(),
        Request::CreateWorkspace(r) => r.actual_workspace_name().map(str::to_string).into_iter().collect(),
        Request::CloneWorkspace(r) => r.actual_workspace_name().map(str::to_string).into_iter().collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_request::{ReadNodeRequest, RequestError, VerifyWorkspaceRequest};
    use trellis_types::Location;

    #[test]
    fn failed_requests_carry_their_error() {
        let mut request: Request = ReadNodeRequest::new(Location::root(), "nowhere").into();
        request
            .set_error(RequestError::InvalidWorkspace("nowhere".into()))
            .unwrap();
        let summary = RequestSummary::of(4, &request);
        assert_eq!(summary.index, 4);
        assert_eq!(summary.status, Status::Failed);
        assert_eq!(summary.request_type, "read node");
        assert_eq!(summary.error.as_deref(), Some("workspace 'nowhere' does not exist"));
        assert!(summary.details.is_empty());
    }

    #[test]
    fn json_omits_empty_fields() {
        let request: Request = VerifyWorkspaceRequest::new(None).into();
        let report = RunReport {
            mode: RunMode::Bulk,
            requests: vec![RequestSummary::of(0, &request)],
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["mode"], "bulk");
        assert_eq!(json["requests"][0]["status"], "ok");
        assert!(json["requests"][0].get("error").is_none());
        assert_eq!(report.failed(), 0);
    }
}
