use trellis_types::{Location, Path};

use crate::base::RequestKind;
use crate::request::Request;

/// A request that mutates content.
///
/// Besides its results, a change request can answer whether it may have
/// affected a subtree, without the caller inspecting the results.
pub trait ChangeRequest: RequestKind {
    /// Returns `true` if this request's target lies at or below `path` in
    /// `workspace`.
    ///
    /// The actual location is used when the connector has reported one,
    /// otherwise the nominal location.
    fn changes(&self, workspace: &str, path: &Path) -> bool;

    /// The actual location of the changed node if known, else the nominal one.
    fn changed_location(&self) -> &Location;

    /// The workspace in which the change happened.
    fn changed_workspace(&self) -> &str;

    /// A fresh, unfrozen request with the same inputs and no results.
    fn clone_unprocessed(&self) -> Request;
}

/// Pick the actual location when it carries a path, else the nominal one.
pub(crate) fn most_specific<'a>(nominal: &'a Location, actual: Option<&'a Location>) -> &'a Location {
    match actual {
        Some(actual) if actual.has_path() => actual,
        _ => nominal,
    }
}

/// Whether `location` (nominal or actual) is at or below `path`.
pub(crate) fn affects(nominal: &Location, actual: Option<&Location>, path: &Path) -> bool {
    most_specific(nominal, actual)
        .path()
        .is_some_and(|p| p.is_at_or_below(path))
}
