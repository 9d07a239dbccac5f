//! Search requests.
//!
//! Both kinds answer with a tabular result: column names plus tuples of
//! optional values, one value per column.

use trellis_types::{Name, Value};

use crate::base::impl_request_kind;
use crate::cache::{impl_cacheable, CacheState};
use crate::error::UsageError;
use crate::kind::RequestType;
use crate::state::RequestState;

/// Tabular search results shared by every search kind.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchResults {
    columns: Vec<Name>,
    tuples: Vec<Vec<Option<Value>>>,
}

impl SearchResults {
    pub fn columns(&self) -> &[Name] {
        &self.columns
    }

    pub fn tuples(&self) -> &[Vec<Option<Value>>] {
        &self.tuples
    }

    pub fn len(&self) -> usize {
        self.tuples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tuples.is_empty()
    }

    /// Values of one column across all tuples.
    pub fn column(&self, name: &Name) -> Option<Vec<Option<&Value>>> {
        let index = self.columns.iter().position(|c| c == name)?;
        Some(self.tuples.iter().map(|t| t[index].as_ref()).collect())
    }

    fn set(
        &mut self,
        columns: Vec<Name>,
        tuples: Vec<Vec<Option<Value>>>,
    ) -> Result<(), UsageError> {
        if let Some(bad) = tuples.iter().position(|t| t.len() != columns.len()) {
            return Err(UsageError::invalid(format!(
                "tuple {bad} has {} values but there are {} columns",
                tuples[bad].len(),
                columns.len()
            )));
        }
        self.columns = columns;
        self.tuples = tuples;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// AccessQueryRequest
// ---------------------------------------------------------------------------

/// A structured query over one workspace, executed by a query engine.
///
/// The constraints are opaque to this layer; they are handed to the
/// connector verbatim.
#[derive(Debug)]
pub struct AccessQueryRequest {
    state: RequestState,
    cache: CacheState,
    workspace: String,
    selector_name: Name,
    columns: Vec<Name>,
    constraints: Vec<String>,
    limit: Option<usize>,
    offset: usize,
    results: SearchResults,
}

impl AccessQueryRequest {
    pub fn new(
        workspace: impl Into<String>,
        selector_name: Name,
        columns: Vec<Name>,
        constraints: Vec<String>,
    ) -> Self {
        Self {
            state: RequestState::new(RequestType::AccessQuery),
            cache: CacheState::default(),
            workspace: workspace.into(),
            selector_name,
            columns,
            constraints,
            limit: None,
            offset: 0,
            results: SearchResults::default(),
        }
    }

    /// Restrict the number of tuples returned.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Skip the first `offset` tuples.
    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    pub fn workspace(&self) -> &str {
        &self.workspace
    }

    pub fn selector_name(&self) -> &Name {
        &self.selector_name
    }

    pub fn requested_columns(&self) -> &[Name] {
        &self.columns
    }

    pub fn constraints(&self) -> &[String] {
        &self.constraints
    }

    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn results(&self) -> &SearchResults {
        &self.results
    }

    /// Store the results; every tuple must have one value per column.
    pub fn set_results(
        &mut self,
        columns: Vec<Name>,
        tuples: Vec<Vec<Option<Value>>>,
    ) -> Result<(), UsageError> {
        self.state.check_not_frozen()?;
        self.results.set(columns, tuples)
    }
}

impl_request_kind!(AccessQueryRequest, read_only = true);
impl_cacheable!(AccessQueryRequest);

// ---------------------------------------------------------------------------
// FullTextSearchRequest
// ---------------------------------------------------------------------------

/// A free-text search across one workspace.
#[derive(Debug)]
pub struct FullTextSearchRequest {
    state: RequestState,
    cache: CacheState,
    expression: String,
    workspace: String,
    max_results: Option<usize>,
    offset: usize,
    results: SearchResults,
}

impl FullTextSearchRequest {
    pub fn new(expression: impl Into<String>, workspace: impl Into<String>) -> Self {
        Self {
            state: RequestState::new(RequestType::FullTextSearch),
            cache: CacheState::default(),
            expression: expression.into(),
            workspace: workspace.into(),
            max_results: None,
            offset: 0,
            results: SearchResults::default(),
        }
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = Some(max_results);
        self
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    pub fn workspace(&self) -> &str {
        &self.workspace
    }

    pub fn max_results(&self) -> Option<usize> {
        self.max_results
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn results(&self) -> &SearchResults {
        &self.results
    }

    pub fn set_results(
        &mut self,
        columns: Vec<Name>,
        tuples: Vec<Vec<Option<Value>>>,
    ) -> Result<(), UsageError> {
        self.state.check_not_frozen()?;
        self.results.set(columns, tuples)
    }
}

impl_request_kind!(FullTextSearchRequest, read_only = true);
impl_cacheable!(FullTextSearchRequest);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::RequestKind;

    fn name(s: &str) -> Name {
        Name::new(s).unwrap()
    }

    #[test]
    fn results_must_match_columns() {
        let mut r = FullTextSearchRequest::new("hello", "default");
        let err = r
            .set_results(vec![name("path")], vec![vec![None, None]])
            .unwrap_err();
        assert!(matches!(err, UsageError::InvalidArgument(_)));
        assert!(r.results().is_empty());
    }

    #[test]
    fn column_projection() {
        let mut r = FullTextSearchRequest::new("hello", "default").with_max_results(10);
        r.set_results(
            vec![name("path"), name("score")],
            vec![
                vec![Some(Value::from("/a")), Some(Value::Double(1.0))],
                vec![Some(Value::from("/b")), None],
            ],
        )
        .unwrap();
        let scores = r.results().column(&name("score")).unwrap();
        assert_eq!(scores, vec![Some(&Value::Double(1.0)), None]);
        assert!(r.results().column(&name("missing")).is_none());
        assert_eq!(r.max_results(), Some(10));
    }

    #[test]
    fn searches_are_read_only() {
        let q = AccessQueryRequest::new("default", name("nt:base"), vec![], vec![])
            .with_limit(5)
            .with_offset(2);
        assert!(q.is_read_only());
        assert_eq!(q.limit(), Some(5));
        assert_eq!(q.offset(), 2);
        assert_eq!(q.request_type(), RequestType::AccessQuery);
    }

    #[test]
    fn frozen_search_rejects_results() {
        let mut r = FullTextSearchRequest::new("x", "default");
        r.freeze();
        assert!(r.set_results(vec![], vec![]).is_err());
    }
}
