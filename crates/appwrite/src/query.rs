use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

const QUERY_PARAM: &str = "queries[]";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum QueryMethod {
    Equal,
    NotEqual,
    LessThan,
    LessThanEqual,
    GreaterThan,
    GreaterThanEqual,
    IsNull,
    IsNotNull,
    Between,
    StartsWith,
    EndsWith,
    Search,
    Select,
    OrderAsc,
    OrderDesc,
    Limit,
    Offset,
    CursorAfter,
    CursorBefore,
}

/// A single filter, ordering or paging expression for list endpoints.
///
/// Serialized as the JSON form the service accepts, e.g.
/// `{"method":"equal","attribute":"status","values":["active"]}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub method: QueryMethod,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<Value>,
}

impl Query {
    fn new(method: QueryMethod, attribute: Option<&str>, values: Vec<Value>) -> Self {
        Self {
            method,
            attribute: attribute.map(str::to_string),
            values,
        }
    }

    /// Matches documents whose attribute equals `value`.
    pub fn equal<V: Into<Value>>(attribute: &str, value: V) -> Self {
        Self::new(QueryMethod::Equal, Some(attribute), vec![value.into()])
    }

    pub fn not_equal<V: Into<Value>>(attribute: &str, value: V) -> Self {
        Self::new(QueryMethod::NotEqual, Some(attribute), vec![value.into()])
    }

    pub fn less_than<V: Into<Value>>(attribute: &str, value: V) -> Self {
        Self::new(QueryMethod::LessThan, Some(attribute), vec![value.into()])
    }

    pub fn less_than_equal<V: Into<Value>>(attribute: &str, value: V) -> Self {
        Self::new(QueryMethod::LessThanEqual, Some(attribute), vec![value.into()])
    }

    pub fn greater_than<V: Into<Value>>(attribute: &str, value: V) -> Self {
        Self::new(QueryMethod::GreaterThan, Some(attribute), vec![value.into()])
    }

    pub fn greater_than_equal<V: Into<Value>>(attribute: &str, value: V) -> Self {
        Self::new(
            QueryMethod::GreaterThanEqual,
            Some(attribute),
            vec![value.into()],
        )
    }

    pub fn is_null(attribute: &str) -> Self {
        Self::new(QueryMethod::IsNull, Some(attribute), Vec::new())
    }

    pub fn is_not_null(attribute: &str) -> Self {
        Self::new(QueryMethod::IsNotNull, Some(attribute), Vec::new())
    }

    pub fn between<V: Into<Value>>(attribute: &str, start: V, end: V) -> Self {
        Self::new(
            QueryMethod::Between,
            Some(attribute),
            vec![start.into(), end.into()],
        )
    }

    pub fn starts_with(attribute: &str, prefix: &str) -> Self {
        Self::new(QueryMethod::StartsWith, Some(attribute), vec![prefix.into()])
    }

    pub fn ends_with(attribute: &str, suffix: &str) -> Self {
        Self::new(QueryMethod::EndsWith, Some(attribute), vec![suffix.into()])
    }

    /// Full-text search; requires a fulltext index on the attribute.
    pub fn search(attribute: &str, text: &str) -> Self {
        Self::new(QueryMethod::Search, Some(attribute), vec![text.into()])
    }

    pub fn select<'a>(attributes: impl IntoIterator<Item = &'a str>) -> Self {
        let values = attributes.into_iter().map(Value::from).collect();
        Self::new(QueryMethod::Select, None, values)
    }

    pub fn order_asc(attribute: &str) -> Self {
        Self::new(QueryMethod::OrderAsc, Some(attribute), Vec::new())
    }

    pub fn order_desc(attribute: &str) -> Self {
        Self::new(QueryMethod::OrderDesc, Some(attribute), Vec::new())
    }

    pub fn limit(limit: u32) -> Self {
        Self::new(QueryMethod::Limit, None, vec![limit.into()])
    }

    pub fn offset(offset: u32) -> Self {
        Self::new(QueryMethod::Offset, None, vec![offset.into()])
    }

    pub fn cursor_after(document_id: &str) -> Self {
        Self::new(QueryMethod::CursorAfter, None, vec![document_id.into()])
    }

    pub fn cursor_before(document_id: &str) -> Self {
        Self::new(QueryMethod::CursorBefore, None, vec![document_id.into()])
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Encode as repeated `queries[]` query-string pairs.
    pub(crate) fn to_params(queries: &[Query]) -> Result<Vec<(&'static str, String)>> {
        queries
            .iter()
            .map(|q| Ok((QUERY_PARAM, q.to_json()?)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_serializes_with_value_array() {
        let q = Query::equal("status", "active");
        assert_eq!(
            q.to_json().unwrap(),
            r#"{"method":"equal","attribute":"status","values":["active"]}"#
        );
    }

    #[test]
    fn ordering_omits_values() {
        let q = Query::order_desc("$createdAt");
        assert_eq!(
            q.to_json().unwrap(),
            r#"{"method":"orderDesc","attribute":"$createdAt"}"#
        );
    }

    #[test]
    fn limit_has_no_attribute() {
        let q = Query::limit(10);
        assert_eq!(q.to_json().unwrap(), r#"{"method":"limit","values":[10]}"#);
    }

    #[test]
    fn parses_raw_query() {
        let q = Query::from_json(r#"{"method":"greaterThan","attribute":"views","values":[100]}"#)
            .unwrap();
        assert_eq!(q, Query::greater_than("views", 100));
    }

    #[test]
    fn unknown_method_is_rejected() {
        assert!(Query::from_json(r#"{"method":"fuzzy","attribute":"a","values":[]}"#).is_err());
    }

    #[test]
    fn params_repeat_key() {
        let params =
            Query::to_params(&[Query::equal("status", "active"), Query::limit(5)]).unwrap();
        assert_eq!(params.len(), 2);
        assert!(params.iter().all(|(k, _)| *k == "queries[]"));
    }
}
