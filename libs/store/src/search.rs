use std::collections::HashMap;

use indexmap::IndexMap;
use libsql::Value;

use crate::errors::StoreError;

/// Declares what a single search endpoint allows: which table to query,
/// which query-string keys may appear as an `order_by` target, and which
/// keys are recognised filters together with the column + SQL comparator
/// they translate to.
///
/// Every value is validated against these maps before any SQL is built;
/// nothing from the caller-supplied parameters is ever interpolated into
/// the query text, only bound as a parameter.
pub struct SearchSpec<'a> {
    pub table: &'a str,
    pub select: &'a str,
    pub order_by: &'a HashMap<&'a str, &'a str>,
    pub filters: &'a HashMap<&'a str, (&'a str, &'a str)>,
}

const GENERIC_KEYS: &[&str] = &["order_by", "arrange", "limit", "offset"];

/// Translates a caller-supplied multimap of query parameters into a
/// `SELECT` statement plus its bound parameters, per the search grammar:
/// `order_by`, `arrange` (`asc`|`desc`, requires `order_by`), `limit`
/// (positive integer), `offset` (non-negative integer, requires `limit`),
/// and per-endpoint filter keys whose comma-separated values are OR'd
/// together, with distinct keys AND'd.
pub fn build_query(spec: &SearchSpec<'_>, params: &IndexMap<String, String>) -> Result<(String, Vec<Value>), StoreError> {
    for key in params.keys() {
        if !GENERIC_KEYS.contains(&key.as_str()) && !spec.filters.contains_key(key.as_str()) {
            return Err(StoreError::InvalidParameter(key.clone()));
        }
    }

    let arrange = params.get("arrange").map(|s| s.as_str());
    if arrange.is_some() && !params.contains_key("order_by") {
        return Err(StoreError::InvalidParameter(
            "arrange requires order_by".into(),
        ));
    }
    if let Some(direction) = arrange {
        if direction != "asc" && direction != "desc" {
            return Err(StoreError::InvalidParameter(format!(
                "arrange must be asc or desc, got {direction}"
            )));
        }
    }

    if params.contains_key("offset") && !params.contains_key("limit") {
        return Err(StoreError::InvalidParameter("offset requires limit".into()));
    }

    let mut sql = format!("SELECT {} FROM {}", spec.select, spec.table);
    let mut bound: Vec<Value> = Vec::new();
    let mut and_clauses: Vec<String> = Vec::new();

    for (key, raw_value) in params.iter() {
        let Some((column, comparator)) = spec.filters.get(key.as_str()) else {
            continue;
        };
        let values: Vec<&str> = raw_value.split(',').collect();
        if values.iter().any(|v| v.is_empty()) {
            return Err(StoreError::InvalidParameter(format!(
                "{key} contains an empty value"
            )));
        }
        let mut or_clauses = Vec::with_capacity(values.len());
        for value in values {
            or_clauses.push(format!("{column} {comparator} ?"));
            bound.push(Value::Text(value.to_string()));
        }
        and_clauses.push(format!("({})", or_clauses.join(" OR ")));
    }

    if !and_clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&and_clauses.join(" AND "));
    }

    if let Some(order_key) = params.get("order_by") {
        let column = spec
            .order_by
            .get(order_key.as_str())
            .ok_or_else(|| StoreError::InvalidParameter(format!("order_by={order_key}")))?;
        let direction = arrange.unwrap_or("asc").to_ascii_uppercase();
        sql.push_str(&format!(" ORDER BY {column} {direction}"));
    }

    if let Some(limit_raw) = params.get("limit") {
        let limit: i64 = limit_raw
            .parse()
            .map_err(|_| StoreError::InvalidParameter(format!("limit={limit_raw}")))?;
        if limit <= 0 {
            return Err(StoreError::InvalidParameter("limit must be positive".into()));
        }
        sql.push_str(" LIMIT ?");
        bound.push(Value::Integer(limit));

        if let Some(offset_raw) = params.get("offset") {
            let offset: i64 = offset_raw
                .parse()
                .map_err(|_| StoreError::InvalidParameter(format!("offset={offset_raw}")))?;
            if offset < 0 {
                return Err(StoreError::InvalidParameter("offset must not be negative".into()));
            }
            sql.push_str(" OFFSET ?");
            bound.push(Value::Integer(offset));
        }
    }

    Ok((sql, bound))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec<'a>(
        order_by: &'a HashMap<&'a str, &'a str>,
        filters: &'a HashMap<&'a str, (&'a str, &'a str)>,
    ) -> SearchSpec<'a> {
        SearchSpec {
            table: "session",
            select: "*",
            order_by,
            filters,
        }
    }

    #[test]
    fn rejects_unknown_key() {
        let order_by = HashMap::new();
        let filters = HashMap::new();
        let mut params = IndexMap::new();
        params.insert("bogus".into(), "1".into());
        let err = build_query(&spec(&order_by, &filters), &params).unwrap_err();
        assert!(matches!(err, StoreError::InvalidParameter(_)));
    }

    #[test]
    fn arrange_without_order_by_fails() {
        let order_by = HashMap::new();
        let filters = HashMap::new();
        let mut params = IndexMap::new();
        params.insert("arrange".into(), "asc".into());
        assert!(build_query(&spec(&order_by, &filters), &params).is_err());
    }

    #[test]
    fn offset_without_limit_fails() {
        let order_by = HashMap::new();
        let filters = HashMap::new();
        let mut params = IndexMap::new();
        params.insert("offset".into(), "5".into());
        assert!(build_query(&spec(&order_by, &filters), &params).is_err());
    }

    #[test]
    fn non_positive_limit_fails() {
        let order_by = HashMap::new();
        let filters = HashMap::new();
        let mut params = IndexMap::new();
        params.insert("limit".into(), "0".into());
        assert!(build_query(&spec(&order_by, &filters), &params).is_err());
    }

    #[test]
    fn or_combines_within_key_and_combines_across_keys() {
        let order_by = HashMap::new();
        let mut filters = HashMap::new();
        filters.insert("ip", ("env_ip", "="));
        filters.insert("port", ("env_port", "="));
        let mut params = IndexMap::new();
        params.insert("ip".into(), "10.0.0.1,10.0.0.2".into());
        params.insert("port".into(), "9000".into());
        let (sql, bound) = build_query(&spec(&order_by, &filters), &params).unwrap();
        assert!(sql.contains("(env_ip = ? OR env_ip = ?) AND (env_port = ?)"));
        assert_eq!(bound.len(), 3);
    }

    #[test]
    fn builds_order_limit_offset() {
        let mut order_by = HashMap::new();
        order_by.insert("start", "session_start");
        let filters = HashMap::new();
        let mut params = IndexMap::new();
        params.insert("order_by".into(), "start".into());
        params.insert("arrange".into(), "desc".into());
        params.insert("limit".into(), "10".into());
        params.insert("offset".into(), "5".into());
        let (sql, bound) = build_query(&spec(&order_by, &filters), &params).unwrap();
        assert!(sql.ends_with("ORDER BY session_start DESC LIMIT ? OFFSET ?"));
        assert_eq!(bound.len(), 2);
    }
}
