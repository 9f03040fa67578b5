//! Canonical encoding of a list view's state as a remote collection query
//!
//! The collection endpoints take four grouped parameters (`query`, `search`,
//! `options`, `filters`). Each group travels as one URL parameter whose value is
//! the group serialized as compact JSON.

use serde_json::{json, Map, Value};

use crate::models::{DateRange, QueryState};

#[derive(Debug, Clone, PartialEq)]
pub struct SearchParams {
    pub keyword: String,
    pub fields: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryOptions {
    pub limit: usize,
    pub page: usize,
    pub populate: Vec<String>,
    /// `(field, "asc" | "desc")` of the single active sort
    pub sort: Option<(String, String)>,
}

/// Full remote query for one page of a collection.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteQuery {
    pub query: Map<String, Value>,
    pub search: Option<SearchParams>,
    pub options: QueryOptions,
    pub filters: DateRange,
}

impl RemoteQuery {
    pub fn build(
        state: &QueryState,
        static_filter: &Map<String, Value>,
        populate: &[String],
        search_fields: &[String],
    ) -> Self {
        let search = if search_fields.is_empty() {
            None
        } else {
            Some(SearchParams {
                keyword: state.search_term.clone(),
                fields: search_fields.to_vec(),
            })
        };

        Self {
            query: static_filter.clone(),
            search,
            options: QueryOptions {
                limit: state.rows_per_page,
                page: state.page,
                populate: populate.to_vec(),
                sort: state
                    .sort
                    .as_ref()
                    .map(|s| (s.field.clone(), s.direction.as_str().to_string())),
            },
            filters: state.date_range,
        }
    }

    /// Parameter groups in wire order, absent groups skipped.
    pub fn groups(&self) -> Vec<(&'static str, Value)> {
        let mut groups = vec![("query", Value::Object(self.query.clone()))];

        if let Some(search) = &self.search {
            groups.push((
                "search",
                json!({ "keyword": search.keyword, "fields": search.fields }),
            ));
        }

        let mut sort = Map::new();
        if let Some((field, direction)) = &self.options.sort {
            sort.insert(field.clone(), Value::String(direction.clone()));
        }
        groups.push((
            "options",
            json!({
                "limit": self.options.limit,
                "page": self.options.page,
                "populate": self.options.populate,
                "sort": sort,
            }),
        ));

        if !self.filters.is_empty() {
            let mut filters = Map::new();
            if let Some(start) = self.filters.start {
                filters.insert(
                    "startDate".to_string(),
                    Value::String(start.format("%Y-%m-%d").to_string()),
                );
            }
            if let Some(end) = self.filters.end {
                filters.insert(
                    "endDate".to_string(),
                    Value::String(end.format("%Y-%m-%d").to_string()),
                );
            }
            groups.push(("filters", Value::Object(filters)));
        }

        groups
    }

    /// URL query parameters, one JSON-encoded value per group
    pub fn to_params(&self) -> Vec<(String, String)> {
        self.groups()
            .into_iter()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect()
    }
}

/// Identity of a query against a specific endpoint, used as the cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey(String);

impl QueryKey {
    pub fn new(url: &str, query: &RemoteQuery) -> Self {
        let groups: Map<String, Value> = query
            .groups()
            .into_iter()
            .map(|(name, value)| (name.to_string(), value))
            .collect();
        QueryKey(format!("{} {}", url, Value::Object(groups)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{SortDirection, SortSpec};
    use chrono::NaiveDate;

    fn state() -> QueryState {
        QueryState::new(10, Some(SortSpec::new("createdAt", SortDirection::Desc)))
    }

    fn param(params: &[(String, String)], name: &str) -> Option<Value> {
        params
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| serde_json::from_str(v).unwrap())
    }

    #[test]
    fn test_options_encode_page_and_sort() {
        let query = RemoteQuery::build(&state(), &Map::new(), &["customer".to_string()], &[]);
        let params = query.to_params();

        let options = param(&params, "options").unwrap();
        assert_eq!(
            options,
            json!({"limit": 10, "page": 1, "populate": ["customer"], "sort": {"createdAt": "desc"}})
        );
        assert!(param(&params, "search").is_none());
        assert!(param(&params, "filters").is_none());
        assert_eq!(param(&params, "query").unwrap(), json!({}));
    }

    #[test]
    fn test_static_filter_is_passed_verbatim() {
        let mut filter = Map::new();
        filter.insert("branch".to_string(), json!("north"));
        filter.insert("archived".to_string(), json!(false));
        let query = RemoteQuery::build(&state(), &filter, &[], &[]);

        assert_eq!(
            param(&query.to_params(), "query").unwrap(),
            json!({"branch": "north", "archived": false})
        );
    }

    #[test]
    fn test_search_and_date_filters() {
        let mut state = state();
        state.search_term = "acme corp".to_string();
        state.date_range = DateRange::new(NaiveDate::from_ymd_opt(2024, 1, 1), None);
        let query = RemoteQuery::build(&state, &Map::new(), &[], &["name".to_string()]);
        let params = query.to_params();

        assert_eq!(
            param(&params, "search").unwrap(),
            json!({"keyword": "acme corp", "fields": ["name"]})
        );
        assert_eq!(
            param(&params, "filters").unwrap(),
            json!({"startDate": "2024-01-01"})
        );
    }

    #[test]
    fn test_query_key_distinguishes_endpoint_and_state() {
        let a = RemoteQuery::build(&state(), &Map::new(), &[], &[]);
        let mut next = state();
        next.page = 2;
        let b = RemoteQuery::build(&next, &Map::new(), &[], &[]);

        assert_eq!(QueryKey::new("/sales", &a), QueryKey::new("/sales", &a.clone()));
        assert_ne!(QueryKey::new("/sales", &a), QueryKey::new("/sales", &b));
        assert_ne!(QueryKey::new("/sales", &a), QueryKey::new("/loans", &a));
    }
}
