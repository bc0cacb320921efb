//! Request handlers and the shared list-query parsing.

pub mod domains;
pub mod health;
pub mod menus;
pub mod policy;

use serde::Deserialize;

use highway_core::types::{OrderField, PaginationParam, QueryOptions, Status};
use highway_core::HighwayError;

/// Query string accepted by every list endpoint.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    pub current: Option<u32>,
    pub page_size: Option<u32>,
    /// `false` returns every match without paging.
    pub pagination: Option<bool>,
    pub query_value: Option<String>,
    pub status: Option<i32>,
    /// Comma-separated ids.
    pub ids: Option<String>,
    /// `name:desc,id`
    pub order_by: Option<String>,
    /// Comma-separated field names.
    pub fields: Option<String>,
    pub parent_id: Option<u64>,
}

impl ListQuery {
    pub fn pagination(&self) -> PaginationParam {
        let defaults = PaginationParam::default();
        PaginationParam {
            pagination: self.pagination.unwrap_or(true),
            only_count: false,
            current: self.current.unwrap_or(defaults.current),
            page_size: self.page_size.unwrap_or(defaults.page_size),
        }
    }

    pub fn ids(&self) -> Result<Vec<u64>, HighwayError> {
        split_list(self.ids.as_deref())
            .map(|s| {
                s.parse()
                    .map_err(|_| HighwayError::InvalidInput(format!("ids: '{s}' is not an id")))
            })
            .collect()
    }

    pub fn status(&self) -> Result<Option<Status>, HighwayError> {
        self.status
            .map(|v| {
                Status::from_i32(v)
                    .ok_or_else(|| HighwayError::InvalidInput(format!("status must be 1 or 2, got {v}")))
            })
            .transpose()
    }

    pub fn options(&self) -> Result<QueryOptions, HighwayError> {
        Ok(QueryOptions {
            order_fields: match self.order_by.as_deref() {
                Some(s) => OrderField::parse_list(s)?,
                None => Vec::new(),
            },
            select_fields: split_list(self.fields.as_deref())
                .map(str::to_string)
                .collect(),
        })
    }

    pub fn query_value(&self) -> Option<String> {
        self.query_value.clone().filter(|q| !q.is_empty())
    }
}

fn split_list(raw: Option<&str>) -> impl Iterator<Item = &str> {
    raw.unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use highway_core::types::OrderDirection;
    use pretty_assertions::assert_eq;

    #[test]
    fn list_query_maps_to_core_params() {
        let q = ListQuery {
            current: Some(2),
            page_size: Some(5),
            ids: Some("3, 1,".into()),
            order_by: Some("name:desc,id".into()),
            fields: Some("id,name".into()),
            status: Some(2),
            ..ListQuery::default()
        };
        assert_eq!(q.pagination(), PaginationParam::page(2, 5));
        assert_eq!(q.ids().unwrap(), vec![3, 1]);
        assert_eq!(q.status().unwrap(), Some(Status::Disabled));
        let opts = q.options().unwrap();
        assert_eq!(opts.order_fields[0], OrderField::new("name", OrderDirection::Desc));
        assert_eq!(opts.select_fields, vec!["id", "name"]);
    }

    #[test]
    fn bad_values_are_invalid_input() {
        let q = ListQuery {
            ids: Some("1,x".into()),
            status: Some(3),
            ..ListQuery::default()
        };
        assert!(matches!(q.ids(), Err(HighwayError::InvalidInput(_))));
        assert!(matches!(q.status(), Err(HighwayError::InvalidInput(_))));
    }
}
