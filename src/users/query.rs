use serde::Deserialize;

/// Columns eligible for free-text matching.
pub const SEARCHABLE_FIELDS: &[&str] = &["name", "email", "phone", "address", "roll"];

/// Columns a caller may sort on.
const SORTABLE_FIELDS: &[&str] = &[
    "name",
    "email",
    "phone",
    "role",
    "roll",
    "gender",
    "address",
    "joined_on",
    "created_at",
];

pub const DEFAULT_PAGE: i64 = 1;
pub const DEFAULT_LIMIT: i64 = 10;
const MAX_LIMIT: i64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_sql(self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "asc" => Some(SortDirection::Asc),
            "desc" => Some(SortDirection::Desc),
            _ => None,
        }
    }
}

/// Raw query-string parameters of the list endpoint.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    pub search_term: Option<String>,
    pub roll: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

/// Normalized search input: defaults applied, sort column whitelisted,
/// exact filters collected as (column, value) pairs.
#[derive(Debug)]
pub struct ResolvedSearch {
    pub search_term: Option<String>,
    pub filters: Vec<(&'static str, String)>,
    pub page: i64,
    pub limit: i64,
    pub offset: i64,
    pub sort: Option<(&'static str, SortDirection)>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

impl ListQuery {
    pub fn resolve(self) -> ResolvedSearch {
        let page = self.page.unwrap_or(DEFAULT_PAGE).max(1);
        let limit = self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
        let offset = (page - 1) * limit;

        let mut filters = Vec::new();
        if let Some(roll) = non_empty(self.roll) {
            filters.push(("roll", roll));
        }
        if let Some(phone) = non_empty(self.phone) {
            filters.push(("phone", phone));
        }
        if let Some(email) = non_empty(self.email) {
            filters.push(("email", email));
        }

        // Sort applies only when both parts are present and valid.
        let sort = match (self.sort_by.as_deref(), self.sort_order.as_deref()) {
            (Some(by), Some(order)) => SORTABLE_FIELDS
                .iter()
                .find(|field| **field == by)
                .copied()
                .zip(SortDirection::parse(order)),
            _ => None,
        };

        ResolvedSearch {
            search_term: non_empty(self.search_term),
            filters,
            page,
            limit,
            offset,
            sort,
        }
    }
}
