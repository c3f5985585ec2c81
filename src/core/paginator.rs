//! Pagination: validated page windows and the `{data, meta}` envelope

use crate::core::error::EngineError;
use serde::Serialize;
use serde::ser::{SerializeMap, Serializer};

/// A validated page request, both values at least 1
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageSpec {
    pub page: u64,
    pub page_size: u64,
}

impl PageSpec {
    /// Validate raw `page`/`page_size` query values.
    ///
    /// Both or neither must be present; a lone value is never defaulted.
    pub fn from_params(
        page: Option<&str>,
        page_size: Option<&str>,
    ) -> Result<Option<Self>, EngineError> {
        let (page, page_size) = match (page, page_size) {
            (None, None) => return Ok(None),
            (Some(_), None) => return Err(missing("page_size", "page")),
            (None, Some(_)) => return Err(missing("page", "page_size")),
            (Some(page), Some(page_size)) => (page, page_size),
        };

        let spec = Self {
            page: positive("page", page)?,
            page_size: positive("page_size", page_size)?,
        };

        // LIMIT/OFFSET are bound as signed 64-bit integers
        let fits = (spec.page - 1)
            .checked_mul(spec.page_size)
            .is_some_and(|offset| offset <= i64::MAX as u64);
        if !fits || spec.page_size > i64::MAX as u64 {
            return Err(EngineError::invalid_input(
                "page",
                "The 'page' parameter is too large for the requested 'page_size'.",
            ));
        }

        Ok(Some(spec))
    }

    /// Number of rows skipped before this page
    pub fn offset(&self) -> u64 {
        (self.page - 1) * self.page_size
    }

    pub fn limit(&self) -> u64 {
        self.page_size
    }

    /// Cut this page's window out of an already filtered and sorted list
    pub fn slice<T>(&self, rows: Vec<T>) -> Vec<T> {
        let offset = usize::try_from(self.offset()).unwrap_or(usize::MAX);
        let limit = usize::try_from(self.limit()).unwrap_or(usize::MAX);
        rows.into_iter().skip(offset).take(limit).collect()
    }
}

fn missing(absent: &str, present: &str) -> EngineError {
    EngineError::invalid_input(
        absent,
        format!(
            "The '{}' parameter must be present in the URI when '{}' is supplied.",
            absent, present
        ),
    )
}

fn positive(name: &str, raw: &str) -> Result<u64, EngineError> {
    let value: i64 = raw.trim().parse().map_err(|_| {
        EngineError::invalid_input(
            name,
            format!("The '{}' parameter must be a valid number.", name),
        )
    })?;
    if value < 1 {
        return Err(EngineError::invalid_input(
            name,
            format!("The '{}' parameter must be greater than zero.", name),
        ));
    }
    Ok(value as u64)
}

/// Pagination metadata returned with every listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageMeta {
    pub total_records: u64,
    pub page: u64,
    pub page_size: u64,
    pub total_pages: u64,
}

/// A page of rows with its metadata
#[derive(Debug, Clone, Serialize)]
pub struct Paginated<T> {
    pub data: Vec<T>,
    pub meta: PageMeta,
}

/// A page of rows that belong to one parent record.
///
/// Serializes as `{"<key>": parent, "data": [...], "meta": {...}}`, e.g. a
/// team's games under `"team"`.
#[derive(Debug, Clone)]
pub struct Nested<P, T> {
    pub key: &'static str,
    pub parent: P,
    pub data: Vec<T>,
    pub meta: PageMeta,
}

impl<P, T> Nested<P, T> {
    pub fn new(key: &'static str, parent: P, page: Paginated<T>) -> Self {
        Self {
            key,
            parent,
            data: page.data,
            meta: page.meta,
        }
    }
}

impl<P: Serialize, T: Serialize> Serialize for Nested<P, T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(3))?;
        map.serialize_entry(self.key, &self.parent)?;
        map.serialize_entry("data", &self.data)?;
        map.serialize_entry("meta", &self.meta)?;
        map.end()
    }
}

/// Builds page metadata for a listing.
///
/// Without a page request the whole result set is one page: `page = 1` and
/// `page_size = total_records`. A page past the end is not an error, it
/// simply carries no rows.
pub struct Paginator;

impl Paginator {
    pub fn meta(page: Option<PageSpec>, total_records: u64) -> PageMeta {
        match page {
            Some(spec) => PageMeta {
                total_records,
                page: spec.page,
                page_size: spec.page_size,
                total_pages: total_records.div_ceil(spec.page_size),
            },
            None => PageMeta {
                total_records,
                page: 1,
                page_size: total_records,
                total_pages: if total_records == 0 { 0 } else { 1 },
            },
        }
    }

    pub fn assemble<T>(rows: Vec<T>, total_records: u64, page: Option<PageSpec>) -> Paginated<T> {
        Paginated {
            data: rows,
            meta: Self::meta(page, total_records),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parameter(err: EngineError) -> String {
        match err {
            EngineError::InvalidInput { parameter, .. } => parameter,
            other => panic!("expected InvalidInput, got {:?}", other),
        }
    }

    #[test]
    fn test_neither_present_means_unpaged() {
        assert_eq!(PageSpec::from_params(None, None).unwrap(), None);
    }

    #[test]
    fn test_lone_page_is_invalid() {
        let err = PageSpec::from_params(Some("2"), None).unwrap_err();
        assert_eq!(parameter(err), "page_size");
        let err = PageSpec::from_params(None, Some("10")).unwrap_err();
        assert_eq!(parameter(err), "page");
    }

    #[test]
    fn test_non_numeric_and_zero_are_invalid() {
        let err = PageSpec::from_params(Some("two"), Some("10")).unwrap_err();
        assert!(err.to_string().contains("valid number"));
        let err = PageSpec::from_params(Some("1"), Some("0")).unwrap_err();
        assert!(err.to_string().contains("greater than zero"));
        assert_eq!(parameter(err), "page_size");
    }

    #[test]
    fn test_offset_and_limit() {
        let spec = PageSpec::from_params(Some("3"), Some("25")).unwrap().unwrap();
        assert_eq!(spec.offset(), 50);
        assert_eq!(spec.limit(), 25);
    }

    #[test]
    fn test_overflowing_offset_is_invalid() {
        let huge = i64::MAX.to_string();
        let err = PageSpec::from_params(Some(&huge), Some("2")).unwrap_err();
        assert_eq!(parameter(err), "page");
    }

    #[test]
    fn test_slice_past_the_end_is_empty() {
        let spec = PageSpec {
            page: 4,
            page_size: 2,
        };
        assert!(spec.slice(vec![1, 2, 3, 4, 5]).is_empty());
        let spec = PageSpec {
            page: 3,
            page_size: 2,
        };
        assert_eq!(spec.slice(vec![1, 2, 3, 4, 5]), vec![5]);
    }

    #[test]
    fn test_meta_total_pages_is_ceiling() {
        let meta = Paginator::meta(
            Some(PageSpec {
                page: 1,
                page_size: 10,
            }),
            21,
        );
        assert_eq!(meta.total_pages, 3);
    }

    #[test]
    fn test_nested_page_carries_its_parent() {
        let page = Paginator::assemble(vec![1, 2], 2, None);
        let nested = Nested::new("team", serde_json::json!({"team_id": 4}), page);
        let body = serde_json::to_value(&nested).unwrap();
        assert_eq!(body["team"]["team_id"], 4);
        assert_eq!(body["data"], serde_json::json!([1, 2]));
        assert_eq!(body["meta"]["total_records"], 2);
    }

    #[test]
    fn test_unpaged_meta_covers_everything() {
        let meta = Paginator::meta(None, 7);
        assert_eq!(meta.page, 1);
        assert_eq!(meta.page_size, 7);
        assert_eq!(meta.total_pages, 1);

        let empty = Paginator::meta(None, 0);
        assert_eq!(empty.page_size, 0);
        assert_eq!(empty.total_pages, 0);
    }
}
