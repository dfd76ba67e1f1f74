use crate::error::AppError;
use axum::{
    Json,
    http::{HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Serialize;

pub const DEFAULT_PAGE: i64 = 1;
pub const DEFAULT_LIMIT: i64 = 10;
/// Hard ceiling on page size. Without it a single request could pull the whole table.
pub const MAX_LIMIT: i64 = 100;

pub static TOTAL_COUNT_HEADER: HeaderName = HeaderName::from_static("x-total-count");

/// A validated page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: i64,
    pub limit: i64,
}

impl PageRequest {
    /// Parses the raw `page` / `limit` query values.
    ///
    /// Missing or empty values fall back to the defaults (1 and 10). Parse failures and
    /// range failures are both validation errors, just with different messages so the
    /// client can tell "that's not a number" from "that number is too small".
    pub fn plan(raw_page: Option<&str>, raw_limit: Option<&str>) -> Result<Self, AppError> {
        let page = parse_or(raw_page, DEFAULT_PAGE)
            .map_err(|_| AppError::validation("invalid page query"))?;
        let limit = parse_or(raw_limit, DEFAULT_LIMIT)
            .map_err(|_| AppError::validation("invalid limit query"))?;

        if page < 1 {
            return Err(AppError::validation("page value must be at least 1"));
        }
        if limit < 1 {
            return Err(AppError::validation("limit value must be at least 1"));
        }
        if limit > MAX_LIMIT {
            return Err(AppError::validation(format!(
                "limit value must be at most {MAX_LIMIT}"
            )));
        }

        Ok(Self { page, limit })
    }

    /// Rows to skip. Saturates rather than overflowing on absurd page numbers; such a
    /// page is simply empty.
    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }
}

fn parse_or(raw: Option<&str>, default: i64) -> Result<i64, std::num::ParseIntError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        Some(s) => s.parse(),
        None => Ok(default),
    }
}

/// One page of results plus the size of the whole (unpaged) result set.
///
/// Renders as:
/// - `204 No Content` when the slice is empty,
/// - `200 OK` with a JSON array otherwise,
///
/// and carries `x-total-count` either way. An empty page is not an error and not a 404.
#[derive(Debug)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
}

impl<T: Serialize> IntoResponse for Page<T> {
    fn into_response(self) -> Response {
        let total = HeaderValue::from(self.total);
        let mut response = if self.items.is_empty() {
            StatusCode::NO_CONTENT.into_response()
        } else {
            (StatusCode::OK, Json(self.items)).into_response()
        };
        response.headers_mut().insert(TOTAL_COUNT_HEADER.clone(), total);
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn defaults_when_absent_or_empty() {
        assert_eq!(PageRequest::plan(None, None).unwrap(), PageRequest { page: 1, limit: 10 });
        assert_eq!(
            PageRequest::plan(Some(""), Some("")).unwrap(),
            PageRequest { page: 1, limit: 10 }
        );
    }

    #[test]
    fn offset_skips_previous_pages() {
        let req = PageRequest::plan(Some("2"), Some("5")).unwrap();
        assert_eq!(req.offset(), 5);
        assert_eq!(PageRequest::plan(None, None).unwrap().offset(), 0);
    }

    #[rstest]
    #[case(Some("0"), Some("5"), "page value must be at least 1")]
    #[case(Some("-3"), None, "page value must be at least 1")]
    #[case(None, Some("0"), "limit value must be at least 1")]
    #[case(Some("abc"), Some("5"), "invalid page query")]
    #[case(Some("1"), Some("ten"), "invalid limit query")]
    #[case(Some("1.5"), None, "invalid page query")]
    #[case(None, Some("101"), "limit value must be at most 100")]
    fn rejects_bad_input(
        #[case] page: Option<&str>,
        #[case] limit: Option<&str>,
        #[case] message: &str,
    ) {
        match PageRequest::plan(page, limit) {
            Err(AppError::Validation(msg)) => assert_eq!(msg, message),
            other => panic!("expected a validation error, got {other:?}"),
        }
    }

    #[test]
    fn huge_page_number_does_not_overflow() {
        let req = PageRequest::plan(Some(&i64::MAX.to_string()), Some("100")).unwrap();
        assert_eq!(req.offset(), i64::MAX);
    }

    #[test]
    fn empty_page_is_no_content_with_count() {
        let response = Page::<u8> { items: vec![], total: 0 }.into_response();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(response.headers()[&TOTAL_COUNT_HEADER], "0");
    }

    #[test]
    fn empty_slice_still_reports_the_full_count() {
        // Page 9 of something that only has 3 rows.
        let response = Page::<u8> { items: vec![], total: 3 }.into_response();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(response.headers()[&TOTAL_COUNT_HEADER], "3");
    }

    #[test]
    fn non_empty_page_is_ok_with_count() {
        let response = Page { items: vec![1, 2], total: 12 }.into_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[&TOTAL_COUNT_HEADER], "12");
    }
}
