use rocket::{
    http::Status,
    request::{self, FromRequest, Request},
};
use serde::Serialize;

pub const DEFAULT_PAGE_SIZE: u64 = 50;
pub const MAX_PAGE_SIZE: u64 = 200;

/// Which page of a listing to return, from the `page_num` and `page_size`
/// query parameters. Pages are numbered from 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    page_num: u64,
    page_size: u64,
}

impl Pagination {
    /// Fails if the page is out of range, including pages so far along that
    /// their offset would not fit in a database skip.
    pub fn new(page_num: u64, page_size: u64) -> Option<Self> {
        if page_num < 1 || !(1..=MAX_PAGE_SIZE).contains(&page_size) {
            return None;
        }
        let skip = (page_num - 1).checked_mul(page_size)?;
        i64::try_from(skip).ok()?;
        Some(Self {
            page_num,
            page_size,
        })
    }

    pub fn page_num(&self) -> u64 {
        self.page_num
    }

    pub fn page_size(&self) -> u64 {
        self.page_size
    }

    /// Number of items before this page.
    pub fn skip(&self) -> u64 {
        (self.page_num - 1) * self.page_size
    }

    pub fn result(self, total: u64) -> PaginationResult {
        PaginationResult {
            page_num: self.page_num,
            page_size: self.page_size,
            total,
        }
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page_num: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for Pagination {
    type Error = ();

    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        let Ok(page_num) = req.query_value::<u64>("page_num").unwrap_or(Ok(1)) else {
            return request::Outcome::Error((Status::BadRequest, ()));
        };
        let Ok(page_size) = req
            .query_value::<u64>("page_size")
            .unwrap_or(Ok(DEFAULT_PAGE_SIZE))
        else {
            return request::Outcome::Error((Status::BadRequest, ()));
        };
        match Self::new(page_num, page_size) {
            Some(pagination) => request::Outcome::Success(pagination),
            None => request::Outcome::Error((Status::BadRequest, ())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationResult {
    page_num: u64,
    page_size: u64,
    total: u64,
}

/// One page of a listing.
#[derive(Debug, Serialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub pagination: PaginationResult,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounds_are_enforced() {
        assert!(Pagination::new(0, 10).is_none());
        assert!(Pagination::new(1, 0).is_none());
        assert!(Pagination::new(1, MAX_PAGE_SIZE + 1).is_none());
        assert!(Pagination::new(1, MAX_PAGE_SIZE).is_some());
    }

    #[test]
    fn far_pages_are_refused_instead_of_overflowing() {
        assert!(Pagination::new(u64::MAX, MAX_PAGE_SIZE).is_none());
        assert!(Pagination::new(u64::MAX / 2, 2).is_none());

        let last = i64::MAX as u64 / MAX_PAGE_SIZE + 1;
        let pagination = Pagination::new(last, MAX_PAGE_SIZE).unwrap();
        assert!(pagination.skip() <= i64::MAX as u64);
    }

    #[test]
    fn skip_counts_whole_pages() {
        assert_eq!(Pagination::default().skip(), 0);
        assert_eq!(Pagination::new(3, 20).unwrap().skip(), 40);
    }
}
