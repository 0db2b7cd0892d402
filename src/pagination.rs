use serde::Deserialize;
use utoipa::IntoParams;

pub const MAX_PAGE_SIZE: u64 = 1000;

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct Pagination {
    #[param(default = 0, minimum = 0)]
    pub skip: Option<u64>,
    #[param(default = 100, minimum = 1, maximum = 1000)]
    pub limit: Option<u64>,
}

impl Pagination {
    pub fn offset(&self) -> u64 {
        self.skip.unwrap_or(0)
    }

    /// Requested page size, falling back to `default` and capped at [`MAX_PAGE_SIZE`].
    pub fn limit(&self, default: u64) -> u64 {
        self.limit.unwrap_or(default).clamp(1, MAX_PAGE_SIZE)
    }
}
