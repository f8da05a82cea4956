//! Splitting listings into fixed-size pages.
//!
//! Out-of-range requests never fail: garbage and numbers below one show
//! the first page, numbers past the end show the last page.

use serde::Serialize;
use std::num::NonZeroU64;

pub const DEFAULT_PAGE_SIZE: NonZeroU64 = NonZeroU64::new(10).unwrap();

/// A one-based page number as asked for by a client.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash)]
pub struct PageRequest(NonZeroU64);

impl PageRequest {
    pub const FIRST: Self = Self(NonZeroU64::MIN);

    #[must_use]
    pub fn new(number: u64) -> Self {
        NonZeroU64::new(number).map_or(Self::FIRST, Self)
    }

    /// Reads the raw `?page=` query value.
    #[must_use]
    pub fn parse(raw: Option<&str>) -> Self {
        raw.and_then(|raw| raw.trim().parse::<u64>().ok())
            .map_or(Self::FIRST, Self::new)
    }

    #[must_use]
    pub fn number(self) -> u64 {
        self.0.get()
    }

    #[must_use]
    pub fn resolve(self, total: u64, page_size: NonZeroU64) -> PageWindow {
        let num_pages = total.div_ceil(page_size.get()).max(1);
        let number = self.number().min(num_pages);

        PageWindow {
            number,
            num_pages,
            offset: (number - 1) * page_size.get(),
            limit: page_size.get(),
        }
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::FIRST
    }
}

/// The slice of a listing one page covers.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash)]
pub struct PageWindow {
    pub number: u64,
    pub num_pages: u64,
    pub offset: u64,
    pub limit: u64,
}

impl PageWindow {
    /// Index range into a fully materialized listing of `total` items.
    #[must_use]
    pub fn range(self, total: usize) -> std::ops::Range<usize> {
        let start = usize::try_from(self.offset).unwrap_or(usize::MAX).min(total);
        let len = usize::try_from(self.limit).unwrap_or(usize::MAX);
        start..start.saturating_add(len).min(total)
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub number: u64,
    pub num_pages: u64,
    pub total: u64,
    pub has_previous: bool,
    pub has_next: bool,
    pub previous_number: Option<u64>,
    pub next_number: Option<u64>,
}

impl<T> Page<T> {
    #[must_use]
    pub fn new(items: Vec<T>, window: PageWindow, total: u64) -> Self {
        Self {
            items,
            number: window.number,
            num_pages: window.num_pages,
            total,
            has_previous: window.number > 1,
            has_next: window.number < window.num_pages,
            previous_number: (window.number > 1).then(|| window.number - 1),
            next_number: (window.number < window.num_pages).then(|| window.number + 1),
        }
    }

    #[must_use]
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            number: self.number,
            num_pages: self.num_pages,
            total: self.total,
            has_previous: self.has_previous,
            has_next: self.has_next,
            previous_number: self.previous_number,
            next_number: self.next_number,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
