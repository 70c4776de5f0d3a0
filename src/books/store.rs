use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, Error, StoreError};

pub const DEFAULT_LIMIT: u32 = 20;
pub const MAX_LIMIT: u32 = 100;
const MAX_PAGE: u32 = 1_000_000;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Book {
    pub id: u64,
    pub title: String,
    pub author: String,
    pub category: String,
    #[serde(default)]
    pub description: String,
    pub price_cents: u64,
    #[serde(default)]
    pub published_year: Option<u16>,
}

/// Filters and pagination for the book listing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BookQuery {
    pub category: Option<String>,
    pub search: Option<String>,
    /// 1-based.
    pub page: u32,
    pub limit: u32,
}

impl Default for BookQuery {
    fn default() -> Self {
        Self { category: None, search: None, page: 1, limit: DEFAULT_LIMIT }
    }
}

impl BookQuery {
    /// Reads `category`, `search`, `page` and `limit` from decoded query pairs.
    pub fn from_pairs(pairs: &HashMap<String, String>) -> Result<Self, ApiError> {
        let number = |key: &str, default: u32, max: u32| -> Result<u32, ApiError> {
            match pairs.get(key) {
                None => Ok(default),
                Some(raw) => raw.parse::<u32>()
                    .ok()
                    .filter(|n| (1..=max).contains(n))
                    .ok_or_else(|| ApiError::BadRequest(format!("`{key}` must be an integer between 1 and {max}"))),
            }
        };
        let text = |key: &str| pairs.get(key).map(|v| v.trim()).filter(|v| !v.is_empty()).map(str::to_owned);

        Ok(Self {
            category: text("category"),
            search: text("search"),
            page: number("page", 1, MAX_PAGE)?,
            limit: number("limit", DEFAULT_LIMIT, MAX_LIMIT)?,
        })
    }

    fn accepts(&self, book: &Book) -> bool {
        let category = self.category.as_deref()
            .is_none_or(|c| book.category.eq_ignore_ascii_case(c));
        let search = self.search.as_deref().is_none_or(|s| {
            let needle = s.to_lowercase();
            book.title.to_lowercase().contains(&needle) || book.author.to_lowercase().contains(&needle)
        });
        category && search
    }
}

/// One page of a listing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
    pub page: u32,
    pub limit: u32,
}

#[async_trait]
pub trait BookStore: Send + Sync + 'static {
    async fn list(&self, query: &BookQuery) -> Result<Page<Book>, StoreError>;
    async fn categories(&self) -> Result<Vec<String>, StoreError>;
    async fn count(&self) -> Result<usize, StoreError>;
    async fn get(&self, id: u64) -> Result<Option<Book>, StoreError>;
}

/// A fixed catalogue held in memory, ordered by id.
#[derive(Debug, Default)]
pub struct MemoryBookStore {
    books: Vec<Book>,
}

impl MemoryBookStore {
    pub fn new(mut books: Vec<Book>) -> Result<Self, Error> {
        books.sort_by_key(|b| b.id);
        let mut seen = HashSet::with_capacity(books.len());
        if let Some(dup) = books.iter().find(|b| !seen.insert(b.id)) {
            return Err(Error::DuplicateBookId(dup.id));
        }
        Ok(Self { books })
    }

    /// Loads a JSON array of books.
    pub fn from_json_file(path: &Path) -> Result<Self, Error> {
        let raw = std::fs::read(path)?;
        let books = serde_json::from_slice(&raw)
            .map_err(|source| Error::Catalog { path: path.to_owned(), source })?;
        Self::new(books)
    }
}

#[async_trait]
impl BookStore for MemoryBookStore {
    async fn list(&self, query: &BookQuery) -> Result<Page<Book>, StoreError> {
        let matching: Vec<&Book> = self.books.iter().filter(|b| query.accepts(b)).collect();
        let skip = (query.page.saturating_sub(1) as usize).saturating_mul(query.limit as usize);
        let items = matching.iter()
            .skip(skip)
            .take(query.limit as usize)
            .map(|b| (*b).clone())
            .collect();
        Ok(Page { items, total: matching.len(), page: query.page, limit: query.limit })
    }

    async fn categories(&self) -> Result<Vec<String>, StoreError> {
        let set: BTreeSet<&str> = self.books.iter().map(|b| b.category.as_str()).collect();
        Ok(set.into_iter().map(str::to_owned).collect())
    }

    async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.books.len())
    }

    async fn get(&self, id: u64) -> Result<Option<Book>, StoreError> {
        Ok(self.books.binary_search_by_key(&id, |b| b.id).ok().map(|i| self.books[i].clone()))
    }
}
