//! Book request handlers.

use crate::app::{Count, state};
use crate::error::ApiError;
use crate::request::Request;
use crate::response::Json;

use super::store::{Book, BookQuery, Page};

/// `GET /books`: paginated listing filtered by `category` and `search`.
pub async fn list_books(req: Request) -> Result<Json<Page<Book>>, ApiError> {
    let query = BookQuery::from_pairs(&req.query_pairs())?;
    let page = state(&req)?.books.list(&query).await?;
    Ok(Json(page))
}

#[derive(serde::Serialize)]
pub struct Categories {
    pub categories: Vec<String>,
}

/// `GET /books/categories`
pub async fn list_categories(req: Request) -> Result<Json<Categories>, ApiError> {
    let categories = state(&req)?.books.categories().await?;
    Ok(Json(Categories { categories }))
}

/// `GET /books/number`
pub async fn count_books(req: Request) -> Result<Json<Count>, ApiError> {
    let count = state(&req)?.books.count().await?;
    Ok(Json(Count { count }))
}

/// `GET /books/:id`
pub async fn get_book(req: Request) -> Result<Json<Book>, ApiError> {
    let raw = req.param("id").unwrap_or_default();
    let id: u64 = raw.parse()
        .map_err(|_| ApiError::BadRequest(format!("book id `{raw}` is not a number")))?;
    state(&req)?.books.get(id).await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("book {id} not found")))
}

#[cfg(test)]
mod tests {
    use super::super::store::tests::catalogue;
    use crate::app::tests::state_with;
    use crate::books::routes;
    use crate::router::Router;
    use crate::books::MemoryBookStore;
    use bytes::Bytes;
    use http::StatusCode;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use serde_json::{Value, json};

    fn router(books: MemoryBookStore) -> Router {
        Router::builder()
            .mount("/books", routes())
            .extension(state_with(books))
            .build()
            .unwrap()
    }

    async fn get(router: &Router, uri: &str) -> (StatusCode, Value) {
        let resp = router.handle(http::Request::get(uri).body(Bytes::new()).unwrap()).await;
        (resp.status_code(), serde_json::from_slice(resp.body()).unwrap())
    }

    #[rstest]
    #[tokio::test]
    async fn count_and_categories_are_not_ids(catalogue: MemoryBookStore) {
        let router = router(catalogue);
        assert_eq!(get(&router, "/books/number").await, (StatusCode::OK, json!({ "count": 4 })));
        assert_eq!(
            get(&router, "/books/categories").await,
            (StatusCode::OK, json!({ "categories": ["Classics", "Fantasy", "Science Fiction"] }))
        );
    }

    #[rstest]
    #[case("/books/1", StatusCode::OK)]
    #[case("/books/99", StatusCode::NOT_FOUND)]
    #[case("/books/abc", StatusCode::BAD_REQUEST)]
    #[case("/books?limit=0", StatusCode::BAD_REQUEST)]
    #[case("/books/?category=fantasy", StatusCode::OK)]
    #[tokio::test]
    async fn statuses(catalogue: MemoryBookStore, #[case] uri: &str, #[case] expected: StatusCode) {
        assert_eq!(get(&router(catalogue), uri).await.0, expected);
    }

    #[rstest]
    #[tokio::test]
    async fn listing_shape(catalogue: MemoryBookStore) {
        let (_, body) = get(&router(catalogue), "/books?search=dune").await;
        assert_eq!(body["total"], 1);
        assert_eq!(body["page"], 1);
        assert_eq!(body["limit"], 20);
        assert_eq!(body["items"][0]["title"], "Dune");
    }
}
