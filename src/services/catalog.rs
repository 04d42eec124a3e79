//! Catalog management service

use uuid::Uuid;

use crate::{
    config::LibraryConfig,
    error::AppResult,
    models::{Book, BookForm, ListQuery, Paginated},
    repository::Repository,
};

/// Number of suggestions shown next to a book
pub const SIMILAR_BOOKS: i64 = 4;

#[derive(Clone)]
pub struct CatalogService {
    repository: Repository,
    config: LibraryConfig,
}

impl CatalogService {
    pub fn new(repository: Repository, config: LibraryConfig) -> Self {
        Self { repository, config }
    }

    /// Search books with pagination
    pub async fn search_books(&self, query: &ListQuery) -> AppResult<Paginated<Book>> {
        let pagination = query.pagination(self.config.page_size);
        let (books, total) = self.repository.books.search(query, self.config.page_size).await?;
        Ok(Paginated::new(books, pagination, total))
    }

    pub async fn get_book(&self, id: Uuid) -> AppResult<Book> {
        self.repository.books.get_by_id(id).await
    }

    /// Books to suggest next to `id`, same genre first
    pub async fn similar_books(&self, id: Uuid) -> AppResult<Vec<Book>> {
        // 404 for an unknown book rather than an empty list
        self.repository.books.get_by_id(id).await?;
        self.repository.books.similar(id, SIMILAR_BOOKS).await
    }

    pub async fn create_book(&self, form: BookForm) -> AppResult<Book> {
        let form = form.normalized()?;
        let book = self.repository.books.create(&form).await?;
        tracing::info!("Book {} \"{}\" added with {} copies", book.id, book.title, book.total_copies);
        Ok(book)
    }

    pub async fn update_book(&self, id: Uuid, form: BookForm) -> AppResult<Book> {
        let form = form.normalized()?;
        let book = self.repository.books.update(id, &form).await?;
        tracing::info!(
            "Book {} updated: {}/{} copies available",
            id,
            book.available_copies,
            book.total_copies
        );
        Ok(book)
    }

    pub async fn delete_book(&self, id: Uuid) -> AppResult<()> {
        self.repository.books.delete(id).await?;
        tracing::info!("Book {} deleted", id);
        Ok(())
    }
}
