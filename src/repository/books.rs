//! Books repository for database operations

use chrono::Utc;
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::book::{Book, CreateBook, UpdateBook},
};

use super::constraint_error;

#[derive(Clone)]
pub struct BooksRepository {
    pool: Pool<Postgres>,
}

impl BooksRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    pub async fn get_by_id(&self, id: Uuid) -> AppResult<Book> {
        sqlx::query_as::<_, Book>("SELECT * FROM books WHERE book_id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))
    }

    /// List books, optionally filtered by a case-insensitive title fragment
    pub async fn search(&self, title: Option<&str>) -> AppResult<Vec<Book>> {
        let pattern = title.map(|t| format!("%{}%", t.to_lowercase()));

        let books = sqlx::query_as::<_, Book>(
            r#"
            SELECT * FROM books
            WHERE ($1::text IS NULL OR LOWER(title) LIKE $1)
            ORDER BY title
            "#,
        )
        .bind(pattern)
        .fetch_all(&self.pool)
        .await?;

        Ok(books)
    }

    pub async fn create(&self, book: &CreateBook) -> AppResult<Book> {
        let book = sqlx::query_as::<_, Book>(
            r#"
            INSERT INTO books (book_id, title, isbn, category, description, authors, quantity, date_created, date_updated)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&book.title)
        .bind(&book.isbn)
        .bind(&book.category)
        .bind(&book.description)
        .bind(&book.authors)
        .bind(book.quantity)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| constraint_error(e, "Book"))?;

        Ok(book)
    }

    /// Update the provided fields only
    pub async fn update(&self, id: Uuid, book: &UpdateBook) -> AppResult<Book> {
        sqlx::query_as::<_, Book>(
            r#"
            UPDATE books SET
                description = COALESCE($2, description),
                authors = COALESCE($3, authors),
                category = COALESCE($4, category),
                quantity = COALESCE($5, quantity),
                date_updated = $6
            WHERE book_id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&book.description)
        .bind(&book.authors)
        .bind(&book.category)
        .bind(book.quantity)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| constraint_error(e, "Book"))?
        .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))
    }

    /// Delete a book; refused while copies are on loan
    pub async fn delete(&self, id: Uuid) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM books WHERE book_id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| constraint_error(e, "Book"))?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Book with id {} not found", id)));
        }
        Ok(())
    }
}
