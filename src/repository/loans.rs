//! Loans repository for database operations
//!
//! Checkout and checkin each run in one transaction. The stock decrement is
//! a conditional update, so two server instances racing for the last copy
//! are serialized by the row lock and the loser sees zero rows affected.

use async_trait::async_trait;
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::loan::{Checkout, Loan},
    services::loans::LoanStore,
};

#[derive(Clone)]
pub struct LoansRepository {
    pool: Pool<Postgres>,
}

impl LoansRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LoanStore for LoansRepository {
    async fn checkout(&self, loan: &Loan) -> AppResult<Checkout> {
        let mut tx = self.pool.begin().await?;

        let taken = sqlx::query(
            "UPDATE books SET quantity = quantity - 1, date_updated = NOW() WHERE book_id = $1 AND quantity > 0",
        )
        .bind(loan.book_id)
        .execute(&mut *tx)
        .await?;

        if taken.rows_affected() == 0 {
            let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM books WHERE book_id = $1)")
                .bind(loan.book_id)
                .fetch_one(&mut *tx)
                .await?;
            tx.rollback().await?;

            return Ok(if exists {
                Checkout::OutOfStock
            } else {
                Checkout::BookNotFound
            });
        }

        let opened = sqlx::query_as::<_, Loan>(
            r#"
            INSERT INTO loans (loan_id, book_id, user_id, quantity, loan_date, return_date)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(loan.id)
        .bind(loan.book_id)
        .bind(loan.user_id)
        .bind(loan.quantity)
        .bind(loan.loan_date)
        .bind(loan.return_date)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Checkout::Opened(opened))
    }

    async fn checkin(&self, loan_id: Uuid) -> AppResult<Option<Loan>> {
        let mut tx = self.pool.begin().await?;

        let closed = sqlx::query_as::<_, Loan>("DELETE FROM loans WHERE loan_id = $1 RETURNING *")
            .bind(loan_id)
            .fetch_optional(&mut *tx)
            .await?;

        let Some(closed) = closed else {
            tx.rollback().await?;
            return Ok(None);
        };

        sqlx::query("UPDATE books SET quantity = quantity + 1, date_updated = NOW() WHERE book_id = $1")
            .bind(closed.book_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(Some(closed))
    }

    async fn get_loan(&self, loan_id: Uuid) -> AppResult<Option<Loan>> {
        let loan = sqlx::query_as::<_, Loan>("SELECT * FROM loans WHERE loan_id = $1")
            .bind(loan_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(loan)
    }

    async fn update_loan(&self, loan: &Loan) -> AppResult<bool> {
        let result = sqlx::query("UPDATE loans SET quantity = $2, return_date = $3 WHERE loan_id = $1")
            .bind(loan.id)
            .bind(loan.quantity)
            .bind(loan.return_date)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_loans(&self, user_id: Option<Uuid>) -> AppResult<Vec<Loan>> {
        let loans = sqlx::query_as::<_, Loan>(
            "SELECT * FROM loans WHERE ($1::uuid IS NULL OR user_id = $1) ORDER BY loan_date",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(loans)
    }
}
