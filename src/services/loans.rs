//! Loan management service
//!
//! A loan exists exactly while one copy of its book is out: opening a loan
//! decrements the book quantity and inserts the loan in one atomic step,
//! closing it deletes the loan and increments the quantity in one atomic
//! step. Both steps are delegated to a [`LoanStore`], which must push the
//! atomicity down to the shared storage (transaction plus conditional
//! update) rather than rely on an in-process lock.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    metrics::Metrics,
    models::{
        claims::{Claims, Role},
        loan::{Checkout, Loan, UpdateLoan},
    },
};

/// Roles allowed to borrow and return books
const BORROWER_ROLES: &[Role] = &[Role::User, Role::Admin];

#[async_trait]
pub trait LoanStore: Send + Sync {
    /// Decrement the book quantity if it is positive and insert `loan`, all or nothing
    async fn checkout(&self, loan: &Loan) -> AppResult<Checkout>;

    /// Delete the loan and increment its book quantity, all or nothing.
    /// `None` when the loan does not exist (anymore).
    async fn checkin(&self, loan_id: Uuid) -> AppResult<Option<Loan>>;

    async fn get_loan(&self, loan_id: Uuid) -> AppResult<Option<Loan>>;

    /// Overwrite quantity and return date; `false` when the loan is gone
    async fn update_loan(&self, loan: &Loan) -> AppResult<bool>;

    /// Every active loan, or only those of `user_id`
    async fn list_loans(&self, user_id: Option<Uuid>) -> AppResult<Vec<Loan>>;
}

#[derive(Clone)]
pub struct LoansService {
    store: Arc<dyn LoanStore>,
    metrics: Arc<dyn Metrics>,
    loan_period: Duration,
}

impl LoansService {
    pub fn new(store: Arc<dyn LoanStore>, metrics: Arc<dyn Metrics>, loan_period: Duration) -> Self {
        Self {
            store,
            metrics,
            loan_period,
        }
    }

    pub fn loan_period(&self) -> Duration {
        self.loan_period
    }

    /// Lend one copy of `book_id` to the caller
    pub async fn start_loan(&self, claims: &Claims, book_id: Uuid, now: DateTime<Utc>) -> AppResult<Loan> {
        claims.require_role(BORROWER_ROLES)?;

        let loan = Loan {
            id: Uuid::new_v4(),
            book_id,
            user_id: claims.user_id()?,
            quantity: 1,
            loan_date: now,
            return_date: now + self.loan_period,
        };

        match self.store.checkout(&loan).await? {
            Checkout::Opened(loan) => {
                self.metrics.increment("loans.started");
                tracing::info!(loan_id = %loan.id, book_id = %book_id, user_id = %loan.user_id, "Loan started");
                Ok(loan)
            }
            Checkout::BookNotFound => Err(AppError::NotFound(format!("Book {} not found", book_id))),
            Checkout::OutOfStock => {
                self.metrics.increment("loans.out_of_stock");
                Err(AppError::Conflict(format!("Book {} is out of stock", book_id)))
            }
        }
    }

    /// Give the copy back; returns the closed loan
    pub async fn end_loan(&self, claims: &Claims, loan_id: Uuid, now: DateTime<Utc>) -> AppResult<Loan> {
        claims.require_role(BORROWER_ROLES)?;

        let loan = self.find(loan_id).await?;
        claims.require_self_or_admin(&loan.user_id)?;

        let closed = self
            .store
            .checkin(loan_id)
            .await?
            .ok_or_else(|| not_found(loan_id))?;

        self.metrics.increment("loans.ended");
        tracing::info!(
            loan_id = %closed.id,
            book_id = %closed.book_id,
            overdue = now > closed.return_date,
            "Loan ended"
        );

        Ok(closed)
    }

    /// Apply the provided fields only; book inventory is left alone
    pub async fn update_loan(
        &self,
        claims: &Claims,
        loan_id: Uuid,
        patch: UpdateLoan,
        now: DateTime<Utc>,
    ) -> AppResult<Loan> {
        claims.require_admin()?;

        let mut loan = self.find(loan_id).await?;

        if let Some(delta) = patch.quantity {
            let quantity = loan.quantity.checked_add(delta).unwrap_or(0);
            if quantity < 1 {
                return Err(AppError::Validation(
                    "Loan quantity must stay at least 1".to_string(),
                ));
            }
            loan.quantity = quantity;
        }

        if let Some(return_date) = patch.return_date {
            if return_date <= now || return_date <= loan.loan_date {
                return Err(AppError::Validation(
                    "Return date must be in the future".to_string(),
                ));
            }
            loan.return_date = return_date;
        }

        if !self.store.update_loan(&loan).await? {
            return Err(not_found(loan_id));
        }

        Ok(loan)
    }

    pub async fn get_loan(&self, claims: &Claims, loan_id: Uuid) -> AppResult<Loan> {
        claims.require_role(BORROWER_ROLES)?;

        let loan = self.find(loan_id).await?;
        claims.require_self_or_admin(&loan.user_id)?;
        Ok(loan)
    }

    /// Admins see every loan, borrowers their own
    pub async fn list_loans(&self, claims: &Claims) -> AppResult<Vec<Loan>> {
        claims.require_role(BORROWER_ROLES)?;

        if claims.is_admin() {
            self.store.list_loans(None).await
        } else {
            self.store.list_loans(Some(claims.user_id()?)).await
        }
    }

    async fn find(&self, loan_id: Uuid) -> AppResult<Loan> {
        self.store
            .get_loan(loan_id)
            .await?
            .ok_or_else(|| not_found(loan_id))
    }
}

fn not_found(loan_id: Uuid) -> AppError {
    AppError::NotFound(format!("Loan {} not found", loan_id))
}
