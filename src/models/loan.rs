//! Loan model and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// Active loan. The row exists exactly as long as the book copy is out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Loan {
    #[sqlx(rename = "loan_id")]
    pub id: Uuid,
    pub book_id: Uuid,
    pub user_id: Uuid,
    /// Copies held under this loan
    pub quantity: i32,
    pub loan_date: DateTime<Utc>,
    pub return_date: DateTime<Utc>,
}

/// Create loan request
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateLoan {
    pub book_id: Uuid,
}

/// Partial loan update; book inventory is never touched
#[derive(Debug, Default, Clone, Deserialize, ToSchema)]
pub struct UpdateLoan {
    /// Added to the loan's quantity
    pub quantity: Option<i32>,
    pub return_date: Option<DateTime<Utc>>,
}

/// Result of the atomic check-and-decrement performed when a loan opens
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Checkout {
    Opened(Loan),
    BookNotFound,
    OutOfStock,
}
