//! Book model and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Book from the catalog; `quantity` is the number of copies on the shelf
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Book {
    #[sqlx(rename = "book_id")]
    pub id: Uuid,
    pub title: String,
    pub isbn: String,
    pub category: String,
    pub description: String,
    pub authors: String,
    pub quantity: i32,
    pub date_created: DateTime<Utc>,
    pub date_updated: DateTime<Utc>,
}

/// Create book request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateBook {
    #[validate(length(min = 1, message = "Title is required"))]
    pub title: String,
    #[validate(length(min = 10, max = 17, message = "ISBN must be 10 to 17 characters"))]
    pub isbn: String,
    pub category: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub authors: String,
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: i32,
}

/// Update book request
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateBook {
    pub description: Option<String>,
    pub authors: Option<String>,
    pub category: Option<String>,
    #[validate(range(min = 0, message = "Quantity cannot be negative"))]
    pub quantity: Option<i32>,
}

/// Book search parameters
#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct BookQuery {
    pub title: Option<String>,
}
