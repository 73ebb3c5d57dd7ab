//! Data models for the book library

pub mod book;
pub mod category;
pub mod claims;
pub mod loan;
pub mod session;
pub mod user;

// Re-export commonly used types
pub use book::Book;
pub use category::Category;
pub use claims::{Claims, Role};
pub use loan::Loan;
pub use session::SessionRecord;
pub use user::User;
