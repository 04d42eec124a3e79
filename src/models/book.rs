//! Book (catalog entry) model and the admin book form

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};

static HEX_COLOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^#([0-9a-fA-F]{3}|[0-9a-fA-F]{6})$").expect("valid hex color regex"));

/// Book as stored in the catalog
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Book {
    pub id: Uuid,
    pub title: String,
    pub author: String,
    pub genre: String,
    pub rating: i32,
    pub total_copies: i32,
    /// Always within `0..=total_copies`
    pub available_copies: i32,
    pub description: String,
    pub cover_color: String,
    /// Asset path, resolved against the configured URL endpoint
    pub cover_url: String,
    pub video_url: String,
    pub summary: String,
    pub created_at: DateTime<Utc>,
}

/// Create/edit book request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct BookForm {
    #[validate(length(min = 2, max = 100, message = "Title must be between 2 and 100 characters."))]
    pub title: String,
    #[validate(length(min = 2, max = 100, message = "Author must be between 2 and 100 characters."))]
    pub author: String,
    #[validate(length(min = 2, max = 50, message = "Category must be between 2 and 50 characters."))]
    pub genre: String,
    #[validate(range(min = 1, max = 5, message = "Rating must be between 1 and 5."))]
    pub rating: i32,
    #[validate(range(min = 1, max = 10000, message = "Quantity must be between 1 and 10,000."))]
    pub total_copies: i32,
    #[validate(length(min = 10, max = 500, message = "Description must be between 10 and 500 characters."))]
    pub description: String,
    #[validate(length(min = 1, message = "Uploading a cover image is required"))]
    pub cover_url: String,
    pub cover_color: String,
    #[validate(length(min = 1, message = "Uploading a video is required"))]
    pub video_url: String,
    #[validate(length(min = 10, message = "Summary must be at least 10 characters."))]
    pub summary: String,
}

impl BookForm {
    /// Trim text fields, then run every field rule
    pub fn normalized(mut self) -> AppResult<Self> {
        self.title = self.title.trim().to_string();
        self.author = self.author.trim().to_string();
        self.genre = self.genre.trim().to_string();
        self.description = self.description.trim().to_string();
        self.cover_color = self.cover_color.trim().to_string();
        self.summary = self.summary.trim().to_string();

        self.validate()?;

        if !HEX_COLOR.is_match(&self.cover_color) {
            return Err(AppError::Validation(
                "Cover color must be a valid hex color code.".to_string(),
            ));
        }

        Ok(self)
    }
}

/// Copies available after changing a book's total, keeping loaned copies out.
/// Fails when the new total is below the number of copies on loan.
pub fn recompute_available(old_total: i32, old_available: i32, new_total: i32) -> AppResult<i32> {
    let borrowed = old_total - old_available;
    if new_total < borrowed {
        return Err(AppError::Validation(format!(
            "Total copies cannot be lower than the {} copies currently borrowed",
            borrowed
        )));
    }
    Ok(new_total - borrowed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form() -> BookForm {
        BookForm {
            title: "  The Pragmatic Programmer ".to_string(),
            author: "Hunt & Thomas".to_string(),
            genre: "Software".to_string(),
            rating: 5,
            total_copies: 3,
            description: "A classic about the craft of programming.".to_string(),
            cover_url: "/books/covers/pragmatic.jpg".to_string(),
            cover_color: "#c4a2f1".to_string(),
            video_url: "/books/videos/pragmatic.mp4".to_string(),
            summary: "Tips for becoming a better programmer.".to_string(),
        }
    }

    #[test]
    fn test_valid_form_is_trimmed() {
        let f = form().normalized().unwrap();
        assert_eq!(f.title, "The Pragmatic Programmer");
    }

    #[test]
    fn test_rating_out_of_range() {
        let mut f = form();
        f.rating = 6;
        assert!(matches!(f.normalized(), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_short_hex_color_accepted() {
        let mut f = form();
        f.cover_color = "#fff".to_string();
        assert!(f.normalized().is_ok());
    }

    #[test]
    fn test_invalid_hex_color() {
        let mut f = form();
        f.cover_color = "purple".to_string();
        match f.normalized() {
            Err(AppError::Validation(msg)) => assert!(msg.contains("hex color")),
            other => panic!("unexpected result: {:?}", other.map(|f| f.title)),
        }
    }

    #[test]
    fn test_missing_video_rejected() {
        let mut f = form();
        f.video_url = String::new();
        assert!(f.normalized().is_err());
    }

    #[test]
    fn test_recompute_available_keeps_loans() {
        // 5 total, 2 on loan -> raising to 8 leaves 6 on the shelf
        assert_eq!(recompute_available(5, 3, 8).unwrap(), 6);
        assert_eq!(recompute_available(5, 3, 2).unwrap(), 0);
        assert!(recompute_available(5, 3, 1).is_err());
    }
}
