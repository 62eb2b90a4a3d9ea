//! Data models for LendingDesk
//!
//! People and resources are owned by external catalogs; the engine only
//! reads them (and flips resource availability through a provider).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of borrower
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq, Hash)]
#[sqlx(type_name = "person_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PersonType {
    Student,
    Teacher,
}

impl PersonType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PersonType::Student => "student",
            PersonType::Teacher => "teacher",
        }
    }
}

/// Borrower as seen by the engine
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct Person {
    pub id: Uuid,
    pub full_name: String,
    pub email: Option<String>,
    pub document_number: Option<String>,
    /// School grade, students only
    pub grade: Option<String>,
    pub person_type: PersonType,
    pub active: bool,
    pub has_penalty: bool,
    /// Maximum concurrent loans for this person's type
    pub max_loans: i32,
}

impl Person {
    /// Case-insensitive match against the display fields
    pub fn matches_search(&self, needle: &str) -> bool {
        contains_ci(&self.full_name, needle)
            || self.email.as_deref().is_some_and(|e| contains_ci(e, needle))
            || self
                .document_number
                .as_deref()
                .is_some_and(|d| contains_ci(d, needle))
    }
}

/// Current availability of a lendable resource
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "resource_availability", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Availability {
    Available,
    Borrowed,
    Lost,
}

/// Lendable resource (book, game, map...)
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct Resource {
    pub id: Uuid,
    pub title: String,
    pub resource_type: String,
    pub availability: Availability,
}

impl Resource {
    pub fn is_available(&self) -> bool {
        self.availability == Availability::Available
    }

    pub fn matches_search(&self, needle: &str) -> bool {
        contains_ci(&self.title, needle)
    }
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// API response wrapper
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

/// Pagination parameters
#[derive(Debug, Default, Deserialize, Clone, Copy)]
pub struct PaginationParams {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl PaginationParams {
    /// Resolve to (page, limit) with page >= 1 and 1 <= limit <= max_limit
    pub fn resolve(&self, default_limit: u32, max_limit: u32) -> (u32, u32) {
        let page = self.page.unwrap_or(1).max(1);
        let limit = self.limit.unwrap_or(default_limit).clamp(1, max_limit.max(1));
        (page, limit)
    }
}

/// Paginated response
#[derive(Debug, Serialize, Deserialize)]
pub struct PaginatedResponse<T> {
    pub data: Vec<T>,
    pub total: i64,
    pub page: u32,
    pub limit: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_defaults_and_clamping() {
        assert_eq!(PaginationParams::default().resolve(20, 100), (1, 20));

        let params = PaginationParams {
            page: Some(0),
            limit: Some(500),
        };
        assert_eq!(params.resolve(20, 100), (1, 100));
    }

    #[test]
    fn test_person_search_is_case_insensitive() {
        let person = Person {
            id: Uuid::new_v4(),
            full_name: "Ada Lovelace".to_string(),
            email: Some("ada@school.test".to_string()),
            document_number: Some("DOC-77".to_string()),
            grade: None,
            person_type: PersonType::Teacher,
            active: true,
            has_penalty: false,
            max_loans: 5,
        };
        assert!(person.matches_search("lovelace"));
        assert!(person.matches_search("SCHOOL.test"));
        assert!(person.matches_search("doc-7"));
        assert!(!person.matches_search("babbage"));
    }
}
