//! Catalog input validation and the starter catalog.

use crate::db::Database;
use crate::error::{AppError, Result};
use serde::Deserialize;

/// Book fields accepted on create and update.
#[derive(Debug, Clone, Deserialize)]
pub struct BookInput {
    /// Book title.
    pub title: String,
    /// Author name.
    pub author: String,
    /// Publication year.
    pub year: i32,
    /// Summary.
    #[serde(default)]
    pub description: Option<String>,
    /// Cover image link.
    #[serde(default)]
    pub cover_url: Option<String>,
    /// Link to a readable copy.
    #[serde(default)]
    pub pdf_url: Option<String>,
}

impl BookInput {
    /// Trim fields, drop blank optionals and check required ones.
    pub fn validated(self) -> Result<Self> {
        let title = self.title.trim().to_string();
        let author = self.author.trim().to_string();

        if title.is_empty() {
            return Err(AppError::Validation("Title is required".to_string()));
        }
        if author.is_empty() {
            return Err(AppError::Validation("Author is required".to_string()));
        }
        if !(-5000..=9999).contains(&self.year) {
            return Err(AppError::Validation(format!(
                "Year out of range: {}",
                self.year
            )));
        }

        Ok(Self {
            title,
            author,
            year: self.year,
            description: non_blank(self.description),
            cover_url: non_blank(self.cover_url),
            pdf_url: non_blank(self.pdf_url),
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// (title, author, year, cover_url, pdf_url)
const STARTER_CATALOG: &[(&str, &str, i32, &str, &str)] = &[
    (
        "Romeo and Juliet",
        "William Shakespeare",
        1597,
        "https://m.media-amazon.com/images/I/61LQf6GWT4L.jpg",
        "https://www.pdfbooksworld.com/bibi/pre.html?book=52.epub",
    ),
    (
        "The Call Of The Wild",
        "Jack London",
        1903,
        "https://www.pdfbooksworld.com/image/cache/catalog/51-250x350.jpg",
        "https://www.pdfbooksworld.com/bibi/pre.html?book=51.epub",
    ),
    (
        "Anna Karenina",
        "Leo Tolstoy",
        1878,
        "https://www.pdfbooksworld.com/image/cache/catalog/60-500x500.jpg",
        "https://www.pdfbooksworld.com/bibi/pre.html?book=60.epub",
    ),
    (
        "The War of the Worlds",
        "H. G. Wells",
        1898,
        "https://www.pdfbooksworld.com/image/cache/catalog/66-500x500.jpg",
        "https://www.pdfbooksworld.com/bibi/pre.html?book=66.epub",
    ),
    (
        "The Adventures of Sherlock Holmes",
        "Arthur Conan Doyle",
        1892,
        "https://www.pdfbooksworld.com/image/cache/catalog/54-250x350.jpg",
        "https://www.pdfbooksworld.com/bibi/pre.html?book=54.epub",
    ),
    (
        "The Little Lady of the Big House",
        "Jack London",
        1915,
        "https://www.pdfbooksworld.com/image/cache/catalog/57-250x350.jpg",
        "https://www.pdfbooksworld.com/bibi/pre.html?book=57.epub",
    ),
    (
        "A Tale of Two Cities",
        "Charles Dickens",
        1859,
        "https://www.pdfbooksworld.com/image/cache/catalog/67-250x350.jpg",
        "https://www.pdfbooksworld.com/bibi/pre.html?book=67.epub",
    ),
    (
        "Peter and Wendy",
        "J. M. Barrie",
        1911,
        "https://www.pdfbooksworld.com/image/cache/catalog/59-250x350.jpg",
        "https://www.pdfbooksworld.com/bibi/pre.html?book=59.epub",
    ),
];

/// Books shipped with `libris book seed`.
pub fn starter_catalog() -> Vec<BookInput> {
    STARTER_CATALOG
        .iter()
        .map(|(title, author, year, cover, pdf)| BookInput {
            title: title.to_string(),
            author: author.to_string(),
            year: *year,
            description: None,
            cover_url: Some(cover.to_string()),
            pdf_url: Some(pdf.to_string()),
        })
        .collect()
}

/// Insert starter books whose title is not in the catalog yet.
/// Returns the number of books added.
pub fn seed(db: &Database) -> Result<usize> {
    let mut added = 0;
    for book in starter_catalog() {
        if db.find_book_by_title(&book.title)?.is_some() {
            continue;
        }
        db.create_book(&book)?;
        added += 1;
    }

    tracing::info!(added, "Seeded starter catalog");
    Ok(added)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(title: &str, author: &str) -> BookInput {
        BookInput {
            title: title.to_string(),
            author: author.to_string(),
            year: 2024,
            description: Some("  ".to_string()),
            cover_url: Some(" https://example.com/c.jpg ".to_string()),
            pdf_url: None,
        }
    }

    #[test]
    fn validated_trims_and_drops_blanks() {
        let book = input("  Dune ", "Frank Herbert").validated().unwrap();
        assert_eq!(book.title, "Dune");
        assert_eq!(book.description, None);
        assert_eq!(book.cover_url.as_deref(), Some("https://example.com/c.jpg"));
    }

    #[test]
    fn validated_requires_title_and_author() {
        assert!(input("", "Someone").validated().is_err());
        assert!(input("Something", "   ").validated().is_err());
    }

    #[test]
    fn starter_catalog_is_valid() {
        let books = starter_catalog();
        assert_eq!(books.len(), STARTER_CATALOG.len());
        for book in books {
            assert!(book.validated().is_ok());
        }
    }
}
