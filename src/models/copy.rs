// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Books and their physical copies.

use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Shelf status of a physical copy, stored as its integer code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyStatus {
    OnShelf = 0,
    InStorage = 1,
    CheckedOut = 2,
    Missing = 3,
    NotTracked = 4,
}

impl CopyStatus {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::OnShelf),
            1 => Some(Self::InStorage),
            2 => Some(Self::CheckedOut),
            3 => Some(Self::Missing),
            4 => Some(Self::NotTracked),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::OnShelf => "On Shelf",
            Self::InStorage => "In Storage",
            Self::CheckedOut => "Checked Out",
            Self::Missing => "Missing",
            Self::NotTracked => "Not Tracked",
        }
    }

    /// Only copies that are physically in the library can be lent.
    pub fn is_available(self) -> bool {
        matches!(self, Self::OnShelf | Self::InStorage)
    }
}

/// Physical condition rating, 1 (New) through 5 (Bad).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(feature = "binding-generation", ts(type = "1 | 2 | 3 | 4 | 5"))]
pub enum Condition {
    New = 1,
    Good = 2,
    Fair = 3,
    Poor = 4,
    Bad = 5,
}

impl Condition {
    pub fn label(self) -> &'static str {
        match self {
            Self::New => "New",
            Self::Good => "Good",
            Self::Fair => "Fair",
            Self::Poor => "Poor",
            Self::Bad => "Bad",
        }
    }
}

impl Default for Condition {
    fn default() -> Self {
        Self::Fair
    }
}

impl TryFrom<u8> for Condition {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::New),
            2 => Ok(Self::Good),
            3 => Ok(Self::Fair),
            4 => Ok(Self::Poor),
            5 => Ok(Self::Bad),
            other => Err(format!("condition must be between 1 and 5, got {other}")),
        }
    }
}

impl From<Condition> for u8 {
    fn from(condition: Condition) -> Self {
        condition as u8
    }
}

/// A physical copy, stored at `books/{book_id}/copies/{copy_id}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Copy {
    /// Scannable barcode (queried across all books)
    pub barcode: String,
    /// Raw status code; unknown or missing codes are never lendable
    #[serde(default)]
    pub status: Option<u8>,
    #[serde(default)]
    pub condition: Option<Condition>,
    #[serde(default)]
    pub notes: String,
}

impl Copy {
    pub fn status(&self) -> Option<CopyStatus> {
        self.status.and_then(CopyStatus::from_code)
    }

    pub fn is_available(&self) -> bool {
        self.status().is_some_and(CopyStatus::is_available)
    }

    pub fn status_label(&self) -> &'static str {
        self.status().map_or("Unknown Status", CopyStatus::label)
    }
}

/// A copy located by barcode, together with where it lives.
#[derive(Debug, Clone, PartialEq)]
pub struct CopyMatch {
    pub copy_id: String,
    /// Owning book document; `None` if the copy is not nested under a book
    pub book_id: Option<String>,
    pub copy: Copy,
}

/// Bibliographic metadata shown to the operator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeInfo {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub subtitle: Option<String>,
}

/// A book title (document in `books`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    #[serde(default)]
    pub volume_info: Option<VolumeInfo>,
}

impl Book {
    /// "Title Subtitle", tolerating either half being absent.
    pub fn display_title(&self) -> String {
        let info = self.volume_info.as_ref();
        let title = info.and_then(|v| v.title.as_deref()).unwrap_or("");
        let subtitle = info.and_then(|v| v.subtitle.as_deref()).unwrap_or("");
        format!("{title} {subtitle}").trim().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_shelf_and_storage_are_available() {
        let available: Vec<u8> = (0..=5)
            .filter(|code| {
                Copy {
                    status: Some(*code),
                    ..Default::default()
                }
                .is_available()
            })
            .collect();
        assert_eq!(available, vec![0, 1]);

        let no_status = Copy::default();
        assert!(!no_status.is_available());
        assert_eq!(no_status.status_label(), "Unknown Status");
    }

    #[test]
    fn condition_rejects_out_of_range() {
        assert!(Condition::try_from(0).is_err());
        assert!(Condition::try_from(6).is_err());
        assert_eq!(Condition::try_from(3), Ok(Condition::Fair));

        let parsed: Result<Condition, _> = serde_json::from_str("7");
        assert!(parsed.is_err());
        assert_eq!(serde_json::to_string(&Condition::Poor).unwrap(), "4");
    }

    #[test]
    fn display_title_joins_title_and_subtitle() {
        let book = Book {
            volume_info: Some(VolumeInfo {
                title: Some("Dune".to_string()),
                subtitle: Some("Deluxe Edition".to_string()),
            }),
        };
        assert_eq!(book.display_title(), "Dune Deluxe Edition");

        let untitled = Book::default();
        assert_eq!(untitled.display_title(), "");
    }
}
