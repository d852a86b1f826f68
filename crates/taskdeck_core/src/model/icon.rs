//! Fixed icon catalog for task decoration.
//!
//! # Responsibility
//! - Define the ordered, finite set of selectable task icons.
//! - Map catalog indexes and stable keys to icons and back.
//!
//! # Invariants
//! - Catalog order is part of the persisted format; never reorder entries.
//! - Unknown indexes are rejected at the boundary; rendering may fail closed
//!   to [`TaskIcon::DEFAULT`].

use crate::model::task::TaskValidationError;
use serde::{Deserialize, Serialize};

/// Selectable task icon, stored by catalog index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskIcon {
    Android,
    Warning,
    Star,
    Adjust,
    Airplane,
    Deck,
    Report,
    AccessTime,
    AddLocation,
    AddLink,
    Computer,
    DirectionsCar,
}

impl TaskIcon {
    /// Icon used when a stored reference cannot be resolved.
    pub const DEFAULT: TaskIcon = TaskIcon::Android;

    /// Full catalog in persisted index order.
    pub const ALL: [TaskIcon; 12] = [
        TaskIcon::Android,
        TaskIcon::Warning,
        TaskIcon::Star,
        TaskIcon::Adjust,
        TaskIcon::Airplane,
        TaskIcon::Deck,
        TaskIcon::Report,
        TaskIcon::AccessTime,
        TaskIcon::AddLocation,
        TaskIcon::AddLink,
        TaskIcon::Computer,
        TaskIcon::DirectionsCar,
    ];

    /// Resolves a catalog index.
    ///
    /// # Errors
    /// - Returns `UnknownIcon` when `index` is outside the catalog.
    pub fn from_index(index: u32) -> Result<Self, TaskValidationError> {
        usize::try_from(index)
            .ok()
            .and_then(|idx| Self::ALL.get(idx).copied())
            .ok_or(TaskValidationError::UnknownIcon(index))
    }

    /// Resolves a catalog index, falling back to [`TaskIcon::DEFAULT`].
    pub fn from_index_or_default(index: u32) -> Self {
        Self::from_index(index).unwrap_or(Self::DEFAULT)
    }

    /// Returns this icon's position in the catalog.
    pub fn index(self) -> u32 {
        // ALL holds every variant exactly once.
        Self::ALL
            .iter()
            .position(|icon| *icon == self)
            .map_or(0, |idx| idx as u32)
    }

    /// Stable snake_case key shared with the presentation layer.
    pub fn key(self) -> &'static str {
        match self {
            Self::Android => "android",
            Self::Warning => "warning",
            Self::Star => "star",
            Self::Adjust => "adjust",
            Self::Airplane => "airplane",
            Self::Deck => "deck",
            Self::Report => "report",
            Self::AccessTime => "access_time",
            Self::AddLocation => "add_location",
            Self::AddLink => "add_link",
            Self::Computer => "computer",
            Self::DirectionsCar => "directions_car",
        }
    }

    /// Resolves a stable key produced by [`TaskIcon::key`].
    pub fn from_key(key: &str) -> Option<Self> {
        let normalized = key.trim().to_ascii_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|icon| icon.key() == normalized)
    }
}

impl Default for TaskIcon {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[cfg(test)]
mod tests {
    use super::TaskIcon;
    use crate::model::task::TaskValidationError;

    #[test]
    fn index_roundtrips_for_whole_catalog() {
        for (idx, icon) in TaskIcon::ALL.iter().enumerate() {
            assert_eq!(icon.index(), idx as u32);
            assert_eq!(TaskIcon::from_index(idx as u32).unwrap(), *icon);
        }
    }

    #[test]
    fn out_of_range_index_is_rejected_or_falls_back() {
        assert_eq!(
            TaskIcon::from_index(12).unwrap_err(),
            TaskValidationError::UnknownIcon(12)
        );
        assert_eq!(TaskIcon::from_index_or_default(99), TaskIcon::Android);
    }

    #[test]
    fn keys_are_unique_and_resolvable() {
        for icon in TaskIcon::ALL {
            assert_eq!(TaskIcon::from_key(icon.key()), Some(icon));
        }
        assert_eq!(TaskIcon::from_key(" Directions_Car "), Some(TaskIcon::DirectionsCar));
        assert_eq!(TaskIcon::from_key("rocket"), None);
    }
}
