//! Gallery listing: search, category filter, featured slice and thumbnails.

use serde::{Deserialize, Serialize};

use crate::compose;
use crate::params::ParameterAssignment;
use crate::record::{AnimationRecord, Category};
use crate::sandbox::{FrameInteraction, SandboxPolicy};
use crate::{ComposeOptions, ComposedDocument};

/// Number of records shown in the featured strip.
pub const FEATURED_COUNT: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CategoryFilter {
    #[default]
    All,
    Only(Category),
}

impl CategoryFilter {
    /// `"All"` or a category label, case-insensitive.
    pub fn from_label(label: &str) -> Option<Self> {
        if label.trim().eq_ignore_ascii_case("all") {
            return Some(CategoryFilter::All);
        }
        Category::from_label(label).map(CategoryFilter::Only)
    }

    pub fn admits(self, category: Category) -> bool {
        match self {
            CategoryFilter::All => true,
            CategoryFilter::Only(c) => c == category,
        }
    }
}

/// Free-text search plus category filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GalleryQuery {
    pub search: String,
    pub category: CategoryFilter,
}

impl GalleryQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = search.into();
        self
    }

    pub fn with_category(mut self, category: CategoryFilter) -> Self {
        self.category = category;
        self
    }

    /// Case-insensitive substring match over name and description.
    pub fn matches(&self, record: &AnimationRecord) -> bool {
        if !self.category.admits(record.category) {
            return false;
        }
        let needle = self.search.trim().to_lowercase();
        needle.is_empty()
            || record.name.to_lowercase().contains(&needle)
            || record.description.to_lowercase().contains(&needle)
    }

    /// Matching records, order preserved.
    pub fn filter<'a>(&self, records: &'a [AnimationRecord]) -> Vec<&'a AnimationRecord> {
        records.iter().filter(|r| self.matches(r)).collect()
    }
}

/// The first [`FEATURED_COUNT`] records.
pub fn featured(records: &[AnimationRecord]) -> &[AnimationRecord] {
    &records[..records.len().min(FEATURED_COUNT)]
}

/// Click-through card preview at default parameter values.
pub fn thumbnail_document(record: &AnimationRecord) -> ComposedDocument {
    compose::compose_document(record, &ParameterAssignment::new(), &ComposeOptions::thumbnail())
}

/// Card-ready `<iframe>` for [`thumbnail_document`]. Neither the frame nor
/// anything inside it takes pointer input.
pub fn thumbnail_frame(record: &AnimationRecord, policy: &SandboxPolicy) -> String {
    policy.frame_markup(&thumbnail_document(record), &record.name, FrameInteraction::ClickThrough)
}
