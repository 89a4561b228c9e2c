// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Summaries of what a cleanup run did

use crate::Category;
use nsx_common::ResourceType;
use std::fmt;

/// An object that could not be deleted
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ItemFailure {
    pub kind: ResourceType,
    pub id: String,
    pub message: String,
}

impl fmt::Display for ItemFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "failed to delete {} {}: {}",
            self.kind, self.id, self.message
        )
    }
}

/// Outcome of cleaning up one [`Category`]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CategoryReport {
    pub category: Category,
    /// owned objects this category tried (or in a dry run, would try) to
    /// delete
    pub candidates: usize,
    pub deleted: usize,
    /// objects that were gone by the time we tried to delete them
    pub already_gone: usize,
    pub failures: Vec<ItemFailure>,
    /// set when the category was not run at all
    pub skipped: Option<String>,
}

impl CategoryReport {
    pub fn new(category: Category) -> CategoryReport {
        CategoryReport {
            category,
            candidates: 0,
            deleted: 0,
            already_gone: 0,
            failures: Vec::new(),
            skipped: None,
        }
    }

    pub fn skipped(category: Category, reason: impl Into<String>) -> Self {
        CategoryReport {
            skipped: Some(reason.into()),
            ..CategoryReport::new(category)
        }
    }

    pub fn failures_of(&self, kind: ResourceType) -> Vec<&ItemFailure> {
        self.failures.iter().filter(|f| f.kind == kind).collect()
    }
}

impl fmt::Display for CategoryReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(reason) = &self.skipped {
            return writeln!(f, "{}: skipped ({})", self.category, reason);
        }
        writeln!(
            f,
            "{}: {} candidates, {} deleted, {} already gone, {} failed",
            self.category,
            self.candidates,
            self.deleted,
            self.already_gone,
            self.failures.len(),
        )?;
        for failure in &self.failures {
            writeln!(f, "    {failure}")?;
        }
        Ok(())
    }
}

/// Outcome of a whole cleanup run
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CleanupReport {
    pub dry_run: bool,
    pub categories: Vec<CategoryReport>,
}

impl CleanupReport {
    pub fn category(&self, category: Category) -> Option<&CategoryReport> {
        self.categories.iter().find(|c| c.category == category)
    }

    pub fn total_deleted(&self) -> usize {
        self.categories.iter().map(|c| c.deleted).sum()
    }

    pub fn total_failures(&self) -> usize {
        self.categories.iter().map(|c| c.failures.len()).sum()
    }
}

impl fmt::Display for CleanupReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.dry_run {
            writeln!(f, "dry run: nothing was deleted")?;
        }
        for category in &self.categories {
            write!(f, "{category}")?;
        }
        write!(
            f,
            "total: {} deleted, {} failed",
            self.total_deleted(),
            self.total_failures()
        )
    }
}
