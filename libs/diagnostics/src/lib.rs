//! Severity-tagged issues collected while validating flow inputs.
//!
//! Configuration resolution does not stop at the first problem. It records
//! every issue it finds in an [`IssueSet`], and callers decide afterwards
//! whether the set is fatal ([`IssueSet::has_error`]) and how to report it.

#![warn(missing_docs)]


use std::fmt::{Debug, Display};

/// An issue found in a flow input.
pub trait Diagnostic: Debug + Display {
    /// How serious the issue is.
    fn severity(&self) -> Severity;

    /// What the user can change to make the issue go away, if anything.
    fn help(&self) -> Option<Box<dyn Display>> {
        None
    }
}

/// How serious an issue is.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Severity {
    /// A deprecated name was migrated.
    Info,
    /// The input is accepted but probably not what the user meant.
    Warning,
    /// The input is rejected.
    Error,
}

/// Issues in the order they were found.
#[derive(Debug, Clone)]
pub struct IssueSet<T> {
    issues: Vec<T>,
    num_errors: usize,
    num_warnings: usize,
}

impl<T> IssueSet<T> {
    /// Creates an empty issue set.
    pub fn new() -> Self {
        Self {
            issues: Vec::new(),
            num_errors: 0,
            num_warnings: 0,
        }
    }

    /// Iterates over the issues in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.issues.iter()
    }

    #[inline]
    #[allow(missing_docs)]
    pub fn len(&self) -> usize {
        self.issues.len()
    }

    #[inline]
    #[allow(missing_docs)]
    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }
}

impl<T: Diagnostic> IssueSet<T> {
    /// Records an issue.
    pub fn add(&mut self, issue: T) {
        match issue.severity() {
            Severity::Error => self.num_errors += 1,
            Severity::Warning => self.num_warnings += 1,
            Severity::Info => (),
        }
        self.issues.push(issue);
    }

    /// Returns `true` if any issue is an error.
    pub fn has_error(&self) -> bool {
        self.num_errors > 0
    }

    #[inline]
    #[allow(missing_docs)]
    pub fn num_errors(&self) -> usize {
        self.num_errors
    }

    #[inline]
    #[allow(missing_docs)]
    pub fn num_warnings(&self) -> usize {
        self.num_warnings
    }

    /// Emits one `tracing` event per issue, at the level of its severity.
    ///
    /// Help text is attached as the `help` field.
    pub fn log(&self) {
        for issue in self.issues.iter() {
            let help = issue.help().map(|help| help.to_string());
            let help = help.as_deref();
            match issue.severity() {
                Severity::Info => tracing::info!(help, "{issue}"),
                Severity::Warning => tracing::warn!(help, "{issue}"),
                Severity::Error => tracing::error!(help, "{issue}"),
            }
        }
    }
}

impl<T> IntoIterator for IssueSet<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;
    fn into_iter(self) -> Self::IntoIter {
        self.issues.into_iter()
    }
}

impl<T> Default for IssueSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Display> Display for IssueSet<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for issue in self.issues.iter() {
            writeln!(f, "{issue}")?;
        }
        Ok(())
    }
}
