/// Database row types. These map directly to SQLite rows.
/// Distinct from review-types models to keep the DB layer independent.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRow {
    pub id: String,
    pub username: String,
    pub is_active: bool,
}

/// A pull request row joined with its reviewer rows, in assignment order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestRow {
    pub id: String,
    pub name: String,
    pub author_id: String,
    pub status: String,
    pub created_at: String,
    pub merged_at: Option<String>,
    pub reviewers: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewQueueRow {
    pub id: String,
    pub name: String,
    pub author_id: String,
    pub status: String,
}

pub struct NewPullRequest<'a> {
    pub id: &'a str,
    pub name: &'a str,
    pub author_id: &'a str,
    /// Team every reviewer must still belong to at write time.
    pub team: &'a str,
    pub status: &'a str,
    pub created_at: &'a str,
    pub reviewers: &'a [String],
}

/// Result of writing a new pull request with its reviewers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    Created,
    IdTaken,
    /// A reviewer became ineligible (inactive, the author, or outside the
    /// team) between selection and write.
    Conflict,
}

/// Result of a compare-and-swap on a pull request's reviewer set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplaceOutcome {
    Replaced,
    PrMissing,
    PrMerged,
    /// The old reviewer was no longer assigned at write time.
    NotAssigned,
    /// The new reviewer became ineligible (assigned, author, or inactive)
    /// between selection and write.
    Conflict,
}
