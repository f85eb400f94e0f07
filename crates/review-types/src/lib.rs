pub mod api;
pub mod models;

pub use models::{PrStatus, PullRequest, PullRequestShort, Team, User, UserWithTeam};
