pub mod directory;
pub mod error;
pub mod lifecycle;
pub mod selector;
pub mod service;
pub mod store;

pub use directory::Directory;
pub use error::{ReviewError, ReviewResult};
pub use lifecycle::{PrLifecycle, Reassignment};
pub use selector::{RandomSelector, ReviewerSelector};
pub use service::ReviewService;
pub use store::{CreateOutcome, ReplaceOutcome, ReviewStore};
