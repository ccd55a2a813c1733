pub mod artifacts;
pub mod clock;
pub mod comments;
pub mod credentials;
pub mod notifier;
pub mod registry;
pub mod tokens;

pub use artifacts::{ArtifactStore, StoredArtifact};
pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use comments::CommentLedger;
pub use credentials::CredentialStore;
pub use notifier::{LogMailer, Mailer, NotificationStatus, Notifier, OutboxMailer};
pub use registry::PackageRegistry;
pub use tokens::{TokenLifetimes, TokenManager, TokenValidation};
