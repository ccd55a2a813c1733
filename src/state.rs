use crate::config::AppConfig;
use crate::database::SharedStore;
use crate::services::{
    ArtifactStore, CommentLedger, CredentialStore, Notifier, PackageRegistry, TokenManager,
};

#[derive(Debug)]
pub struct AppState {
    pub config: AppConfig,
    pub store: SharedStore,
    pub credentials: CredentialStore,
    pub tokens: TokenManager,
    pub artifacts: ArtifactStore,
    pub comments: CommentLedger,
    pub registry: PackageRegistry,
    pub notifier: Notifier,
}
