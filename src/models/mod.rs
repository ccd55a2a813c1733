pub mod account;
pub mod auth;
pub mod codec;
pub mod comment;
pub mod keys;
pub mod kv;
pub mod package;
pub mod token;
pub mod validation;

pub use account::{Account, AccountView, NewAccount, PublicProfile};
pub use auth::*;
pub use comment::{Comment, CommentTarget, CommentView, NewComment};
pub use package::{ArtifactUpload, Package, PackageMetadata, PackageView};
pub use token::{Token, TokenClass, TokenState};
