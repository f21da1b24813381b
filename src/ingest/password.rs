//! Password collaborator for encrypted documents.

use async_trait::async_trait;

/// Why a password is being asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordReason {
    /// The document is encrypted and no password was tried yet.
    Required,
    /// The last password was rejected.
    Incorrect,
}

/// Asks someone for a document password.
#[async_trait]
pub trait PasswordPrompt: Send + Sync {
    /// Return a password to try, or `None` to give up on the document.
    async fn request(&self, document: &str, reason: PasswordReason) -> Option<String>;
}

/// Prompt that never supplies a password.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPrompt;

#[async_trait]
impl PasswordPrompt for NoPrompt {
    async fn request(&self, _document: &str, _reason: PasswordReason) -> Option<String> {
        None
    }
}
