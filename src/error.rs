use thiserror::Error;

/// All different error types this crate uses.
///
/// Everything here is a training time failure: a template that cannot be
/// parsed is unusable and surfaced immediately. Per page extraction never
/// errors, a field that cannot be located is simply absent from the output.
#[derive(Error, Debug)]
pub enum SchabloneError {
    /// An annotated tag that binds text content was opened but never closed,
    /// and no malformed html recovery rule applies to it.
    #[error("Annotated <{tag}> opened at token {token_index} is never closed")]
    UnbalancedAnnotation {
        /// Name of the offending tag.
        tag: String,
        /// Token index of the opening tag.
        token_index: usize,
    },
    /// The reserved annotation attribute did not hold a valid descriptor.
    #[error("Invalid annotation descriptor on <{tag}>: {error}")]
    InvalidAnnotationDescriptor {
        /// Name of the annotated tag.
        tag: String,
        /// The underlying deserialization error.
        error: serde_json::Error,
    },
    /// A generated annotation appeared before any other tag, so there is no
    /// enclosing region to anchor its literal prefix and suffix text to.
    #[error("Generated annotation has no enclosing tag")]
    MisplacedGeneratedAnnotation,
    /// The builder was asked to train without a single template page.
    #[error("At least one annotated template page is required")]
    NoTemplates,
}
