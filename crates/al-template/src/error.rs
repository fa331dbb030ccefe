//! Template errors

use thiserror::Error;

pub type TemplateResult<T> = Result<T, TemplateError>;

#[derive(Debug, Error)]
pub enum TemplateError {
    /// The template could not be parsed
    #[error("template syntax error: {0}")]
    Syntax(String),

    /// Parsing succeeded but evaluation failed
    #[error("template render failed: {0}")]
    Render(String),
}

impl From<minijinja::Error> for TemplateError {
    fn from(err: minijinja::Error) -> Self {
        if err.kind() == minijinja::ErrorKind::SyntaxError {
            TemplateError::Syntax(err.to_string())
        } else {
            TemplateError::Render(err.to_string())
        }
    }
}
