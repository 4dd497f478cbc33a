//! Helpful error types for CLI commands
//!
//! Every error includes:
//! - What went wrong
//! - Context about the situation
//! - Suggestions for how to fix it

use alignflow_engine::{EngineError, ErrorKind, ResolveError};
use std::fmt;
use std::path::Path;

/// An error with helpful context and suggestions
#[derive(Debug)]
pub struct HelpfulError {
    /// The main error message
    pub message: String,
    /// Additional context about what was happening
    pub context: Option<String>,
    /// Suggestions for how to fix the error
    pub suggestions: Vec<String>,
}

impl HelpfulError {
    /// Create a new helpful error
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            context: None,
            suggestions: Vec::new(),
        }
    }

    /// Add context to the error
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Add a suggestion for fixing the error
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    /// Add multiple suggestions
    pub fn with_suggestions(mut self, suggestions: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.suggestions.extend(suggestions.into_iter().map(|s| s.into()));
        self
    }

    // === Common error constructors ===

    /// Organization file is missing
    pub fn org_not_found(path: &Path) -> Self {
        Self::new(format!("Organization file not found: {}", path.display()))
            .with_context("Users, departments and roles are read from org.toml")
            .with_suggestions([
                format!("TRY: Create {} with [[users]] entries", path.display()),
                "TRY: Point at another file with --org <path>".to_string(),
            ])
    }

    /// No `--as` user for a command that needs one
    pub fn no_acting_user() -> Self {
        Self::new("No acting user")
            .with_context("This command acts on behalf of a user from the organization file")
            .with_suggestions([
                "TRY: Pass --as <user-id>".to_string(),
                "TRY: Set ALIGNFLOW_USER=<user-id>".to_string(),
            ])
    }

    /// Identifier failed to parse
    pub fn invalid_id(kind: &str, value: &str, details: &str) -> Self {
        Self::new(format!("Invalid {} id: '{}'", kind, value)).with_context(details.to_string())
    }

    /// No record matches an id or prefix
    pub fn okr_not_found(id: &str) -> Self {
        Self::new(format!("OKR not found: {}", id))
            .with_suggestion("TRY: List records with `alignflow okr list`")
    }

    /// Prefix matches more than one record
    pub fn ambiguous_prefix(prefix: &str, count: usize) -> Self {
        Self::new(format!("'{}' matches {} OKRs", prefix, count))
            .with_suggestion("TRY: Use more characters of the id")
    }

    /// JSON input file could not be read
    pub fn input_file(path: &Path, details: &str) -> Self {
        Self::new(format!("Cannot read input file: {}", path.display()))
            .with_context(details.to_string())
            .with_suggestions([
                format!("TRY: Validate the JSON: python -m json.tool {}", path.display()),
                "TRY: Edits are a JSON array of objects tagged with \"kind\"".to_string(),
            ])
    }

    /// Engine failure with suggestions keyed by its kind
    pub fn from_engine(err: &EngineError) -> Self {
        let base = Self::new(err.to_string());
        match err {
            EngineError::Resolution(ResolveError::Ambiguous {
                role, department, ..
            }) => base
                .with_context(format!(
                    "More than one user holds {} and none is designated primary",
                    role
                ))
                .with_suggestion(format!(
                    "TRY: Add a [[primary_approvers]] entry for department = \"{}\", role = \"{}\" to org.toml",
                    department, role
                )),
            EngineError::Resolution(ResolveError::NotFound { role, .. }) => base
                .with_context(format!("Nobody holds {}", role))
                .with_suggestion("TRY: Add a user with that role or edit the workflow registry"),
            _ => match err.kind() {
                ErrorKind::Authorization => base
                    .with_suggestion("TRY: Check who may act with `alignflow okr show <id>`")
                    .with_suggestion("TRY: Use --as to act as the resolved approver"),
                ErrorKind::Lifecycle => base
                    .with_suggestion("TRY: Check the current status with `alignflow okr show <id>`"),
                ErrorKind::Conflict => base
                    .with_context("Another command changed the record first")
                    .with_suggestion("TRY: Run the command again"),
                ErrorKind::BatchBlocked => base
                    .with_suggestion("TRY: Score the remaining records, see `alignflow board`"),
                _ => base,
            },
        }
    }
}

impl fmt::Display for HelpfulError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "ERROR: {}", self.message)?;

        if let Some(ctx) = &self.context {
            writeln!(f, "CONTEXT: {}", ctx)?;
        }

        if !self.suggestions.is_empty() {
            writeln!(f)?;
            for suggestion in &self.suggestions {
                writeln!(f, "  {}", suggestion)?;
            }
        }

        Ok(())
    }
}

impl std::error::Error for HelpfulError {}

/// Human-readable form of any command error.
pub fn render(err: &anyhow::Error) -> String {
    if let Some(helpful) = err.downcast_ref::<HelpfulError>() {
        return helpful.to_string();
    }
    if let Some(engine) = err.downcast_ref::<EngineError>() {
        return HelpfulError::from_engine(engine).to_string();
    }
    format!("ERROR: {:#}", err)
}

/// Print an error as a JSON object on stdout.
pub fn print_json_error(err: &anyhow::Error) {
    let kind = err.downcast_ref::<EngineError>().map(|e| e.kind());
    let value = serde_json::json!({
        "status": "failed",
        "error": format!("{:#}", err),
        "kind": kind,
    });
    println!("{}", value);
}

#[cfg(test)]
mod tests {
    use super::*;
    use alignflow_engine::{Role, ValidationError};
    use std::path::PathBuf;

    #[test]
    fn test_helpful_error_display() {
        let err = HelpfulError::new("Something went wrong")
            .with_context("While approving")
            .with_suggestion("Try again");

        let display = format!("{}", err);
        assert!(display.contains("ERROR: Something went wrong"));
        assert!(display.contains("CONTEXT: While approving"));
        assert!(display.contains("Try again"));
    }

    #[test]
    fn test_org_not_found() {
        let path = PathBuf::from("/nonexistent/org.toml");
        let display = HelpfulError::org_not_found(&path).to_string();
        assert!(display.contains("/nonexistent/org.toml"));
        assert!(display.contains("--org"));
    }

    #[test]
    fn test_ambiguous_suggests_designation() {
        let err = EngineError::Resolution(ResolveError::Ambiguous {
            role: Role::TechHead,
            department: "Crypto".into(),
            scope: alignflow_engine::resolver::Scope::Department,
            candidates: vec![],
        });
        let display = render(&anyhow::Error::new(err));
        assert!(display.contains("primary_approvers"));
        assert!(display.contains("Crypto"));
    }

    #[test]
    fn test_render_plain_engine_error() {
        let err: EngineError = ValidationError::Required("adjustment reason").into();
        let display = render(&anyhow::Error::new(err));
        assert!(display.starts_with("ERROR: validation failed"));
    }
}
