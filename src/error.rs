use std::path::PathBuf;

use thiserror::Error;

use crate::schema::OptionType;

/// Errors raised while declaring, resolving or binding options
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Option '{name}' is declared twice")]
    DuplicateOption { name: String },

    #[error("Option '{name}' is not declared")]
    UndeclaredOption { name: String },

    #[error("Invalid declaration for option '{name}': {reason}")]
    InvalidDeclaration { name: String, reason: String },

    #[error("{origin}: {message}")]
    MalformedSource { origin: String, message: String },

    #[error("{origin}: invalid value '{value}' for option '{name}' (expected {expected}: {reason})")]
    InvalidValue {
        origin: String,
        name: String,
        value: String,
        expected: OptionType,
        reason: String,
    },

    #[error("Failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    CommandLine(#[from] clap::Error),

    #[error("Option '{name}' is declared as {declared} but was requested as {requested}")]
    TypeMismatch {
        name: String,
        declared: OptionType,
        requested: OptionType,
    },

    #[error("Failed to resolve options: {0}")]
    Resolution(#[from] figment::Error),

    #[error("Cannot configure [{section}]: {}", join_errors(.errors))]
    Binding {
        section: &'static str,
        errors: Vec<ConfigError>,
    },
}

/// Coarse classification of a [`ConfigError`], one per process exit code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Schema,
    Parse,
    TypeMismatch,
}

impl ErrorKind {
    pub fn exit_code(self) -> u8 {
        match self {
            ErrorKind::Schema => 3,
            ErrorKind::Parse => 4,
            ErrorKind::TypeMismatch => 5,
        }
    }
}

impl ConfigError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ConfigError::DuplicateOption { .. }
            | ConfigError::UndeclaredOption { .. }
            | ConfigError::InvalidDeclaration { .. } => ErrorKind::Schema,
            ConfigError::MalformedSource { .. }
            | ConfigError::InvalidValue { .. }
            | ConfigError::Io { .. }
            | ConfigError::CommandLine(_)
            | ConfigError::Resolution(_) => ErrorKind::Parse,
            ConfigError::TypeMismatch { .. } => ErrorKind::TypeMismatch,
            // Classified by the first failed field
            ConfigError::Binding { errors, .. } => errors
                .first()
                .map(ConfigError::kind)
                .unwrap_or(ErrorKind::Schema),
        }
    }
}

fn join_errors(errors: &[ConfigError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binding_error_lists_every_failure() {
        let err = ConfigError::Binding {
            section: "module1",
            errors: vec![
                ConfigError::TypeMismatch {
                    name: String::from("module1.test"),
                    declared: OptionType::U64,
                    requested: OptionType::String,
                },
                ConfigError::UndeclaredOption {
                    name: String::from("module1.missing"),
                },
            ],
        };
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);
        assert_eq!(
            err.to_string(),
            "Cannot configure [module1]: Option 'module1.test' is declared as u64 but was \
             requested as string; Option 'module1.missing' is not declared"
        );
    }

    #[test]
    fn exit_codes_are_distinct() {
        let codes = [
            ErrorKind::Schema.exit_code(),
            ErrorKind::Parse.exit_code(),
            ErrorKind::TypeMismatch.exit_code(),
        ];
        assert!(codes.iter().all(|code| *code != 0));
        assert_ne!(codes[0], codes[1]);
        assert_ne!(codes[1], codes[2]);
        assert_ne!(codes[0], codes[2]);
    }
}
