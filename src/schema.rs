use std::fmt;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::ConfigError;
use crate::resolver::ModuleConfig;

/// INI section holding options that have no `<section>.` prefix
pub const ROOT_SECTION: &str = "root";

/// The value type an option is declared with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionType {
    U64,
    U32,
    I64,
    I32,
    F64,
    String,
    Bool,
}

impl OptionType {
    /// Placeholder shown for the option's value in `--help`
    pub fn value_name(self) -> &'static str {
        match self {
            OptionType::U64 | OptionType::U32 | OptionType::I64 | OptionType::I32 => "INT",
            OptionType::F64 => "FLOAT",
            OptionType::String => "STRING",
            OptionType::Bool => "BOOL",
        }
    }

    /// Coerce a raw source literal to this type
    pub fn parse(self, raw: &str) -> Result<OptionValue, String> {
        let trimmed = raw.trim();
        let value = match self {
            OptionType::U64 => OptionValue::U64(trimmed.parse().map_err(|e| format!("{e}"))?),
            OptionType::U32 => OptionValue::U32(trimmed.parse().map_err(|e| format!("{e}"))?),
            OptionType::I64 => OptionValue::I64(trimmed.parse().map_err(|e| format!("{e}"))?),
            OptionType::I32 => OptionValue::I32(trimmed.parse().map_err(|e| format!("{e}"))?),
            OptionType::F64 => OptionValue::F64(trimmed.parse().map_err(|e| format!("{e}"))?),
            OptionType::String => OptionValue::String(raw.to_owned()),
            OptionType::Bool => OptionValue::Bool(parse_bool(trimmed)?),
        };
        Ok(value)
    }
}

impl fmt::Display for OptionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OptionType::U64 => "u64",
            OptionType::U32 => "u32",
            OptionType::I64 => "i64",
            OptionType::I32 => "i32",
            OptionType::F64 => "f64",
            OptionType::String => "string",
            OptionType::Bool => "bool",
        };
        f.write_str(name)
    }
}

fn parse_bool(raw: &str) -> Result<bool, String> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(String::from("expected true or false")),
    }
}

/// A dynamically-typed option value
///
/// Serializes to the bare inner value, which is how values reach the figment layers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum OptionValue {
    U64(u64),
    U32(u32),
    I64(i64),
    I32(i32),
    F64(f64),
    String(String),
    Bool(bool),
}

impl OptionValue {
    pub fn ty(&self) -> OptionType {
        match self {
            OptionValue::U64(_) => OptionType::U64,
            OptionValue::U32(_) => OptionType::U32,
            OptionValue::I64(_) => OptionType::I64,
            OptionValue::I32(_) => OptionType::I32,
            OptionValue::F64(_) => OptionType::F64,
            OptionValue::String(_) => OptionType::String,
            OptionValue::Bool(_) => OptionType::Bool,
        }
    }

    /// Render the value so that reading it back from an INI file yields the same value
    pub fn to_ini_literal(&self) -> String {
        match self {
            OptionValue::String(s) => format!("\"{s}\""),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionValue::U64(v) => write!(f, "{v}"),
            OptionValue::U32(v) => write!(f, "{v}"),
            OptionValue::I64(v) => write!(f, "{v}"),
            OptionValue::I32(v) => write!(f, "{v}"),
            OptionValue::F64(v) => write!(f, "{v}"),
            OptionValue::String(v) => f.write_str(v),
            OptionValue::Bool(v) => write!(f, "{v}"),
        }
    }
}

/// A Rust type that an option can be declared as and looked up as
pub trait FlagType: Serialize + DeserializeOwned + Into<OptionValue> {
    const TYPE: OptionType;
}

macro_rules! flag_types {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl FlagType for $ty {
                const TYPE: OptionType = OptionType::$variant;
            }

            impl From<$ty> for OptionValue {
                fn from(value: $ty) -> OptionValue {
                    OptionValue::$variant(value)
                }
            }
        )*
    };
}

flag_types! {
    u64 => U64,
    u32 => U32,
    i64 => I64,
    i32 => I32,
    f64 => F64,
    String => String,
    bool => Bool,
}

/// One declared option
#[derive(Debug, Clone, PartialEq)]
pub struct OptionDecl {
    name: String,
    ty: OptionType,
    default: OptionValue,
    help: Option<&'static str>,
}

impl OptionDecl {
    /// The full dotted name, e.g. `module1.test`
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ty(&self) -> OptionType {
        self.ty
    }

    pub fn default_value(&self) -> &OptionValue {
        &self.default
    }

    pub fn help(&self) -> Option<&'static str> {
        self.help
    }

    pub fn set_help(&mut self, help: &'static str) -> &mut Self {
        self.help = Some(help);
        self
    }

    /// The part of the name before the `.`, if any
    pub fn section(&self) -> Option<&str> {
        self.name.split_once('.').map(|(section, _)| section)
    }

    /// The part of the name after the `.`, or the whole name for root options
    pub fn field(&self) -> &str {
        self.name
            .split_once('.')
            .map_or(self.name.as_str(), |(_, field)| field)
    }
}

/// The fixed set of options a process recognizes
#[derive(Debug, Clone, Default)]
pub struct Schema {
    options: Vec<OptionDecl>,
    section_docs: Vec<(String, &'static str)>,
}

impl Schema {
    pub fn new() -> Schema {
        Schema::default()
    }

    /// Register one option
    pub fn declare(
        &mut self,
        name: impl Into<String>,
        ty: OptionType,
        default: OptionValue,
    ) -> Result<&mut OptionDecl, ConfigError> {
        let name = name.into();
        validate_name(&name)?;
        if default.ty() != ty {
            return Err(ConfigError::InvalidDeclaration {
                reason: format!("default value '{default}' is a {}, not a {ty}", default.ty()),
                name,
            });
        }
        if let OptionValue::String(s) = &default {
            if s.contains(['"', '\n', '\r']) {
                return Err(ConfigError::InvalidDeclaration {
                    reason: String::from("string defaults cannot contain quotes or line breaks"),
                    name,
                });
            }
        }
        if self.lookup(&name).is_some() {
            return Err(ConfigError::DuplicateOption { name });
        }
        // `a` and `a.b` cannot both exist since `a` would be both a value and a section
        let section = name.split_once('.').map(|(section, _)| section);
        let conflict = self
            .options
            .iter()
            .find(|existing| {
                section == Some(existing.name()) || existing.section() == Some(name.as_str())
            })
            .map(|existing| existing.name().to_owned());
        if let Some(existing) = conflict {
            return Err(ConfigError::InvalidDeclaration {
                reason: format!("conflicts with option '{existing}'"),
                name,
            });
        }

        let index = self.options.len();
        self.options.push(OptionDecl {
            name,
            ty,
            default,
            help: None,
        });
        Ok(&mut self.options[index])
    }

    /// Register every option of a module's configuration
    pub fn declare_module<M: ModuleConfig>(&mut self) -> Result<(), ConfigError> {
        M::declare(self)
    }

    /// Attach a description to a section, used when rendering the default INI file
    pub fn document_section(&mut self, section: &str, docs: &'static str) {
        match self.section_docs.iter_mut().find(|(name, _)| name == section) {
            Some(entry) => entry.1 = docs,
            None => self.section_docs.push((section.to_owned(), docs)),
        }
    }

    pub fn section_docs(&self, section: &str) -> Option<&'static str> {
        self.section_docs
            .iter()
            .find(|(name, _)| name == section)
            .map(|(_, docs)| *docs)
    }

    pub fn lookup(&self, name: &str) -> Option<&OptionDecl> {
        self.options.iter().find(|decl| decl.name == name)
    }

    /// Declared options, in declaration order
    pub fn options(&self) -> &[OptionDecl] {
        &self.options
    }
}

fn validate_name(name: &str) -> Result<(), ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidDeclaration {
        name: name.to_owned(),
        reason,
    };

    let segments: Vec<&str> = name.split('.').collect();
    if segments.len() > 2 {
        return Err(invalid(String::from(
            "expected '<section>.<field>' or '<field>'",
        )));
    }
    for segment in &segments {
        if !is_identifier(segment) {
            return Err(invalid(format!("'{segment}' is not a valid identifier")));
        }
    }
    if segments.len() == 2 && segments[0] == ROOT_SECTION {
        return Err(invalid(format!(
            "section '{ROOT_SECTION}' is reserved for options without a section"
        )));
    }
    Ok(())
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_declaration_is_rejected() {
        let mut schema = Schema::new();
        schema
            .declare("module1.test", OptionType::U64, 5u64.into())
            .unwrap();
        let result = schema.declare("module1.test", OptionType::U64, 7u64.into());
        assert!(matches!(result, Err(ConfigError::DuplicateOption { .. })));
        assert_eq!(schema.options().len(), 1);
    }

    #[test]
    fn default_must_match_declared_type() {
        let mut schema = Schema::new();
        let result = schema.declare("module1.test", OptionType::U64, 5u32.into());
        assert!(matches!(
            result,
            Err(ConfigError::InvalidDeclaration { .. })
        ));
    }

    #[test]
    fn string_defaults_must_survive_an_ini_file() {
        let mut schema = Schema::new();
        for words in ["say \"hi\"", "two\nlines", "cr\r"] {
            let result = schema.declare("module1.words", OptionType::String, words.to_owned().into());
            assert!(
                matches!(result, Err(ConfigError::InvalidDeclaration { .. })),
                "{words:?} should be rejected"
            );
        }
        assert!(schema
            .declare("module1.words", OptionType::String, String::from(" #1; fan ").into())
            .is_ok());
    }

    #[test]
    fn names_must_be_identifiers() {
        let mut schema = Schema::new();
        for name in ["", "module1.", ".test", "1module.test", "a.b.c", "mod-1.test", "root.test"] {
            let result = schema.declare(name, OptionType::Bool, true.into());
            assert!(result.is_err(), "'{name}' should be rejected");
        }
        assert!(schema.declare("_private", OptionType::Bool, true.into()).is_ok());
    }

    #[test]
    fn section_cannot_shadow_root_option() {
        let mut schema = Schema::new();
        schema
            .declare("module1", OptionType::Bool, false.into())
            .unwrap();
        let result = schema.declare("module1.test", OptionType::U64, 5u64.into());
        assert!(result.is_err());

        let mut schema = Schema::new();
        schema
            .declare("module1.test", OptionType::U64, 5u64.into())
            .unwrap();
        let result = schema.declare("module1", OptionType::Bool, false.into());
        assert!(result.is_err());
    }

    #[test]
    fn declarations_split_into_section_and_field() {
        let mut schema = Schema::new();
        schema
            .declare("module1.words", OptionType::String, String::from("hi").into())
            .unwrap()
            .set_help("Greeting");
        schema.declare("verbosity", OptionType::I32, 0i32.into()).unwrap();

        let words = schema.lookup("module1.words").unwrap();
        assert_eq!(words.section(), Some("module1"));
        assert_eq!(words.field(), "words");
        assert_eq!(words.help(), Some("Greeting"));

        let verbosity = schema.lookup("verbosity").unwrap();
        assert_eq!(verbosity.section(), None);
        assert_eq!(verbosity.field(), "verbosity");
    }

    #[test]
    fn literals_are_coerced_to_declared_type() {
        assert_eq!(OptionType::U64.parse(" 42 "), Ok(OptionValue::U64(42)));
        assert_eq!(OptionType::I32.parse("-3"), Ok(OptionValue::I32(-3)));
        assert_eq!(OptionType::F64.parse("0.5"), Ok(OptionValue::F64(0.5)));
        assert_eq!(
            OptionType::String.parse("bye"),
            Ok(OptionValue::String(String::from("bye")))
        );
        for raw in ["true", "TRUE", "1", "yes", "on"] {
            assert_eq!(OptionType::Bool.parse(raw), Ok(OptionValue::Bool(true)));
        }
        for raw in ["false", "0", "No", "off"] {
            assert_eq!(OptionType::Bool.parse(raw), Ok(OptionValue::Bool(false)));
        }

        assert!(OptionType::U64.parse("-1").is_err());
        assert!(OptionType::U32.parse("4294967296").is_err());
        assert!(OptionType::U64.parse("five").is_err());
        assert!(OptionType::Bool.parse("maybe").is_err());
    }

    #[test]
    fn ini_literals_quote_strings() {
        assert_eq!(OptionValue::U32(6).to_ini_literal(), "6");
        assert_eq!(OptionValue::Bool(true).to_ini_literal(), "true");
        assert_eq!(
            OptionValue::String(String::from("hello")).to_ini_literal(),
            "\"hello\""
        );
    }
}
