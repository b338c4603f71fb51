//! Resolve declared options from ordered sources into an immutable [`FlagStore`].
//!
//! Sources are parsed highest priority first. A source only fills in names that no earlier
//! source has set, and the declared defaults fill in whatever is left once [`Resolver::resolve`]
//! is called. Resolving consumes the resolver, so nothing can be parsed after a module has
//! bound its configuration.

use std::io::{self, Write};
use std::path::Path;

use clap::ArgMatches;
use figment::Figment;

use crate::error::ConfigError;
use crate::layer::Layer;
use crate::schema::{FlagType, OptionDecl, OptionType, OptionValue, Schema};

/// The outcome of reading an optional source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceStatus {
    Loaded,
    Unavailable,
}

pub struct Resolver {
    schema: Schema,
    figment: Figment,
}

impl Resolver {
    pub fn new(schema: Schema) -> Resolver {
        Resolver {
            schema,
            figment: Figment::new(),
        }
    }

    /// Add one resolution pass; values already set by an earlier pass are kept
    pub fn parse(mut self, layer: Layer) -> Resolver {
        for name in layer.names() {
            if let Some(metadata) = self.figment.find_metadata(name) {
                log::debug!(
                    "Ignoring '{name}' from {}: already set by {}",
                    layer.origin(),
                    metadata.name
                );
            }
        }
        log::trace!("Joining layer {layer:?}");
        self.figment = self.figment.join(layer);
        self
    }

    /// Resolution pass over the declared options given on the command line
    pub fn parse_args(self, matches: &ArgMatches) -> Result<Resolver, ConfigError> {
        let layer = Layer::from_arg_matches(&self.schema, matches)?;
        Ok(self.parse(layer))
    }

    /// Resolution pass over an INI file; a missing file leaves everything unset
    pub fn parse_file(self, path: &Path) -> Result<(Resolver, SourceStatus), ConfigError> {
        match Layer::from_ini_file(&self.schema, path)? {
            Some(layer) => Ok((self.parse(layer), SourceStatus::Loaded)),
            None => {
                log::info!("Config file {} not found, skipping it", path.display());
                Ok((self, SourceStatus::Unavailable))
            }
        }
    }

    /// Fill in the declared defaults and freeze the result
    pub fn resolve(self) -> FlagStore {
        let defaults = Layer::defaults(&self.schema);
        FlagStore {
            figment: self.figment.join(defaults),
            schema: self.schema,
        }
    }
}

/// Read-only resolved option values
pub struct FlagStore {
    schema: Schema,
    figment: Figment,
}

impl FlagStore {
    pub fn declaration(&self, name: &str) -> Result<&OptionDecl, ConfigError> {
        self.schema
            .lookup(name)
            .ok_or_else(|| ConfigError::UndeclaredOption {
                name: name.to_owned(),
            })
    }

    /// Look up an option as `T`, which must be the type the option was declared with
    pub fn get<T: FlagType>(&self, name: &str) -> Result<T, ConfigError> {
        let decl = self.declaration(name)?;
        if decl.ty() != T::TYPE {
            return Err(ConfigError::TypeMismatch {
                name: name.to_owned(),
                declared: decl.ty(),
                requested: T::TYPE,
            });
        }
        Ok(self.figment.extract_inner::<T>(name)?)
    }

    /// Look up an option as whatever type it was declared with
    pub fn get_value(&self, name: &str) -> Result<OptionValue, ConfigError> {
        let value = match self.declaration(name)?.ty() {
            OptionType::U64 => self.get::<u64>(name)?.into(),
            OptionType::U32 => self.get::<u32>(name)?.into(),
            OptionType::I64 => self.get::<i64>(name)?.into(),
            OptionType::I32 => self.get::<i32>(name)?.into(),
            OptionType::F64 => self.get::<f64>(name)?.into(),
            OptionType::String => self.get::<String>(name)?.into(),
            OptionType::Bool => self.get::<bool>(name)?.into(),
        };
        Ok(value)
    }

    /// Name of the source the option's value came from
    pub fn origin_of(&self, name: &str) -> Option<String> {
        self.figment
            .find_metadata(name)
            .map(|metadata| metadata.name.to_string())
    }

    /// Start binding the fields of one section
    pub fn binding(&self, section: &'static str) -> Binding<'_> {
        Binding {
            store: self,
            section,
            errors: Vec::new(),
        }
    }

    /// Write every option as `name = value (origin)`, in declaration order
    pub fn report(&self, out: &mut impl Write) -> io::Result<()> {
        for decl in self.schema.options() {
            let value = self
                .get_value(decl.name())
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
            let origin = self.origin_of(decl.name()).unwrap_or_default();
            writeln!(out, "{} = {value} ({origin})", decl.name())?;
        }
        Ok(())
    }
}

/// Looks up fields of a section, collecting every failure instead of stopping at the first
pub struct Binding<'a> {
    store: &'a FlagStore,
    section: &'static str,
    errors: Vec<ConfigError>,
}

impl Binding<'_> {
    pub fn field<T: FlagType>(&mut self, field: &str) -> Option<T> {
        match self.store.get(&format!("{}.{field}", self.section)) {
            Ok(value) => Some(value),
            Err(e) => {
                self.errors.push(e);
                None
            }
        }
    }

    pub fn into_error(self) -> ConfigError {
        ConfigError::Binding {
            section: self.section,
            errors: self.errors,
        }
    }
}

/// A module's typed configuration, declared and bound under one section
pub trait ModuleConfig: Sized {
    const SECTION: &'static str;

    /// Declare every field of the configuration in `schema`
    fn declare(schema: &mut Schema) -> Result<(), ConfigError>;

    /// Read every field out of `store`
    fn bind(store: &FlagStore) -> Result<Self, ConfigError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn schema() -> Schema {
        let mut schema = Schema::new();
        schema
            .declare("module1.test", OptionType::U64, 5u64.into())
            .unwrap();
        schema
            .declare("module1.words", OptionType::String, String::from("hello").into())
            .unwrap();
        schema
            .declare("module1.ratio", OptionType::F64, 0.25f64.into())
            .unwrap();
        schema
    }

    fn layer(origin: &str, values: &[(&str, OptionValue)]) -> Layer {
        let mut layer = Layer::new(origin);
        for (name, value) in values {
            layer.insert(name, value.clone());
        }
        layer
    }

    #[test]
    fn defaults_when_no_source_supplies_a_value() {
        let store = Resolver::new(schema()).resolve();
        assert_eq!(store.get::<u64>("module1.test").unwrap(), 5);
        assert_eq!(store.get::<String>("module1.words").unwrap(), "hello");
        assert_eq!(store.get::<f64>("module1.ratio").unwrap(), 0.25);
        assert_eq!(store.origin_of("module1.test").as_deref(), Some("defaults"));
    }

    #[test]
    fn first_pass_wins() {
        let first = layer("first", &[("module1.test", OptionValue::U64(42))]);
        let second = layer(
            "second",
            &[
                ("module1.test", OptionValue::U64(99)),
                ("module1.words", OptionValue::String(String::from("bye"))),
            ],
        );
        let store = Resolver::new(schema()).parse(first).parse(second).resolve();

        assert_eq!(store.get::<u64>("module1.test").unwrap(), 42);
        assert_eq!(store.origin_of("module1.test").as_deref(), Some("first"));
        assert_eq!(store.get::<String>("module1.words").unwrap(), "bye");
        assert_eq!(store.origin_of("module1.words").as_deref(), Some("second"));
    }

    #[test]
    fn lookup_type_must_match_declaration() {
        let store = Resolver::new(schema()).resolve();
        match store.get::<String>("module1.test") {
            Err(ConfigError::TypeMismatch {
                declared,
                requested,
                ..
            }) => {
                assert_eq!(declared, OptionType::U64);
                assert_eq!(requested, OptionType::String);
            }
            other => panic!("expected a type mismatch, got {other:?}"),
        }
        assert!(matches!(
            store.get::<u32>("module1.test"),
            Err(ConfigError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn undeclared_lookup_fails() {
        let store = Resolver::new(schema()).resolve();
        let err = store.get::<u64>("module1.missing").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Schema);
    }

    #[test]
    fn missing_file_is_unavailable() {
        let (resolver, status) = Resolver::new(schema())
            .parse_file(Path::new("/nonexistent/flagstore/config.ini"))
            .unwrap();
        assert_eq!(status, SourceStatus::Unavailable);
        assert_eq!(resolver.resolve().get::<u64>("module1.test").unwrap(), 5);
    }

    #[test]
    fn report_lists_values_with_origin() {
        let cli = layer("command line", &[("module1.words", OptionValue::String(String::from("bye")))]);
        let store = Resolver::new(schema()).parse(cli).resolve();

        let mut out = Vec::new();
        store.report(&mut out).unwrap();
        pretty_assertions::assert_eq!(
            String::from_utf8(out).unwrap(),
            "module1.test = 5 (defaults)\n\
             module1.words = bye (command line)\n\
             module1.ratio = 0.25 (defaults)\n"
        );
    }

    #[derive(Debug)]
    struct Mistyped {
        _test: String,
        _missing: u32,
    }

    impl ModuleConfig for Mistyped {
        const SECTION: &'static str = "module1";

        fn declare(_schema: &mut Schema) -> Result<(), ConfigError> {
            Ok(())
        }

        fn bind(store: &FlagStore) -> Result<Self, ConfigError> {
            let mut binding = store.binding(Self::SECTION);
            let test = binding.field::<String>("test");
            let missing = binding.field::<u32>("missing");
            match (test, missing) {
                (Some(_test), Some(_missing)) => Ok(Mistyped { _test, _missing }),
                _ => Err(binding.into_error()),
            }
        }
    }

    #[test]
    fn binding_aggregates_every_failed_field() {
        let store = Resolver::new(schema()).resolve();
        match Mistyped::bind(&store) {
            Err(ConfigError::Binding { section, errors }) => {
                assert_eq!(section, "module1");
                assert_eq!(errors.len(), 2);
                assert!(matches!(errors[0], ConfigError::TypeMismatch { .. }));
                assert!(matches!(errors[1], ConfigError::UndeclaredOption { .. }));
            }
            other => panic!("expected a binding error, got {other:?}"),
        }
    }
}
