//! A single source of option values.
//!
//! Every source (the command line, the INI file, the declared defaults) is turned into a
//! [`Layer`] holding values already coerced to their declared types. Layers are figment
//! providers, so the resolver can stack them with [`figment::Figment::join`].

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::Path;

use clap::ArgMatches;
use figment::value::{Dict, Map, Tag, Value};
use figment::{Metadata, Profile, Provider};
use ini::{Ini, ParseOption};

use crate::error::ConfigError;
use crate::schema::{OptionType, OptionValue, Schema, ROOT_SECTION};

pub const COMMAND_LINE: &str = "command line";
pub const DEFAULTS: &str = "defaults";

#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    origin: String,
    values: Vec<(String, OptionValue)>,
}

impl Layer {
    pub fn new(origin: impl Into<String>) -> Layer {
        Layer {
            origin: origin.into(),
            values: Vec::new(),
        }
    }

    /// The declared default of every option
    pub fn defaults(schema: &Schema) -> Layer {
        let mut layer = Layer::new(DEFAULTS);
        for decl in schema.options() {
            layer.insert(decl.name(), decl.default_value().clone());
        }
        layer
    }

    /// Collect the declared options present on the command line
    ///
    /// `matches` must come from a command built by [`crate::config::build_command`] for the
    /// same schema.
    pub fn from_arg_matches(schema: &Schema, matches: &ArgMatches) -> Result<Layer, ConfigError> {
        let mut layer = Layer::new(COMMAND_LINE);
        for decl in schema.options() {
            let raw = matches.try_get_one::<String>(decl.name()).map_err(|e| {
                ConfigError::InvalidDeclaration {
                    name: decl.name().to_owned(),
                    reason: format!("not registered with the command line parser: {e}"),
                }
            })?;
            let Some(raw) = raw else {
                continue;
            };
            let value = decl
                .ty()
                .parse(raw)
                .map_err(|reason| ConfigError::InvalidValue {
                    origin: String::from(COMMAND_LINE),
                    name: decl.name().to_owned(),
                    value: raw.clone(),
                    expected: decl.ty(),
                    reason,
                })?;
            layer.insert(decl.name(), value);
        }
        Ok(layer)
    }

    /// Read an INI file, or `None` if it doesn't exist
    pub fn from_ini_file(schema: &Schema, path: &Path) -> Result<Option<Layer>, ConfigError> {
        match fs::read_to_string(path) {
            Ok(text) => Layer::from_ini_str(schema, &path.display().to_string(), &text).map(Some),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Parse INI text where `[section]` headers supply the prefix of each dotted name
    ///
    /// Keys before the first header, or under `[root]`, name options without a section.
    /// Unrecognized keys are skipped. Values of non-string options may end in a `#` or `;`
    /// comment.
    pub fn from_ini_str(schema: &Schema, origin: &str, text: &str) -> Result<Layer, ConfigError> {
        let options = ParseOption {
            enabled_quote: true,
            enabled_escape: false,
            ..ParseOption::default()
        };
        let ini = Ini::load_from_str_opt(text, options).map_err(|e| ConfigError::MalformedSource {
            origin: origin.to_owned(),
            message: e.to_string(),
        })?;

        let mut layer = Layer::new(origin);
        let mut seen = HashSet::new();
        for (section, properties) in ini.iter() {
            for (key, raw) in properties.iter() {
                let name = match section {
                    None | Some(ROOT_SECTION) => key.to_owned(),
                    Some(section) => format!("{section}.{key}"),
                };
                if !seen.insert(name.clone()) {
                    return Err(ConfigError::MalformedSource {
                        origin: origin.to_owned(),
                        message: format!("'{name}' is defined twice"),
                    });
                }

                let Some(decl) = schema.lookup(&name) else {
                    log::debug!("{origin}: ignoring unrecognized option '{name}'");
                    continue;
                };
                let literal = match decl.ty() {
                    OptionType::String => raw,
                    _ => strip_inline_comment(raw),
                };
                let value = decl
                    .ty()
                    .parse(literal)
                    .map_err(|reason| ConfigError::InvalidValue {
                        origin: origin.to_owned(),
                        name: name.clone(),
                        value: raw.to_owned(),
                        expected: decl.ty(),
                        reason,
                    })?;
                layer.insert(&name, value);
            }
        }
        Ok(layer)
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn get(&self, name: &str) -> Option<&OptionValue> {
        self.values
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    /// The names this layer supplies, in source order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.iter().map(|(name, _)| name.as_str())
    }

    /// Set a value, replacing any earlier one for the same name
    pub fn insert(&mut self, name: &str, value: OptionValue) {
        match self.values.iter_mut().find(|(key, _)| key == name) {
            Some(entry) => entry.1 = value,
            None => self.values.push((name.to_owned(), value)),
        }
    }
}

fn strip_inline_comment(raw: &str) -> &str {
    raw.find(|c| c == '#' || c == ';')
        .map_or(raw, |idx| raw[..idx].trim_end())
}

impl Provider for Layer {
    fn metadata(&self) -> Metadata {
        Metadata::named(self.origin.clone())
    }

    fn data(&self) -> Result<Map<Profile, Dict>, figment::Error> {
        let mut dict = Dict::new();
        for (name, value) in &self.values {
            let value = Value::serialize(value)?;
            match name.split_once('.') {
                Some((section, field)) => {
                    let entry = dict
                        .entry(section.to_owned())
                        .or_insert_with(|| Value::Dict(Tag::Default, Dict::new()));
                    match entry {
                        Value::Dict(_, fields) => {
                            fields.insert(field.to_owned(), value);
                        }
                        _ => {
                            return Err(figment::Error::from(format!(
                                "'{section}' is both an option and a section"
                            )))
                        }
                    }
                }
                None => {
                    dict.insert(name.clone(), value);
                }
            }
        }
        Ok(Profile::Default.collect(dict))
    }
}
