use std::io::{self, Write};

use documented::{Documented, DocumentedFields};
use struct_field_names_as_array::FieldNamesAsArray;

use crate::error::ConfigError;
use crate::resolver::{FlagStore, ModuleConfig};
use crate::schema::{FlagType, Schema};

/// Settings for the example module
#[derive(Debug, Clone, PartialEq, Eq, Documented, DocumentedFields, FieldNamesAsArray)]
pub struct Module1Config {
    /// Number of test iterations to run
    test: u64,

    /// Words the module greets with
    words: String,

    /// Whether the module says hello on startup
    hello: bool,

    /// Secondary test counter
    test2: u32,
}

impl Default for Module1Config {
    fn default() -> Module1Config {
        Module1Config {
            test: 5,
            words: String::from("hello"),
            hello: true,
            test2: 6,
        }
    }
}

impl Module1Config {
    /// Build a configuration from explicit values, without consulting any [`FlagStore`]
    pub fn new(test: u64, words: impl Into<String>, hello: bool, test2: u32) -> Module1Config {
        Module1Config {
            test,
            words: words.into(),
            hello,
            test2,
        }
    }

    pub fn test(&self) -> u64 {
        self.test
    }

    pub fn words(&self) -> &str {
        &self.words
    }

    pub fn hello(&self) -> bool {
        self.hello
    }

    pub fn test2(&self) -> u32 {
        self.test2
    }

    fn declare_field<T: FlagType>(
        schema: &mut Schema,
        field: &str,
        default: T,
    ) -> Result<(), ConfigError> {
        let decl = schema.declare(
            format!("{}.{field}", Self::SECTION),
            T::TYPE,
            default.into(),
        )?;
        if let Ok(docs) = Self::get_field_comment(field) {
            decl.set_help(docs);
        }
        Ok(())
    }
}

impl ModuleConfig for Module1Config {
    const SECTION: &'static str = "module1";

    fn declare(schema: &mut Schema) -> Result<(), ConfigError> {
        let defaults = Module1Config::default();
        schema.document_section(Self::SECTION, Self::DOCS);
        Self::declare_field(schema, "test", defaults.test)?;
        Self::declare_field(schema, "words", defaults.words)?;
        Self::declare_field(schema, "hello", defaults.hello)?;
        Self::declare_field(schema, "test2", defaults.test2)?;
        Ok(())
    }

    fn bind(store: &FlagStore) -> Result<Module1Config, ConfigError> {
        let mut binding = store.binding(Self::SECTION);
        let test = binding.field("test");
        let words = binding.field("words");
        let hello = binding.field("hello");
        let test2 = binding.field("test2");

        match (test, words, hello, test2) {
            (Some(test), Some(words), Some(hello), Some(test2)) => Ok(Module1Config {
                test,
                words,
                hello,
                test2,
            }),
            _ => Err(binding.into_error()),
        }
    }
}

pub struct Module1 {
    config: Module1Config,
}

impl Module1 {
    pub fn new(config: Module1Config) -> Module1 {
        log::debug!("Constructed module1 with {config:?}");
        Module1 { config }
    }

    /// Bind the configuration from `store` and construct the module
    pub fn from_store(store: &FlagStore) -> Result<Module1, ConfigError> {
        let config = Module1Config::bind(store)?;
        Ok(Module1::new(config))
    }

    pub fn config(&self) -> &Module1Config {
        &self.config
    }

    /// Write one line per field, in the order test, words, test2, hello
    pub fn report(&self, out: &mut impl Write) -> io::Result<()> {
        let config = self.config();
        writeln!(out, "{}", config.test())?;
        writeln!(out, "{}", config.words())?;
        writeln!(out, "{}", config.test2())?;
        writeln!(out, "{}", config.hello())?;
        Ok(())
    }
}
