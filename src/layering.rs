use std::ffi::OsString;

use crate::config::{parse_command_line, CommandLine};
use crate::error::ConfigError;
use crate::module1::Module1Config;
use crate::resolver::{FlagStore, Resolver, SourceStatus};
use crate::schema::Schema;

/// Every option the binary recognizes
pub fn declared_schema() -> Result<Schema, ConfigError> {
    let mut schema = Schema::new();
    schema.declare_module::<Module1Config>()?;
    Ok(schema)
}

/// Parse the process arguments against `schema`
pub fn get_command_line(schema: &Schema) -> Result<CommandLine, ConfigError> {
    parse_command_line(schema, std::env::args_os())
}

/// Resolve `schema` from the command line, then the config file, then the declared defaults
pub fn get_layered_configs(
    schema: Schema,
    command_line: &CommandLine,
) -> Result<FlagStore, ConfigError> {
    let mut resolver = Resolver::new(schema).parse_args(&command_line.matches)?;

    // Only look at the config file if we're using it. It's fine for it not to exist.
    if !command_line.cli.no_config {
        let (with_file, status) = resolver.parse_file(&command_line.cli.config_file)?;
        if status == SourceStatus::Loaded {
            log::info!(
                "Loaded config file {}",
                command_line.cli.config_file.display()
            );
        }
        resolver = with_file;
    }

    Ok(resolver.resolve())
}

/// [`get_layered_configs`] for an explicit argument list, including the binary name
pub fn get_layered_configs_from_args<I, T>(
    schema: Schema,
    args: I,
) -> Result<FlagStore, ConfigError>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    let command_line = parse_command_line(&schema, args)?;
    get_layered_configs(schema, &command_line)
}
