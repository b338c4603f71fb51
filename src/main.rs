use std::io::Write;
use std::process::ExitCode;

use flagstore::error::ConfigError;
use flagstore::module1::Module1;
use flagstore::{config, layering};
use log::LevelFilter;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => match err.downcast::<ConfigError>() {
            Ok(ConfigError::CommandLine(e)) => e.exit(),
            Ok(e) => {
                log::error!("{e}");
                ExitCode::from(e.kind().exit_code())
            }
            Err(e) => {
                eprintln!("Error: {e:#}");
                ExitCode::FAILURE
            }
        },
    }
}

fn run() -> anyhow::Result<()> {
    // Let everything through stderrlog, and filter with the log max level once the command line
    // says how verbose to be.
    stderrlog::new()
        .show_module_names(true)
        .color(stderrlog::ColorChoice::Auto)
        .verbosity(log::Level::Trace)
        .init()?;
    log::set_max_level(LevelFilter::Warn);

    let schema = layering::declared_schema()?;
    let command_line = layering::get_command_line(&schema)?;
    log::set_max_level(command_line.cli.log_level());
    for arg in &command_line.ignored {
        log::warn!("Ignoring unrecognized argument '{arg}'");
    }

    let mut stdout = std::io::stdout().lock();
    if command_line.cli.print_defaults {
        write!(stdout, "{}", config::documented_defaults(&schema))?;
        return Ok(());
    }

    let store = layering::get_layered_configs(schema, &command_line)?;
    let module = Module1::from_store(&store)?;

    if command_line.cli.print_flags {
        store.report(&mut stdout)?;
    }
    module.report(&mut stdout)?;
    Ok(())
}
