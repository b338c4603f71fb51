use std::ffi::OsString;
use std::path::PathBuf;

use clap::{Arg, ArgAction, ArgMatches, Command, CommandFactory, FromArgMatches, Parser};
use log::LevelFilter;

use crate::error::ConfigError;
use crate::schema::Schema;

/// Help heading the declared options are listed under
const OPTIONS_HEADING: &str = "Module options";

#[derive(Debug, Clone, PartialEq, Eq, Parser)]
#[clap(version, about)]
pub struct CliConfig {
    /// Path to the INI config file. A missing file leaves every option at its default
    #[clap(short = 'c', long, default_value = "config.ini")]
    pub config_file: PathBuf,

    /// Disable reading the --config-file
    #[clap(long)]
    pub no_config: bool,

    /// Print every resolved option and the source it came from
    #[clap(long)]
    pub print_flags: bool,

    /// Print a config file documenting every default, then exit
    #[clap(long)]
    pub print_defaults: bool,

    /// Increase log verbosity. May be given more than once
    #[clap(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Only log errors
    #[clap(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

impl CliConfig {
    pub fn log_level(&self) -> LevelFilter {
        if self.quiet {
            return LevelFilter::Error;
        }
        match self.verbose {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    }
}

/// A parsed command line
#[derive(Debug, Clone)]
pub struct CommandLine {
    pub cli: CliConfig,
    /// Raw matches, holding the declared options as strings
    pub matches: ArgMatches,
    /// Unrecognized arguments that were dropped before parsing
    pub ignored: Vec<String>,
}

/// The [`CliConfig`] command, plus a `--<name> <VALUE>` argument per declared option
///
/// The declared options get no clap default, so that only values the user actually passed
/// show up in the matches and the lower layers can fill in the rest.
pub fn build_command(schema: &Schema) -> Result<Command, ConfigError> {
    let mut command = CliConfig::command();
    let builtin = builtin_names(&command);

    for decl in schema.options() {
        if builtin.iter().any(|name| name == decl.name()) {
            return Err(ConfigError::InvalidDeclaration {
                name: decl.name().to_owned(),
                reason: format!("conflicts with the built-in '{}' argument", decl.name()),
            });
        }
        let help = match decl.help() {
            Some(help) => format!("{help} [default: {}]", decl.default_value()),
            None => format!("[default: {}]", decl.default_value()),
        };
        // The token after the flag is always its value, even `-5`
        let arg = Arg::new(decl.name().to_owned())
            .long(decl.name().to_owned())
            .value_name(decl.ty().value_name())
            .num_args(1)
            .allow_hyphen_values(true)
            .action(ArgAction::Set)
            .help(help)
            .help_heading(OPTIONS_HEADING);
        command = command.arg(arg);
    }
    Ok(command)
}

/// Parse `args` (including the binary name) against the built-in and declared flags
pub fn parse_command_line<I, T>(schema: &Schema, args: I) -> Result<CommandLine, ConfigError>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    let command = build_command(schema)?;
    let (args, ignored) = retain_known_args(&command, args.into_iter().map(Into::into));
    let matches = command.try_get_matches_from(args)?;
    let cli = CliConfig::from_arg_matches(&matches)?;
    Ok(CommandLine {
        cli,
        matches,
        ignored,
    })
}

/// Ids and long names clap already uses for its own arguments
fn builtin_names(command: &Command) -> Vec<String> {
    command
        .get_arguments()
        .flat_map(|arg| [Some(arg.get_id().as_str()), arg.get_long()])
        .flatten()
        .chain(["help", "version"])
        .map(str::to_owned)
        .collect()
}

/// Flags a command accepts, each with whether it takes a value
struct KnownFlags {
    longs: Vec<(String, bool)>,
    shorts: Vec<(char, bool)>,
}

impl KnownFlags {
    fn of(command: &Command) -> KnownFlags {
        let mut longs = vec![(String::from("help"), false), (String::from("version"), false)];
        let mut shorts = vec![('h', false), ('V', false)];
        for arg in command.get_arguments() {
            let takes_value = arg.get_action().takes_values();
            if let Some(long) = arg.get_long() {
                longs.push((long.to_owned(), takes_value));
            }
            if let Some(short) = arg.get_short() {
                shorts.push((short, takes_value));
            }
        }
        KnownFlags { longs, shorts }
    }

    /// `Some(true)` if the flag is known and its value is the next token
    fn long(&self, flag: &str) -> Option<bool> {
        let (name, inline_value) = match flag.split_once('=') {
            Some((name, _)) => (name, true),
            None => (flag, false),
        };
        self.longs
            .iter()
            .find(|(long, _)| long == name)
            .map(|(_, takes_value)| *takes_value && !inline_value)
    }

    /// Like [`KnownFlags::long`] for a cluster such as `vv` or `cpath.ini`
    ///
    /// Everything after a short that takes a value is that value.
    fn short_cluster(&self, cluster: &str) -> Option<bool> {
        for (idx, c) in cluster.char_indices() {
            let (_, takes_value) = self.shorts.iter().find(|(short, _)| *short == c)?;
            if *takes_value {
                return Some(idx + c.len_utf8() == cluster.len());
            }
        }
        Some(false)
    }
}

/// Split off `--long` and `-s` flags the command doesn't know
///
/// An unknown flag without an inline `=value` also takes the following non-flag token with
/// it. A short cluster is dropped as a whole if any of its flags is unknown. Everything after
/// a bare `--` is kept.
fn retain_known_args(
    command: &Command,
    args: impl Iterator<Item = OsString>,
) -> (Vec<OsString>, Vec<String>) {
    let known = KnownFlags::of(command);

    let mut args = args.peekable();
    let mut kept: Vec<OsString> = args.next().into_iter().collect();
    let mut ignored = Vec::new();
    let mut pending_value = false;

    while let Some(arg) = args.next() {
        if pending_value {
            pending_value = false;
            kept.push(arg);
            continue;
        }
        let Some(text) = arg.to_str() else {
            kept.push(arg);
            continue;
        };
        if text == "--" {
            kept.push(arg);
            kept.extend(args.by_ref());
            break;
        }

        let known_flag = if let Some(flag) = text.strip_prefix("--") {
            known.long(flag)
        } else if let Some(cluster) = text.strip_prefix('-').filter(|c| !c.is_empty()) {
            known.short_cluster(cluster)
        } else {
            kept.push(arg);
            continue;
        };

        match known_flag {
            Some(takes_next) => {
                pending_value = takes_next;
                kept.push(arg);
            }
            None => {
                ignored.push(text.to_owned());
                if !text.contains('=') {
                    if let Some(value) =
                        args.next_if(|next| !next.to_string_lossy().starts_with('-'))
                    {
                        ignored.push(value.to_string_lossy().into_owned());
                    }
                }
            }
        }
    }
    (kept, ignored)
}

fn docstring_to_ini_comment(docstring: &str) -> String {
    let mut ini_comment = String::new();
    for line in docstring.lines() {
        let ini_line = if line.is_empty() {
            String::from("#\n")
        } else {
            format!("# {line}\n")
        };
        ini_comment.push_str(&ini_line);
    }
    ini_comment
}

/// Render every declared default as an INI document, each key prefixed with its documentation
///
/// Options without a section come first, followed by one `[section]` per section in the order
/// the sections were first declared.
pub fn documented_defaults(schema: &Schema) -> String {
    let mut sections: Vec<Option<&str>> = Vec::new();
    if schema.options().iter().any(|decl| decl.section().is_none()) {
        sections.push(None);
    }
    for decl in schema.options() {
        if let Some(section) = decl.section() {
            if !sections.contains(&Some(section)) {
                sections.push(Some(section));
            }
        }
    }

    let mut ini = String::new();
    for section in sections {
        if !ini.is_empty() {
            ini.push('\n');
        }
        if let Some(section) = section {
            if let Some(docs) = schema.section_docs(section) {
                ini.push_str(&docstring_to_ini_comment(docs));
            }
            ini.push_str(&format!("[{section}]\n"));
        }

        let decls = schema
            .options()
            .iter()
            .filter(|decl| decl.section() == section);
        for (idx, decl) in decls.enumerate() {
            // Visually separate each key from the previous one
            if idx > 0 {
                ini.push('\n');
            }
            if let Some(help) = decl.help() {
                ini.push_str(&docstring_to_ini_comment(help));
            }
            ini.push_str(&format!(
                "{} = {}\n",
                decl.field(),
                decl.default_value().to_ini_literal()
            ));
        }
    }
    ini
}
