use std::path::PathBuf;

use clap::{arg, command, value_parser, ArgAction, Command};

const CODEGEN: &str = "Code Generation";
const ADVANCED: &str = "Advanced";

pub(super) fn make_command() -> Command {
    command!()
        .name("soyjs")
        .max_term_width(120)
        .args([
            #[cfg(feature = "toml")]
            arg!(--"config-file" <PATH> "Alternative path to the config file")
                .value_parser(value_parser!(PathBuf))
                .long_help("\
                    Loads the configuration from a TOML file.  Keys at the top level configure \
                    the command line tool, the [compiler] table configures code generation.\n\n\
                    [env var: SOYJS_CONFIG_FILE]"),
            arg!(-o --output <FILENAME> "Path to the output file")
                .default_value("-")
                .value_parser(value_parser!(PathBuf))
                .long_help("\
                    Path to the output file.  The file is written to a temporary file next to \
                    the target first and only moved into place once compilation succeeded.  \
                    The default (-) writes to stdout."),
            arg!(--"msg-function" <NAME> "The message formatting function")
                .long_help("\
                    Name of the JavaScript function that formats messages.  The default is \
                    goog.getMsg.\n\n\
                    [env var: SOYJS_MSG_FUNCTION]")
                .help_heading(CODEGEN),
            arg!(--"provide-function" <NAME> "The namespace declaration function")
                .help_heading(CODEGEN),
            arg!(--"require-function" <NAME> "The dependency import function")
                .help_heading(CODEGEN),
            arg!(-r --require <NAMESPACE> "Namespace to require in every output")
                .long_help("\
                    Namespace to require at the top of every compiled file.  Can be supplied \
                    multiple times, replacing the configured list (soy by default).\n\n\
                    [env var: SOYJS_REQUIRES]")
                .action(ArgAction::Append)
                .help_heading(CODEGEN),
            arg!(--"no-requires" "Do not emit any require calls")
                .conflicts_with("require")
                .help_heading(CODEGEN),
            arg!(--indent <SPACES> "Spaces per indentation level")
                .value_parser(value_parser!(usize))
                .help_heading(CODEGEN),
            arg!(--dump <KIND> "Dump internals of a template")
                .value_parser(["tokens", "ast"])
                .help_heading(ADVANCED),
            arg!(--render <NAME> "Render a template instead of compiling")
                .long_help("\
                    Renders the named template with the built-in renderer instead of emitting \
                    JavaScript.  The name may be fully qualified or relative to the namespace \
                    (.Name).  Only a single input file is allowed.")
                .conflicts_with("dump")
                .help_heading(ADVANCED),
            arg!(-d --data <PATH> "Path to a JSON file with render data")
                .value_parser(value_parser!(PathBuf))
                .requires("render")
                .help_heading(ADVANCED),
            arg!(-v --verbose "Log what the compiler is doing to stderr")
                .long_help("\
                    Enables debug logging.  For finer control set SOYJS_LOG to a tracing \
                    filter directive (eg: SOYJS_LOG=soyjs=trace)."),
            arg!(templates: [TEMPLATE] "Paths to the input templates")
                .action(ArgAction::Append)
                .value_parser(value_parser!(PathBuf))
                .default_value("-"),
        ])
        .about("soyjs compiles Soy-style templates with translatable messages to JavaScript.")
}
