use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Error};
use clap::ArgMatches;
use soyjs::machinery::parse;
use soyjs::{filter_tokens, tokenize_source, Compiler, Error as SoyError};
use tracing_subscriber::EnvFilter;

use crate::cli;
use crate::config::Config;
use crate::output::{Output, STDIN_STDOUT};

/// A template source read from disk or stdin.
struct Input {
    name: String,
    source: String,
}

fn load_config(matches: &ArgMatches) -> Result<Config, Error> {
    #[cfg(feature = "toml")]
    let mut config = {
        let path = matches
            .get_one::<PathBuf>("config-file")
            .cloned()
            .or_else(|| std::env::var_os("SOYJS_CONFIG_FILE").map(PathBuf::from));
        match path {
            Some(path) => Config::load_from_toml(&path)?,
            None => Config::default(),
        }
    };
    #[cfg(not(feature = "toml"))]
    let mut config = Config::default();

    config.update_from_env()?;
    config.update_from_matches(matches)?;
    Ok(config)
}

fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_env("SOYJS_LOG")
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "warn" }));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .without_time()
        .init();
}

fn read_inputs(paths: &[PathBuf]) -> Result<Vec<Input>, Error> {
    let mut stdin_used = false;
    let mut rv = Vec::with_capacity(paths.len());
    for path in paths {
        let source = if path == Path::new(STDIN_STDOUT) {
            if stdin_used {
                bail!("stdin can only be used once as input");
            }
            stdin_used = true;
            io::read_to_string(io::stdin()).context("unable to read template from stdin")?
        } else {
            fs::read_to_string(path)
                .with_context(|| format!("unable to read template '{}'", path.display()))?
        };
        rv.push(Input {
            name: path.display().to_string(),
            source,
        });
    }
    Ok(rv)
}

fn load_data(path: Option<&PathBuf>) -> Result<serde_json::Value, Error> {
    let path = match path {
        Some(path) => path,
        None => return Ok(serde_json::Value::Object(Default::default())),
    };
    let contents = if path == Path::new(STDIN_STDOUT) {
        io::read_to_string(io::stdin()).context("unable to read data from stdin")?
    } else {
        fs::read_to_string(path)
            .with_context(|| format!("unable to read data file '{}'", path.display()))?
    };
    serde_json::from_str(&contents).context("failed to interpret input data as JSON")
}

fn dump(output: &mut Output, kind: &str, input: &Input) -> Result<(), Error> {
    let tokens = tokenize_source(&input.source, &input.name)?;
    match kind {
        "tokens" => {
            for token in &tokens {
                writeln!(output, "{:?}", token)?;
            }
        }
        "ast" => {
            let unit = parse(&filter_tokens(&tokens))?;
            writeln!(output, "{:#?}", unit)?;
        }
        _ => unreachable!(),
    }
    Ok(())
}

pub fn execute() -> Result<i32, Error> {
    let matches = cli::make_command().get_matches();
    let config = load_config(&matches)?;
    init_logging(config.verbose());

    let paths: Vec<PathBuf> = matches
        .get_many::<PathBuf>("templates")
        .unwrap_or_default()
        .cloned()
        .collect();
    let inputs = read_inputs(&paths)?;
    let compiler = Compiler::with_config(config.compiler_config().clone());
    let mut output = Output::new(matches.get_one::<PathBuf>("output").unwrap())?;

    if let Some(kind) = matches.get_one::<String>("dump") {
        for input in &inputs {
            dump(&mut output, kind, input)?;
        }
    } else if let Some(name) = matches.get_one::<String>("render") {
        let input = match &inputs[..] {
            [input] => input,
            _ => bail!("--render needs exactly one template"),
        };
        let data = load_data(matches.get_one::<PathBuf>("data"))?;
        let unit = compiler.compile_unit_from_source(&input.source, &input.name)?;
        let rv = unit.render(name, &data)?;
        writeln!(output, "{}", rv)?;
    } else {
        for (idx, input) in inputs.iter().enumerate() {
            if idx > 0 {
                writeln!(output)?;
            }
            tracing::debug!(template = %input.name, "compiling");
            let js = compiler.compile_source(&input.source, &input.name)?;
            output.write_all(js.as_bytes())?;
        }
    }

    output.commit()?;
    Ok(0)
}

pub fn print_error(err: &Error) {
    eprintln!("error: {err}");
    if let Some(err) = err.downcast_ref::<SoyError>() {
        if err.name().is_some() {
            eprintln!("{}", err.display_debug_info());
        }
    }
    let mut source_opt = err.source();
    while let Some(source) = source_opt {
        eprintln!();
        eprintln!("caused by: {source}");
        source_opt = source.source();
    }
}
