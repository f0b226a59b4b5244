use std::env;

use anyhow::{bail, Error};
use clap::ArgMatches;
use serde::{Deserialize, Serialize};
use soyjs::CompilerConfig;

/// Holds in-memory config state for the execution.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Config {
    verbose: bool,
    compiler: CompilerConfig,
}

impl Config {
    #[cfg(feature = "toml")]
    pub fn load_from_toml(p: &std::path::Path) -> Result<Config, Error> {
        use anyhow::Context;
        let contents = std::fs::read_to_string(p)
            .with_context(|| format!("unable to read config file '{}'", p.display()))?;
        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("invalid config file '{}'", p.display()))?;
        Ok(cfg)
    }

    pub fn update_from_env(&mut self) -> Result<(), Error> {
        if let Ok(msg_function) = env::var("SOYJS_MSG_FUNCTION") {
            self.compiler.msg_function = msg_function;
        }
        if let Ok(requires) = env::var("SOYJS_REQUIRES") {
            self.compiler.requires = requires
                .split(',')
                .map(|x| x.trim())
                .filter(|x| !x.is_empty())
                .map(String::from)
                .collect();
        }
        if let Ok(verbose) = env::var("SOYJS_VERBOSE") {
            self.verbose = parse_env_bool(&verbose, "SOYJS_VERBOSE")?;
        }
        Ok(())
    }

    pub fn update_from_matches(&mut self, matches: &ArgMatches) -> Result<(), Error> {
        let compiler = &mut self.compiler;
        if let Some(name) = matches.get_one::<String>("msg-function") {
            compiler.msg_function = name.clone();
        }
        if let Some(name) = matches.get_one::<String>("provide-function") {
            compiler.provide_function = name.clone();
        }
        if let Some(name) = matches.get_one::<String>("require-function") {
            compiler.require_function = name.clone();
        }
        if let Some(requires) = matches.get_many::<String>("require") {
            compiler.requires = requires.cloned().collect();
        }
        if matches.get_flag("no-requires") {
            compiler.requires.clear();
        }
        if let Some(indent) = matches.get_one::<usize>("indent") {
            compiler.indent = *indent;
        }
        if matches.get_flag("verbose") {
            self.verbose = true;
        }
        if compiler.msg_function.is_empty() {
            bail!("the message function name cannot be empty");
        }
        Ok(())
    }

    pub fn verbose(&self) -> bool {
        self.verbose
    }

    pub fn compiler_config(&self) -> &CompilerConfig {
        &self.compiler
    }
}

fn parse_env_bool(s: &str, var_name: &str) -> Result<bool, Error> {
    match s.to_lowercase().as_str() {
        "0" | "false" | "no" | "off" => Ok(false),
        "1" | "true" | "yes" | "on" => Ok(true),
        _ => bail!("Invalid boolean value for {}: {}", var_name, s),
    }
}
