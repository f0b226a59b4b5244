mod cli;
mod command;
mod config;
mod output;

fn main() {
    match command::execute() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            command::print_error(&err);
            std::process::exit(1);
        }
    }
}
