use std::{env, process};

use vetcare::{
    cli::{self, output, CliContext},
    errors::CliError,
    init,
};

fn main() {
    init();

    let args: Vec<String> = env::args().skip(1).collect();
    let mut context = CliContext::new(cli::resolve_home());

    if let Err(err) = cli::run(&mut context, &args) {
        match &err {
            CliError::App(app_err) => {
                tracing::error!(error = %app_err, "command failed");
                output::error(app_err.user_message());
            }
            CliError::UnknownCommand(_) => {
                output::error(format!("{}. Type `help` to see available commands.", err));
            }
            CliError::InvalidArguments(_) => output::error(&err),
        }
        process::exit(1);
    }
}
