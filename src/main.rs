//! sizedupe - staged duplicate file finder
//!
//! Entry point for the sizedupe CLI application.

use clap::Parser;
use sizedupe::{
    cli::Cli,
    error::{ExitCode, StructuredError},
};

fn main() {
    let cli = Cli::parse();
    let json_errors = cli.json_errors;

    match sizedupe::run_app(cli) {
        Ok(code) => std::process::exit(code.as_i32()),
        Err(err) => {
            let exit_code = ExitCode::for_error(&err);

            if json_errors {
                let structured = StructuredError::new(&err, exit_code);
                match serde_json::to_string_pretty(&structured) {
                    Ok(json) => eprintln!("{}", json),
                    Err(_) => eprintln!("[{}] Error: {:#}", exit_code.code_prefix(), err),
                }
            } else {
                match sizedupe::error::failed_stage(&err) {
                    Some(stage) => eprintln!(
                        "[{}] Error in stage {}: {:#}",
                        exit_code.code_prefix(),
                        stage,
                        err
                    ),
                    None => eprintln!("[{}] Error: {:#}", exit_code.code_prefix(), err),
                }
            }

            std::process::exit(exit_code.as_i32());
        }
    }
}
