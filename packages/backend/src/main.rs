use std::io::Read;
use std::process::ExitCode;

use aquastat_backend::config::Config;
use aquastat_backend::logging;
use aquastat_backend::response::AppError;
use aquastat_backend::service;

/// 读取请求：文件路径参数，或省略 / "-" 时读 stdin
fn read_input(path: Option<String>) -> std::io::Result<String> {
    match path.as_deref() {
        None | Some("-") => {
            let mut input = String::new();
            std::io::stdin().read_to_string(&mut input)?;
            Ok(input)
        }
        Some(path) => std::fs::read_to_string(path),
    }
}

fn emit(body: &impl serde::Serialize) {
    match serde_json::to_string_pretty(body) {
        Ok(json) => println!("{json}"),
        Err(err) => eprintln!("failed to serialize response: {err}"),
    }
}

fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    let config = Config::from_env();
    let _log_guard = logging::init_tracing(&config);

    let input = match read_input(std::env::args().nth(1)) {
        Ok(input) => input,
        Err(err) => {
            emit(&AppError::from(err).into_response());
            return ExitCode::FAILURE;
        }
    };

    match service::process(&input, &config) {
        Ok(body) => {
            emit(&body);
            ExitCode::SUCCESS
        }
        Err(body) => {
            emit(&body);
            ExitCode::FAILURE
        }
    }
}
