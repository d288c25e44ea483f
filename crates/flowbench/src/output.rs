use std::path::Path;

use libflowbench_core::{render_summary, BenchError, BenchmarkReport};
use serde::Serialize;

use crate::cli::Cli;

/// JSON response envelope
#[derive(Serialize)]
pub struct JsonResponse<T: Serialize> {
    pub schema_version: u32,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonError>,
}

#[derive(Serialize)]
pub struct JsonError {
    pub code: String,
    pub message: String,
    pub exit_code: i32,
}

#[derive(Serialize)]
struct RunOutput<'a> {
    output: &'a Path,
    report: &'a BenchmarkReport,
}

fn print_json<T: Serialize>(value: &T, to_stderr: bool) {
    match serde_json::to_string_pretty(value) {
        Ok(text) if to_stderr => eprintln!("{}", text),
        Ok(text) => println!("{}", text),
        Err(e) => eprintln!("error: failed to encode JSON output: {}", e),
    }
}

/// Output a successful result
pub fn output_success<T: Serialize>(cli: &Cli, data: T, human: impl FnOnce() -> String) {
    if cli.json {
        let response = JsonResponse {
            schema_version: 1,
            ok: true,
            data: Some(data),
            error: None,
        };
        print_json(&response, false);
    } else if !cli.quiet {
        println!("{}", human());
    }
}

/// Output the measured report after it was written to `output`
pub fn output_report(cli: &Cli, report: &BenchmarkReport, output: &Path) {
    let data = RunOutput { output, report };
    output_success(cli, data, || {
        format!("{}\nReport written to {}", render_summary(report), output.display())
    });
}

/// Output an error
pub fn output_error(cli: &Cli, err: &BenchError) {
    if cli.json {
        let response: JsonResponse<()> = JsonResponse {
            schema_version: 1,
            ok: false,
            data: None,
            error: Some(JsonError {
                code: err.error_code().to_string(),
                message: err.to_string(),
                exit_code: err.exit_code(),
            }),
        };
        print_json(&response, true);
    } else {
        eprintln!("error: {}", err);
    }
}
