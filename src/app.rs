//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - loads `.env` and parses CLI arguments
//! - sets up logging
//! - dispatches to the fit pipeline, formula tools, integration, or the HTTP server
//! - prints reports/plots and writes optional exports

use std::fs::File;
use std::io::Write;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command, FitArgs, FormulaArgs, IntegrateArgs, NsigmaArgs, SampleArgs, ServeArgs};
use crate::data::{SampleSpec, generate_sample};
use crate::error::{AppError, EXIT_INPUT, EXIT_SERVER};
use crate::formula::{FormulaRequest, NSigmaRequest, compare, evaluate_formula};
use crate::integrate::{Integral1dRequest, IntegralMultiRequest, integrate_1d, integrate_multi};
use crate::server::ServerConfig;

pub mod pipeline;

/// Entry point for the `labfit` binary.
pub fn run() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let default_filter = match cli.command {
        Command::Serve(_) => "info,tower_http=debug",
        _ => "warn",
    };
    init_tracing(default_filter);

    match cli.command {
        Command::Fit(args) => handle_fit(args),
        Command::Sample(args) => handle_sample(args),
        Command::Formula(args) => handle_formula(args),
        Command::Nsigma(args) => handle_nsigma(args),
        Command::Integrate(args) => handle_integrate(args),
        Command::Serve(args) => handle_serve(args),
    }
}

fn init_tracing(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    // Logs go to stderr so stdout stays clean for JSON output.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn handle_fit(args: FitArgs) -> Result<(), AppError> {
    let options = args.tuning.options();
    let input = pipeline::load_input(&args)?;
    let batch = input.batch;
    let runs = pipeline::run_fits(input, &options);

    if batch {
        let results: Vec<serde_json::Value> = runs.iter().map(|r| crate::io::outcome_json(&r.outcome)).collect();
        print_json(&serde_json::json!({ "results": results }))?;
        let failed = runs.iter().filter(|r| r.outcome.is_err()).count();
        if failed > 0 {
            return Err(AppError::new(
                EXIT_INPUT,
                format!("{failed} of {} fits failed.", runs.len()),
            ));
        }
        return Ok(());
    }

    let Some(run) = runs.into_iter().next() else {
        return Err(AppError::new(EXIT_INPUT, "No fit requests found."));
    };
    let result = run.outcome?;
    let request = run.request;

    if args.json {
        print_json(&result)?;
    } else {
        println!("{}", crate::report::format_fit_summary(&result));
        if args.residuals {
            println!(
                "{}",
                crate::report::format_residual_table(&request.x_data, &request.y_data, &result)
            );
        }
        if args.plot {
            let plot = crate::plot::render_fit_plot(&request.x_data, &request.y_data, &result, args.width, args.height);
            println!("{plot}");
        }
    }

    if let Some(path) = &args.export {
        crate::io::write_result_json(path, &request, &result)?;
    }
    if let Some(path) = &args.export_residuals {
        crate::io::write_residuals_csv(path, &request, &result)?;
    }

    Ok(())
}

fn handle_sample(args: SampleArgs) -> Result<(), AppError> {
    let spec = SampleSpec {
        model: args.model,
        params: args.params,
        x_min: args.x_min,
        x_max: args.x_max,
        count: args.count,
        noise: args.noise,
        seed: args.seed,
        with_errors: args.with_errors,
    };
    let request = generate_sample(&spec)?;

    match &args.out {
        Some(path) => {
            let file = File::create(path)
                .map_err(|e| AppError::new(EXIT_INPUT, format!("Failed to create '{}': {e}", path.display())))?;
            serde_json::to_writer_pretty(file, &request)
                .map_err(|e| AppError::new(EXIT_INPUT, format!("Failed to write sample JSON: {e}")))
        }
        None => print_json(&request),
    }
}

fn handle_formula(args: FormulaArgs) -> Result<(), AppError> {
    let request = FormulaRequest {
        expression: args.expression.clone(),
        is_latex: args.latex,
        variables: args.vars.into_iter().collect(),
        uncertainties: args.sigmas.into_iter().collect(),
    };
    let result = evaluate_formula(&request)?;
    if args.json {
        print_json(&result)
    } else {
        print!("{}", crate::report::format_formula_result(&args.expression, &result));
        Ok(())
    }
}

fn handle_nsigma(args: NsigmaArgs) -> Result<(), AppError> {
    let request = NSigmaRequest {
        value1: Some(args.value1),
        uncertainty1: Some(args.uncertainty1),
        value2: Some(args.value2),
        uncertainty2: Some(args.uncertainty2),
    };
    let result = compare(&request)?;
    if args.json {
        print_json(&result)
    } else {
        print!("{}", crate::report::format_nsigma_result(&result));
        Ok(())
    }
}

fn handle_integrate(args: IntegrateArgs) -> Result<(), AppError> {
    if let [(a, b)] = args.bounds[..] {
        let request = Integral1dRequest {
            function: args.function.clone(),
            bounds: vec![a, b],
            method: Some(args.method.id().to_string()),
        };
        let result = integrate_1d(&request)?;
        return if args.json {
            print_json(&result)
        } else {
            print!("{}", crate::report::format_integral_1d(&args.function, args.method, &result));
            Ok(())
        };
    }

    let request = IntegralMultiRequest {
        function: args.function.clone(),
        bounds: args.bounds.iter().map(|&(lo, hi)| vec![lo, hi]).collect(),
        condition: args.condition,
        num_samples: args.samples,
        seed: args.seed,
    };
    let result = integrate_multi(&request)?;
    if args.json {
        print_json(&result)
    } else {
        print!("{}", crate::report::format_integral_multi(&args.function, &result));
        Ok(())
    }
}

fn handle_serve(args: ServeArgs) -> Result<(), AppError> {
    if args.threads > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(args.threads)
            .build_global()
            .map_err(|e| AppError::new(EXIT_SERVER, format!("Failed to configure worker threads: {e}")))?;
    }

    let config = ServerConfig {
        host: args.host,
        port: args.port,
        max_body_mb: args.max_body_mb,
        cors_origins: args.cors_origins,
        fit_options: args.tuning.options(),
    };

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| AppError::new(EXIT_SERVER, format!("Failed to start async runtime: {e}")))?;
    runtime
        .block_on(crate::server::serve(config))
        .map_err(|e| AppError::new(EXIT_SERVER, format!("Server error: {e:#}")))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), AppError> {
    let mut stdout = std::io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, value)
        .map_err(|e| AppError::new(EXIT_INPUT, format!("Failed to write JSON: {e}")))?;
    writeln!(stdout).map_err(|e| AppError::new(EXIT_INPUT, format!("Failed to write output: {e}")))
}
