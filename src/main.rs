use std::{
    fs,
    io::{self, Write},
    process,
    sync::Arc,
};

use mason_filter::{
    application::{error::AppError, filter::FilterRegistry, page::PageDocument, request::Request},
    cache::{self, CacheConfig},
    config,
    infra::{error::InfraError, telemetry},
};
use serde::Serialize;
use tracing::{Dispatch, Level, dispatcher, error, info};
use tracing_subscriber::fmt as tracing_fmt;

fn main() {
    if let Err(error) = run() {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    let report = error.report();

    if dispatcher::has_been_set() {
        error!(
            source = report.source,
            error = %error,
            chain = ?report.messages,
            "application error"
        );
        return;
    }

    let subscriber = tracing_fmt()
        .with_writer(io::stderr)
        .with_max_level(Level::ERROR)
        .finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(
            source = report.source,
            error = %error,
            chain = ?report.messages,
            "application error"
        );
    });
}

fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()?;

    telemetry::init(&settings.logging)?;

    match cli_args.command {
        config::Command::Render(args) => run_render(&settings, args),
        config::Command::Filters(args) => run_filters(args),
    }
}

fn run_render(settings: &config::Settings, args: config::RenderArgs) -> Result<(), AppError> {
    let document = PageDocument::load(&args.file)?;

    let filters = Arc::new(FilterRegistry::standard());
    let backend = cache::backend_from_config(&CacheConfig::from(&settings.cache));
    let mut request = Request::new(filters, backend);
    let output = document.render(&mut request)?;

    match args.output {
        Some(path) => {
            fs::write(&path, &output).map_err(InfraError::from)?;
            info!(
                target = "mason_filter::render",
                path = %path.display(),
                bytes = output.len(),
                "Rendered page written"
            );
        }
        None => {
            let mut stdout = io::stdout().lock();
            stdout
                .write_all(output.as_bytes())
                .and_then(|()| stdout.flush())
                .map_err(InfraError::from)?;
        }
    }

    Ok(())
}

#[derive(Serialize)]
struct FilterListing<'a> {
    name: &'a str,
    summary: &'a str,
}

fn run_filters(args: config::FiltersArgs) -> Result<(), AppError> {
    let registry = FilterRegistry::standard();
    let listing: Vec<FilterListing<'_>> = registry
        .describe()
        .map(|(name, summary)| FilterListing { name, summary })
        .collect();

    let rendered = if args.json {
        let mut json = serde_json::to_string_pretty(&listing)
            .map_err(|err| InfraError::serialization(err.to_string()))?;
        json.push('\n');
        json
    } else {
        let width = listing.iter().map(|entry| entry.name.len()).max().unwrap_or(0);
        listing
            .iter()
            .map(|entry| format!("{:width$}  {}\n", entry.name, entry.summary))
            .collect()
    };

    io::stdout()
        .lock()
        .write_all(rendered.as_bytes())
        .map_err(InfraError::from)?;
    Ok(())
}
