mod args;
mod insight;

use std::time::Duration;

use clap::Parser;
use log::{debug, LevelFilter};

use crate::args::{Args, Command};
use crate::insight::*;

fn run(args: Args) -> InsightResult<()> {
    match args.command {
        Command::View {
            sources,
            selection,
            out,
            reference,
            colors,
        } => {
            let data = DataSources {
                geo: sources.geo,
                results: sources.results,
                ui_config: sources.ui_config,
                timeout: Duration::from_secs(sources.timeout_secs),
            };
            let request = ViewRequest {
                fragment: selection.fragment,
                year: selection.year,
                office: selection.office,
                metric: selection.metric,
                county: selection.county,
                senior: selection.senate,
                junior: selection.house,
                precinct: selection.precinct,
                search: selection.search,
            };
            run_view(
                &data,
                &request,
                out.as_deref(),
                reference.as_deref(),
                colors,
            )
        }
        Command::Melt {
            input,
            year,
            out,
            excel_worksheet_name,
        } => {
            melt::run_melt(&input, year, &out, excel_worksheet_name.as_deref())?;
            Ok(())
        }
    }
}

fn main() {
    let args = Args::parse();

    if args.verbose {
        env_logger::Builder::new()
            .filter_level(LevelFilter::Debug)
            .init();
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    }
    debug!("args: {:?}", args);

    if let Err(e) = run(args) {
        eprintln!("An error occurred: {}", e);
        let mut source = std::error::Error::source(&e);
        while let Some(s) = source {
            eprintln!("  caused by: {}", s);
            source = s.source();
        }
        std::process::exit(1);
    }
}
