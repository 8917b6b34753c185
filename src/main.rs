//! CLI entry: run one evaluation cycle and print the follow-up buckets.
//!
//! Usage: `touchbase [rep-name]` — an optional argument narrows the printout
//! to one sales rep. Logging via RUST_LOG (env_logger).

use std::env;
use std::process;

use chrono::Local;

use touchbase::{
    load_config, sales_reps, Engine, EvaluationReport, OutreachKind, SheetsStore,
};

#[tokio::main]
async fn main() {
    env_logger::init();

    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("touchbase: {e}");
            process::exit(1);
        }
    };

    let rep_filter = env::args().nth(1);
    let store = SheetsStore::from_config(&config);
    let engine = Engine::new(Box::new(store), &config);

    let today = Local::now().date_naive();
    let report = engine.evaluate(today).await;
    print_report(&report, rep_filter.as_deref());
}

fn print_report(report: &EvaluationReport, rep_filter: Option<&str>) {
    let scope = rep_filter.unwrap_or("all reps");
    println!("Follow-up list for {} ({})", report.today, scope);
    println!();

    for kind in OutreachKind::ALL {
        let records: Vec<_> = report
            .active_records(kind)
            .into_iter()
            .filter(|r| rep_filter.map_or(true, |rep| r.sales_rep == rep))
            .collect();
        println!("{} due: {}", kind.label(), records.len());
        for record in records {
            println!("  row {:<4} {}", record.row, record.name);
        }
    }

    println!();
    let overdue: Vec<_> = report
        .overdue
        .iter()
        .filter(|entry| {
            rep_filter.map_or(true, |rep| {
                report
                    .record(entry.row)
                    .map(|r| r.sales_rep == rep)
                    .unwrap_or(false)
            })
        })
        .collect();
    println!("overdue: {}", overdue.len());
    for entry in overdue {
        println!("  row {:<4} {} — {}", entry.row, entry.name, entry.reason);
    }

    let reps = sales_reps(&report.records);
    if !reps.is_empty() {
        println!();
        println!("reps on roster: {}", reps.join(", "));
    }
}
