use std::{fs, process};

use clap::Parser;
use nezha_cli::{App, Command, GenerateArgs, RunArgs};
use nezha_core::model::Batch;
use nezha_core::plan::analyze;
use nezha_commit::{commit, MapKvSink};
use nezha_testgen::{generate_batch, BatchParams};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let app = App::parse();
    match &app.command {
        Command::Generate(args) => generate(args),
        Command::Run(args) => run(args),
    }
}

fn generate(args: &GenerateArgs) {
    let params = BatchParams::builder()
        .address_universe(args.address_universe)
        .tx_count(args.tx_count)
        .skew(args.skew)
        .ops_per_tx(args.ops_per_tx)
        .seed(args.seed)
        .build();

    let batch = generate_batch(&params);

    let file = fs::File::create(&args.output).unwrap_or_else(|e| {
        eprintln!("Failed to create {}: {e}", args.output.display());
        process::exit(1);
    });
    serde_json::to_writer_pretty(file, &batch).unwrap_or_else(|e| {
        eprintln!("Failed to write {}: {e}", args.output.display());
        process::exit(1);
    });

    println!(
        "Generated {} transactions ({} addresses, skew {}) to {}",
        batch.len(),
        args.address_universe,
        args.skew,
        args.output.display()
    );
}

fn run(args: &RunArgs) {
    let batch = match &args.input {
        Some(path) => {
            let file = fs::File::open(path).unwrap_or_else(|e| {
                eprintln!("Failed to open {}: {e}", path.display());
                process::exit(1);
            });
            serde_json::from_reader::<_, Batch>(file).unwrap_or_else(|e| {
                eprintln!("Failed to parse {}: {e}", path.display());
                process::exit(1);
            })
        }
        None => {
            let params = BatchParams::builder()
                .address_universe(args.address_universe)
                .tx_count(args.tx_count)
                .skew(args.skew)
                .seed(args.seed)
                .build();
            generate_batch(&params)
        }
    };

    let plan = analyze(&batch, args.engine.into()).unwrap_or_else(|e| {
        eprintln!("analyze failed: {e}");
        process::exit(1);
    });

    let workers = args.concurrency.unwrap_or_else(num_cpus::get);
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .build()
        .unwrap_or_else(|e| {
            eprintln!("Failed to build commit worker pool: {e}");
            process::exit(1);
        });

    let sink = MapKvSink::new();
    if let Err(e) = commit(&plan, &sink, &pool) {
        eprintln!("commit failed: {e}");
        process::exit(1);
    }

    serde_json::to_writer_pretty(std::io::stdout(), &plan.stats).unwrap_or_else(|e| {
        eprintln!("Failed to write stats: {e}");
        process::exit(1);
    });
    println!();
}
