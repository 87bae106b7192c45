use std::process::ExitCode;

use clap::Parser;

use rewire::{Circuit, rar};

/// Load an AAG circuit, report its structure and search for alternative
/// connections.
#[derive(Parser, Debug)]
struct Args {
    /// Print the netlist listing in topological order.
    #[arg(long, default_value_t = false)]
    netlist: bool,

    /// Run the redundancy addition and removal search.
    #[arg(long, default_value_t = false)]
    rar: bool,

    /// Write the circuit back out in canonical AAG form to this path.
    #[arg(long)]
    write: Option<String>,

    /// The path to the AAG file.
    input: String,
}

fn run(args: &Args) -> rewire::Result<()> {
    let circuit = Circuit::from_file(&args.input)?;

    println!("{}", circuit.summary());
    println!("{}", circuit.pi_line());
    println!("{}", circuit.po_line());
    let floating = circuit.floating_report();
    if !floating.is_empty() {
        println!("{}", floating);
    }

    if args.netlist {
        for line in circuit.netlist()? {
            println!("{}", line);
        }
    }

    if args.rar {
        let report = rar::find_alternatives(&circuit)?;
        println!("{}", report);
    }

    if let Some(path) = &args.write {
        let serialized = circuit.to_aag()?;
        std::fs::write(path, serialized)
            .map_err(|e| rewire::LoaderError::IoError(e.to_string()))?;
    }

    Ok(())
}

fn main() -> ExitCode {
    let _ = env_logger::builder().try_init();
    let args = Args::parse();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}
