use clap::{arg, command, value_parser, Command};
use fluid_projection as fp;
use rayon::ThreadPoolBuilder;

fn main() {
    env_logger::init();

    let matches = command!()
        .arg(
            arg!(
                -n --number_of_threads <NUMBER_OF_THREADS> "Sets the number of threads: 1, 2, 4, 8, 16 or 32"
            )
            .required(true)
            .value_parser(value_parser!(usize)),
        )
        .subcommand(
            Command::new("run")
                .about("Runs the simulation")
                .arg(
                    arg!(
                        -b --benchmark "Runs the benchmark"
                    )
                    .required(false),
                ),
        )
        .subcommand(
            Command::new("compare")
                .about("Projects the first step with every linear solver and prints a table")
        )
        .get_matches();

    if let Some(&num_threads) = matches.get_one::<usize>("number_of_threads") {
        if let Err(e) = ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .build_global()
        {
            eprintln!("Error while building the thread pool: {e}.");
            std::process::exit(1);
        }
    }

    match matches.subcommand() {
        Some(("run", sub_matches)) => match sub_matches.get_flag("benchmark") {
            false => fp::case::run(),
            true => fp::case::run_benchmark(),
        },
        Some(("compare", _)) => fp::case::run_comparison(),
        _ => {
            eprintln!("Error: no subcommand given. Please, use run or compare.");
            std::process::exit(1);
        }
    }
}
