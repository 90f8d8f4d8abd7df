use clap::{Arg, arg, command};

pub const CLAP_STYLING: clap::builder::styling::Styles = clap::builder::styling::Styles::styled()
    .header(clap_cargo::style::HEADER)
    .usage(clap_cargo::style::USAGE)
    .literal(clap_cargo::style::LITERAL)
    .placeholder(clap_cargo::style::PLACEHOLDER)
    .error(clap_cargo::style::ERROR)
    .valid(clap_cargo::style::VALID)
    .invalid(clap_cargo::style::INVALID);

pub fn command_argument_builder() -> clap::Command {
    clap::Command::new("lazuli")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("lazuli")
        .about("Scrapes a product catalog into a CSV file")
        .styles(CLAP_STYLING)
        .arg(
            arg!(-q --"quiet" "Suppress banner, progress and informational logs")
                .required(false)
                .global(true)
                .conflicts_with("verbose"),
        )
        .arg(
            arg!(-v --"verbose" "Log every extraction step")
                .required(false)
                .global(true),
        )
        .subcommand_required(false)
        // `lazuli` on its own behaves like `lazuli run`
        .args(run_arguments())
        .subcommand(
            command!("run")
                .about("Discover product pages on the listing and write every product to CSV")
                .args(run_arguments()),
        )
}

fn run_arguments() -> Vec<Arg> {
    vec![
        arg!(-c --"config" <PATH>)
            .required(false)
            .help("JSON configuration file; flags override its values")
            .value_parser(clap::value_parser!(std::path::PathBuf)),
        arg!(-u --"url" <URL>)
            .required(false)
            .help("Listing page to start from")
            .value_parser(clap::value_parser!(url::Url)),
        arg!(-m --"mode" <MODE>)
            .required(false)
            .help("Acquisition mode: rendered scrapes every detail page, remote uses one API capture")
            .value_parser(["rendered", "remote"]),
        arg!(-o --"output" <PATH>)
            .required(false)
            .help("CSV file to write (default: csv/products.csv)"),
        arg!(-w --"workers" <NUM_WORKERS>)
            .required(false)
            .help("Number of concurrent workers, each with its own session")
            .value_parser(clap::value_parser!(usize)),
        arg!(--"max-jobs" <COUNT>)
            .required(false)
            .help("Scrape at most this many discovered products")
            .value_parser(clap::value_parser!(usize)),
        arg!(-s --"scrolls" <COUNT>)
            .required(false)
            .help("How many times to load more products on the listing page")
            .value_parser(clap::value_parser!(usize)),
        arg!(-t --"timeout" <SECONDS>)
            .required(false)
            .help("Per-product deadline in seconds")
            .value_parser(clap::value_parser!(u64)),
        arg!(--"lenient")
            .required(false)
            .help("Keep a product when an optional section fails to extract")
            .action(clap::ArgAction::SetTrue),
    ]
}
