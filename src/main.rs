fn main() {
    if let Err(err) = listing_pipeline::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
