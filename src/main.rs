fn main() {
    if let Err(err) = tfrec::run() {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}
