fn main() {
    if let Err(e) = headcount::run() {
        eprintln!("headcount: {e}");
        std::process::exit(1);
    }
}
