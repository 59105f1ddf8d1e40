fn main() {
    if let Err(err) = waldo::run() {
        println!();
        eprintln!("waldo: {err:#}");
        std::process::exit(waldo::exit_code(&err));
    }
}
