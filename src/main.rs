use colored::Colorize;

fn main() {
    if let Err(e) = kcross::run() {
        // anyhow's alternate Debug prints the whole context chain:
        eprintln!("{} {:?}", "Error:".red(), e);
        std::process::exit(1);
    }
}
