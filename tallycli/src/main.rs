#![forbid(unsafe_code)]
pub fn main() {
    tally_cli::run_cli();
}
