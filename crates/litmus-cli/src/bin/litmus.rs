fn main() {
    let code = litmus_cli::run_from_env();
    std::process::exit(code);
}
