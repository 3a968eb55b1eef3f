use certmint::cli::{handle_command, Cli};

fn main() {
    use clap::Parser;
    let cli = Cli::parse();

    match handle_command(cli) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(e.exit_code());
        }
    }
}
