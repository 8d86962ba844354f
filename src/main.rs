use clap::Parser;

fn main() -> std::process::ExitCode {
    let cli = yarn_minify::cli::Cli::parse();
    yarn_minify::app::exit_code(yarn_minify::app::run(cli))
}
