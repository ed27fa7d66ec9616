use clap::Parser;

#[tokio::main]
async fn main() {
    let cli = gifgrabctl::Cli::parse();
    if let Err(err) = gifgrabctl::run(cli).await {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
