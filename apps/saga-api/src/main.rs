use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;
	let args = saga_api::Args::parse();
	saga_api::run(args).await
}
