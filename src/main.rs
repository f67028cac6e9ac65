use log::{error, LevelFilter};

fn main() {
	env_logger::Builder::new()
		.filter_level(LevelFilter::Error)
		.filter_module("helicoid_sketch", LevelFilter::Debug)
		.parse_default_env()
		.init();

	if let Err(err) = helicoid_sketch::run() {
		error!("{err:#}");
		std::process::exit(1);
	}
}
