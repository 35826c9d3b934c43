use hostbridge::settings::BridgeSettings;
use hostbridge::{host, logging};
use hostbridge_platform::AppPaths;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let paths = AppPaths::new()?;
    if let Err(error) = paths.ensure_dirs() {
        eprintln!("Failed to create application directories: {error}");
    }

    let settings = BridgeSettings::load(&paths);
    logging::init_logging(&paths, settings.debug_logging, settings.max_log_size_bytes);
    log::info!("hostbridge {} starting", env!("CARGO_PKG_VERSION"));

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let served = runtime.block_on(host::run_stdio(&paths, &settings));

    // A blocking stdin read may still be outstanding after a quit.
    runtime.shutdown_background();

    served?;
    log::info!("hostbridge exiting");
    Ok(())
}
