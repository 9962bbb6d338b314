use log::LevelFilter;

/// Installs the global logger. `RUST_LOG` can still refine individual
/// modules; `level` sets the default for everything else.
pub fn init_logger(level: LevelFilter) {
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .init();
}
