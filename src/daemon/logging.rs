use log::LevelFilter;

fn level() -> LevelFilter {
    if cfg!(debug_assertions) {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    }
}

#[cfg(target_os = "android")]
pub fn init() {
    android_logger::init_once(
        android_logger::Config::default()
            .with_tag("demandd")
            .with_max_level(level()),
    );
}

#[cfg(not(target_os = "android"))]
pub fn init() {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(level().as_str()),
    )
    .init();
}
