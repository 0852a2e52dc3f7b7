use skybox_demo::DemoConfig;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = skybox_demo::run(DemoConfig::default()) {
        log::error!("{e}");
        std::process::exit(1);
    }
}
