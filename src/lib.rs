pub mod api;
pub mod core;

pub fn init_logging() {
    let env = env_logger::Env::default().default_filter_or("info");
    // 重复初始化（如测试中）忽略即可
    let _ = env_logger::Builder::from_env(env)
        .format_timestamp_millis()
        .try_init();
}
