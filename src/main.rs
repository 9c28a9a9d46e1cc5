use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{error, info};

use motion_archiver::api::MotionArchiver;
use motion_archiver::core::config::ArchiverConfig;
use motion_archiver::core::error::{ArchiveError, ArchiveResult};

fn main() -> ExitCode {
    motion_archiver::init_logging();
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("❌ {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run() -> ArchiveResult<()> {
    let config = ArchiverConfig::load_default()?;

    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&shutdown);
    ctrlc::set_handler(move || {
        info!("🛑 Interrupt received, finishing current frame");
        flag.store(true, Ordering::SeqCst);
    })
    .map_err(|e| ArchiveError::Signal(e.to_string()))?;

    info!("Press Ctrl+C to stop");
    let stats = MotionArchiver::create(config)?.run(&shutdown);
    info!(
        "📊 {} ticks, {} motion saves, {} autosaves, {} save failures",
        stats.ticks, stats.motion_saves, stats.autosaves, stats.save_failures
    );
    Ok(())
}
