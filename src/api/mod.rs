pub mod archiver;

pub use archiver::MotionArchiver;
