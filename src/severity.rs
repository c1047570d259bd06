/// Backend ordinal for debug events.
pub const DEBUG: u32 = 1;
/// Backend ordinal for informational events.
pub const INFO: u32 = 2;
/// Backend ordinal for warnings.
pub const WARNING: u32 = 3;
/// Backend ordinal for errors.
pub const ERROR: u32 = 4;

/// Front-end event level.
///
/// Uses an open numeric scale with gaps between the standard levels so
/// applications can define their own levels in between (or beyond) them.
/// Higher values are more severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Level(pub i32);

impl Level {
    pub const TRACE: Level = Level(-8);
    pub const DEBUG: Level = Level(-4);
    pub const INFO: Level = Level(0);
    pub const WARN: Level = Level(4);
    pub const ERROR: Level = Level(8);
}

impl Default for Level {
    fn default() -> Self {
        Level::INFO
    }
}

impl From<tracing::Level> for Level {
    fn from(level: tracing::Level) -> Self {
        match level {
            tracing::Level::TRACE => Level::TRACE,
            tracing::Level::DEBUG => Level::DEBUG,
            tracing::Level::INFO => Level::INFO,
            tracing::Level::WARN => Level::WARN,
            tracing::Level::ERROR => Level::ERROR,
        }
    }
}

/// Translate a front-end level into the backend's severity ordinal.
///
/// The four standard levels map onto [`DEBUG`], [`INFO`], [`WARNING`] and
/// [`ERROR`]. Any other level passes through as its raw numeric value so
/// custom severities reach the backend untouched. Levels below zero, such
/// as [`Level::TRACE`], have no backend ordinal and are reported as
/// [`DEBUG`].
pub fn to_severity(level: Level) -> u32 {
    match level {
        Level::DEBUG => DEBUG,
        Level::INFO => INFO,
        Level::WARN => WARNING,
        Level::ERROR => ERROR,
        Level(raw) => u32::try_from(raw).unwrap_or(DEBUG),
    }
}
