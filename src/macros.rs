/// Formats the message and hands it to a `Logger` at the given level.
/// ```ignore
/// log_at!(log, Level::Warn, "str {}, {}", 1, 2);
/// ```
#[macro_export]
macro_rules! log_at {
    ($log:expr, $level:expr, $($arg:tt)+) => {{
        $crate::log::Logger::log(&*$log, $level, &format!($($arg)+));
    }};
}

#[macro_export]
macro_rules! log_debug {
    ($log:expr, $($arg:tt)+) => { $crate::log_at!($log, $crate::log::Level::Debug, $($arg)+) };
}

#[macro_export]
macro_rules! log_info {
    ($log:expr, $($arg:tt)+) => { $crate::log_at!($log, $crate::log::Level::Info, $($arg)+) };
}

#[macro_export]
macro_rules! log_warn {
    ($log:expr, $($arg:tt)+) => { $crate::log_at!($log, $crate::log::Level::Warn, $($arg)+) };
}

#[macro_export]
macro_rules! log_error {
    ($log:expr, $($arg:tt)+) => { $crate::log_at!($log, $crate::log::Level::Error, $($arg)+) };
}

/// Similar to `log_info!`, but you also pass in the starting time and it will log how long it
/// took from starting time to now.
/// ```ignore
/// let time = Local::now();
/// info_time!(log, time, "str {}, {}", 1, 2);
/// ```
#[macro_export]
macro_rules! info_time {
    ($log:expr, $time:expr, $($arg:tt)+) => {{
        let run_time = (::chrono::Local::now() - $time)
            .num_microseconds()
            .map(|n| n as f64 / 1_000_000.0)
            .unwrap_or(0.0);
        $crate::log_info!($log, "{} RUNTIME: {} sec", format!($($arg)+), run_time);
    }};
}
