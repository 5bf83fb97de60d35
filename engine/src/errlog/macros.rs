/*!
 * Logging Macros
 * Call-site capture for the error facility
 */

/// Path of the enclosing function, without a trailing `::f`.
#[doc(hidden)]
#[macro_export]
macro_rules! __function_path {
    () => {{
        fn f() {}
        fn type_name_of<T>(_: T) -> &'static str {
            std::any::type_name::<T>()
        }
        let name = type_name_of(f);
        name.strip_suffix("::f").unwrap_or(name)
    }};
}

#[doc(hidden)]
#[macro_export]
macro_rules! __log_at_level {
    ($code:expr, $level:expr, $($arg:tt)+) => {
        $crate::errlog::log(
            $code,
            $level,
            file!(),
            line!(),
            $crate::__function_path!(),
            format_args!($($arg)+),
        )
    };
}

/// Record an event at Debug level.
#[macro_export]
macro_rules! log_debug {
    ($code:expr, $($arg:tt)+) => {
        $crate::__log_at_level!($code, $crate::errlog::ErrorLevel::Debug, $($arg)+)
    };
}

/// Record an event at Info level.
#[macro_export]
macro_rules! log_info {
    ($code:expr, $($arg:tt)+) => {
        $crate::__log_at_level!($code, $crate::errlog::ErrorLevel::Info, $($arg)+)
    };
}

/// Record an event at Warning level.
#[macro_export]
macro_rules! log_warning {
    ($code:expr, $($arg:tt)+) => {
        $crate::__log_at_level!($code, $crate::errlog::ErrorLevel::Warning, $($arg)+)
    };
}

/// Record an event at Error level.
#[macro_export]
macro_rules! log_error {
    ($code:expr, $($arg:tt)+) => {
        $crate::__log_at_level!($code, $crate::errlog::ErrorLevel::Error, $($arg)+)
    };
}

/// Record an event at Fatal level.
#[macro_export]
macro_rules! log_fatal {
    ($code:expr, $($arg:tt)+) => {
        $crate::__log_at_level!($code, $crate::errlog::ErrorLevel::Fatal, $($arg)+)
    };
}
