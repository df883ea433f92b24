//! Tracy instrumentation for the sampler hot paths.
//!
//! Enabled with the `profiling` Cargo feature. Without it every macro
//! expands to nothing (or just evaluates its value argument).
//!
//! ```ignore
//! use counterscope_core::profiling::{profile_function, profile_plot};
//!
//! fn merge() {
//!     profile_function!();
//!     profile_plot!("unread_ranges", 3);
//! }
//! ```

#[cfg(feature = "profiling")]
pub use tracy_client::{self, Client, frame_mark as tracy_frame_mark, plot as tracy_plot, span};

/// Mark the end of a CPU frame.
#[macro_export]
#[cfg(feature = "profiling")]
macro_rules! frame_mark {
    () => {
        $crate::profiling::tracy_frame_mark()
    };
}

#[macro_export]
#[cfg(not(feature = "profiling"))]
macro_rules! frame_mark {
    () => {};
}

/// Mark the end of a secondary frame, such as a GPU sampling pass.
#[macro_export]
#[cfg(feature = "profiling")]
macro_rules! profile_frame_mark_named {
    ($name:expr) => {
        $crate::profiling::tracy_client::secondary_frame_mark!($name)
    };
}

#[macro_export]
#[cfg(not(feature = "profiling"))]
macro_rules! profile_frame_mark_named {
    ($name:expr) => {};
}

/// Span covering the rest of the enclosing scope.
#[macro_export]
#[cfg(feature = "profiling")]
macro_rules! profile_scope {
    ($name:expr) => {
        let _profile_span = $crate::profiling::span!($name);
    };
}

#[macro_export]
#[cfg(not(feature = "profiling"))]
macro_rules! profile_scope {
    ($name:expr) => {};
}

/// Span named after the enclosing function.
#[macro_export]
#[cfg(feature = "profiling")]
macro_rules! profile_function {
    () => {
        let _profile_span = $crate::profiling::span!();
    };
}

#[macro_export]
#[cfg(not(feature = "profiling"))]
macro_rules! profile_function {
    () => {};
}

/// Plot a numeric value, e.g. unread range count or dropped markers.
#[macro_export]
#[cfg(feature = "profiling")]
macro_rules! profile_plot {
    ($name:expr, $value:expr) => {
        $crate::profiling::tracy_plot!($name, $value as f64)
    };
}

#[macro_export]
#[cfg(not(feature = "profiling"))]
macro_rules! profile_plot {
    ($name:expr, $value:expr) => {
        let _ = $value;
    };
}

/// Send a message to Tracy's message log.
#[macro_export]
#[cfg(feature = "profiling")]
macro_rules! profile_message {
    ($msg:expr) => {
        if let Some(client) = $crate::profiling::Client::running() {
            client.message($msg, 0);
        }
    };
}

#[macro_export]
#[cfg(not(feature = "profiling"))]
macro_rules! profile_message {
    ($msg:expr) => {
        let _ = $msg;
    };
}

pub use frame_mark;
pub use profile_frame_mark_named;
pub use profile_function;
pub use profile_message;
pub use profile_plot;
pub use profile_scope;

#[cfg(test)]
mod tests {
    #[test]
    fn test_macros_compile() {
        frame_mark!();
        profile_frame_mark_named!("gpu_pass");
        profile_scope!("merge");
        profile_function!();
        profile_plot!("unread_ranges", 3u32);
        profile_message!("overflow");
    }
}
