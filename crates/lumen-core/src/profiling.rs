//! Profiling utilities based on the `puffin` crate.
//!
//! With the `profiling` feature disabled the scope macros expand to nothing,
//! so instrumented code compiles either way.

#[cfg(feature = "profiling")]
pub use enabled::*;

#[cfg(feature = "profiling")]
mod enabled {
    use std::sync::OnceLock;

    pub use puffin::{GlobalProfiler, profile_function, profile_scope};

    /// Profiling backend options.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum ProfilingBackend {
        /// Send profiling data to puffin_viewer via HTTP.
        PuffinHttp,
    }

    static PROFILING_SERVER: OnceLock<puffin_http::Server> = OnceLock::new();

    /// Initialize profiling with the specified backend.
    ///
    /// ```no_run
    /// use lumen_core::profiling::{init_profiling, ProfilingBackend};
    ///
    /// init_profiling(ProfilingBackend::PuffinHttp);
    /// ```
    pub fn init_profiling(backend: ProfilingBackend) {
        match backend {
            ProfilingBackend::PuffinHttp => {
                puffin::set_scopes_on(true);

                match puffin_http::Server::new("0.0.0.0:8585") {
                    Ok(server) => {
                        tracing::info!("Puffin profiler server started on http://0.0.0.0:8585");
                        let _ = PROFILING_SERVER.set(server);
                    }
                    Err(e) => {
                        tracing::error!("Failed to start puffin server: {}", e);
                    }
                }
            }
        }
    }

    /// Mark the start of a new frame. Call once per frame from the host loop.
    #[inline]
    pub fn new_frame() {
        puffin::GlobalProfiler::lock().new_frame();
    }
}

#[cfg(not(feature = "profiling"))]
#[doc(hidden)]
#[macro_export]
macro_rules! __lumen_profile_noop {
    ($($arg:tt)*) => {};
}

#[cfg(not(feature = "profiling"))]
pub use crate::__lumen_profile_noop as profile_function;
#[cfg(not(feature = "profiling"))]
pub use crate::__lumen_profile_noop as profile_scope;

/// No-op frame marker when profiling is disabled.
#[cfg(not(feature = "profiling"))]
#[inline]
pub fn new_frame() {}
