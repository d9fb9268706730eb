//! Diagnostic sink redirection.
//!
//! # Responsibilities
//! - Open a diagnostics file (configured path, or a fresh temp file)
//! - Expose it as a writer for the logging subsystem
//! - Route panic reports into it, since a service has no console to print them on
//!
//! # Design Decisions
//! - Explicit `install` / `teardown`; the previous panic hook is restored on teardown
//! - The handle owns every resource it touches; nothing lives in statics

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::panic::PanicHookInfo;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

use crate::config::DiagnosticsConfig;

type PanicHook = dyn Fn(&PanicHookInfo<'_>) + Send + Sync + 'static;

#[derive(Debug, Error)]
pub enum DiagnosticError {
    #[error("failed to open diagnostics file {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to create temporary diagnostics file: {0}")]
    CreateTemp(#[source] std::io::Error),
}

/// An installed diagnostics redirection.
pub struct DiagnosticRedirect {
    path: PathBuf,
    file: Arc<File>,
    previous_hook: Option<Arc<PanicHook>>,
}

impl std::fmt::Debug for DiagnosticRedirect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiagnosticRedirect")
            .field("path", &self.path)
            .field("installed", &self.previous_hook.is_some())
            .finish()
    }
}

impl DiagnosticRedirect {
    pub fn install(config: &DiagnosticsConfig) -> Result<Self, DiagnosticError> {
        let (file, path) = match &config.path {
            Some(path) => {
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .map_err(|source| DiagnosticError::Open {
                        path: path.clone(),
                        source,
                    })?;
                (file, path.clone())
            }
            None => tempfile::Builder::new()
                .prefix(&config.prefix)
                .suffix(".txt")
                .tempfile()
                .map_err(DiagnosticError::CreateTemp)?
                .keep()
                .map_err(|e| DiagnosticError::CreateTemp(e.error))?,
        };

        let file = Arc::new(file);
        let previous: Arc<PanicHook> = Arc::from(std::panic::take_hook());

        let hook_file = Arc::clone(&file);
        let chained = Arc::clone(&previous);
        std::panic::set_hook(Box::new(move |info| {
            let _ = writeln!(&*hook_file, "panic: {}", info);
            chained(info);
        }));

        Ok(Self {
            path,
            file,
            previous_hook: Some(previous),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writer handle for a `tracing_subscriber::fmt` layer.
    pub fn writer(&self) -> Arc<File> {
        Arc::clone(&self.file)
    }

    /// Restore the previous panic hook and flush the file.
    pub fn teardown(mut self) {
        self.restore();
    }

    fn restore(&mut self) {
        if let Some(previous) = self.previous_hook.take() {
            let _ = std::panic::take_hook();
            std::panic::set_hook(Box::new(move |info| previous(info)));
            let _ = self.file.sync_all();
        }
    }
}

impl Drop for DiagnosticRedirect {
    fn drop(&mut self) {
        self.restore();
    }
}
