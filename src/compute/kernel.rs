use crate::utils::Handle;

use super::device::{Device, Pipeline, ShaderLibrary};
use super::error::Result;

/// A loaded kernel library plus the currently selected compiled
/// pipeline.
///
/// Loading fails fast when the library path cannot be resolved; there
/// is no usable pipeline until [`use_function`](Kernel::use_function)
/// succeeds.
#[derive(Debug)]
pub struct Kernel {
    device: Device,
    library: Handle<ShaderLibrary>,
    entry_point: Option<String>,
    pipeline: Option<Handle<Pipeline>>,
}

impl Kernel {
    /// Load a precompiled kernel library from `path`.
    pub fn load(device: &Device, path: &str) -> Result<Self> {
        let library = device.load_library(path).map_err(|err| {
            log::error!("could not load kernel library `{path}`: {err}");
            err
        })?;

        Ok(Self {
            device: device.clone(),
            library,
            entry_point: None,
            pipeline: None,
        })
    }

    /// Load a library and immediately select an entry point.
    pub fn with_function(device: &Device, path: &str, entry_point: &str) -> Result<Self> {
        let mut kernel = Self::load(device, path)?;
        kernel.use_function(entry_point)?;
        Ok(kernel)
    }

    /// Compile a pipeline for `entry_point`, replacing any previously
    /// selected one. On failure no usable pipeline remains.
    pub fn use_function(&mut self, entry_point: &str) -> Result<()> {
        self.pipeline = None;
        self.entry_point = None;

        let pipeline = self.device.make_pipeline(self.library, entry_point)?;
        self.entry_point = Some(entry_point.to_string());
        self.pipeline = Some(pipeline);
        log::debug!("kernel pipeline compiled for entry point `{entry_point}`");
        Ok(())
    }

    /// Entry-point names in the order the library reports them.
    pub fn function_names(&self) -> Result<Vec<String>> {
        self.device.function_names(self.library)
    }

    pub fn entry_point(&self) -> Option<&str> {
        self.entry_point.as_deref()
    }

    pub fn pipeline(&self) -> Option<Handle<Pipeline>> {
        self.pipeline
    }

    pub fn library(&self) -> Handle<ShaderLibrary> {
        self.library
    }

    pub fn device(&self) -> &Device {
        &self.device
    }
}
