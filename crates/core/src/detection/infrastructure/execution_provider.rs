use std::fmt;
use std::str::FromStr;

/// Where inference runs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Device {
    /// ONNX Runtime's default CPU provider only.
    Cpu,
    /// The platform accelerator when available, CPU otherwise.
    #[default]
    Auto,
}

impl FromStr for Device {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cpu" => Ok(Device::Cpu),
            "auto" => Ok(Device::Auto),
            other => Err(format!("Device must be 'cpu' or 'auto', got '{other}'")),
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Device::Cpu => f.write_str("cpu"),
            Device::Auto => f.write_str("auto"),
        }
    }
}

/// Execution providers to register for `device`.
///
/// ONNX Runtime falls back to CPU if a registered provider is unavailable.
pub fn execution_providers(
    device: Device,
) -> Vec<ort::execution_providers::ExecutionProviderDispatch> {
    match device {
        Device::Cpu => Vec::new(),
        Device::Auto => preferred_execution_providers(),
    }
}

fn preferred_execution_providers() -> Vec<ort::execution_providers::ExecutionProviderDispatch> {
    #[cfg(target_os = "macos")]
    {
        vec![ort::execution_providers::CoreMLExecutionProvider::default().build()]
    }
    #[cfg(target_os = "windows")]
    {
        vec![ort::execution_providers::DirectMLExecutionProvider::default().build()]
    }
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        vec![]
    }
}
