use ort::execution_providers::ExecutionProviderDispatch;

/// Accelerators tried before ONNX Runtime's built-in CPU provider.
///
/// CoreML on macOS, DirectML on Windows, none elsewhere. A provider that
/// fails to register is skipped and the session runs on CPU.
pub fn preferred_execution_providers() -> Vec<ExecutionProviderDispatch> {
    #[cfg(target_os = "macos")]
    let providers = vec![ort::execution_providers::CoreMLExecutionProvider::default().build()];
    #[cfg(target_os = "windows")]
    let providers = vec![ort::execution_providers::DirectMLExecutionProvider::default().build()];
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    let providers = Vec::new();

    log::debug!("Preferred execution provider: {}", accelerator_name());
    providers
}

/// Name of the accelerator requested, for logs.
pub fn accelerator_name() -> &'static str {
    if cfg!(target_os = "macos") {
        "CoreML"
    } else if cfg!(target_os = "windows") {
        "DirectML"
    } else {
        "CPU"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_at_most_one_accelerator_is_requested() {
        assert!(preferred_execution_providers().len() <= 1);
    }

    #[test]
    fn test_accelerator_name_matches_provider_list() {
        let none_requested = preferred_execution_providers().is_empty();
        assert_eq!(accelerator_name() == "CPU", none_requested);
    }
}
