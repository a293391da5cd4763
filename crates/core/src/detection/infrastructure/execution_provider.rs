/// Return the GPU-backed ONNX execution providers for the current platform.
///
/// An empty list (or `prefer_gpu == false`) leaves ONNX Runtime on its CPU
/// provider; registered providers that fail to load also fall back to CPU.
pub fn preferred_execution_providers(
    prefer_gpu: bool,
) -> Vec<ort::execution_providers::ExecutionProviderDispatch> {
    if !prefer_gpu {
        return Vec::new();
    }
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
