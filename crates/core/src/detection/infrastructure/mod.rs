pub mod execution_provider;
pub mod model_resolver;
pub mod onnx_blazeface_binding;
pub mod shared_binding;
