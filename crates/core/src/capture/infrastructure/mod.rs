pub mod http_prediction_client;
pub mod jpeg_frame_encoder;
