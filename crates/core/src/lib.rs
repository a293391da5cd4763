pub mod shared {
    pub mod constants;
    pub mod frame;
}

pub mod detection {
    pub mod domain {
        pub mod detection;
        pub mod model_binding;
        pub mod quality_gate;
    }
    pub mod infrastructure;
}

pub mod capture {
    pub mod domain {
        pub mod capture_request;
        pub mod frame_encoder;
        pub mod prediction_client;
    }
    pub mod infrastructure;
}

pub mod video {
    pub mod domain {
        pub mod video_source;
    }
    pub mod infrastructure;
}

pub mod overlay {
    pub mod domain {
        pub mod display_mapping;
        pub mod overlay_renderer;
    }
    pub mod infrastructure;
}

pub mod pipeline {
    pub mod capture_use_case;
    pub mod detection_poller;
    pub mod live_session;
    pub mod observable;
    pub mod pipeline_error;
    pub mod pipeline_logger;
    pub mod user_notifier;

    #[cfg(test)]
    pub(crate) mod test_support;
}
