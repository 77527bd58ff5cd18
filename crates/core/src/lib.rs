pub mod capture {
    pub mod domain {
        pub mod capture_device;
        pub mod frame_provider;
    }
    pub mod frame_source;
    pub mod infrastructure;
}

pub mod detection {
    pub mod domain {
        pub mod detection_backend;
        pub mod grayscale_normalizer;
        pub mod pending_detection;
    }
    pub mod infrastructure;
}

pub mod pipeline {
    pub mod detection_scheduler;
    pub mod pipeline_logger;
    pub mod session_config;
    pub mod infrastructure {
        pub mod live_session;
    }
}

pub mod rendering {
    pub mod domain {
        pub mod render_surface;
    }
    pub mod renderer;
    pub mod infrastructure;
}

pub mod shared {
    pub mod constants;
    pub mod frame;
    pub mod intensity;
    pub mod match_rect;
}
