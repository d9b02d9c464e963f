use metrics::{describe_gauge, gauge};

pub fn component_info_metric(name: &'static str) {
    static NAME: &str = "daqmon_component_info";

    describe_gauge!(NAME, "Basic information about the component");

    let git_rev = option_env!("GIT_VERSION").unwrap_or("unknown");
    gauge!(NAME, "component" => name, "git_version" => git_rev).set(1);
}

pub mod names {
    use const_format::concatcp;

    pub const METRIC_NAME_PREFIX: &str = "daqmon_";

    pub const FAILURES: &str = concatcp!(METRIC_NAME_PREFIX, "failures");
    pub const EVENTS_PROCESSED: &str = concatcp!(METRIC_NAME_PREFIX, "events_processed");
    pub const CHANNELS_PROCESSED: &str = concatcp!(METRIC_NAME_PREFIX, "channels_processed");
    pub const PEAKS_FOUND: &str = concatcp!(METRIC_NAME_PREFIX, "peaks_found");
    pub const PEAKS_DISCARDED: &str = concatcp!(METRIC_NAME_PREFIX, "peaks_discarded");
    pub const POINTS_PUBLISHED: &str = concatcp!(METRIC_NAME_PREFIX, "points_published");
    pub const SAMPLES_CLAMPED: &str = concatcp!(METRIC_NAME_PREFIX, "samples_clamped");
    pub const LAST_EVENT_NUMBER: &str = concatcp!(METRIC_NAME_PREFIX, "last_event_number");
}

pub mod failures {
    #[derive(Debug, Clone, Eq, Hash, PartialEq)]
    pub enum FailureKind {
        FileReadFailed,
        FileWriteFailed,
        SinkPublishFailed,
    }

    // Label building function
    pub fn get_label(failure_kind: FailureKind) -> (&'static str, &'static str) {
        (
            "failure_kind",
            match failure_kind {
                FailureKind::FileReadFailed => "file_read_failed",
                FailureKind::FileWriteFailed => "file_write_failed",
                FailureKind::SinkPublishFailed => "sink_publish_failed",
            },
        )
    }
}

pub mod peak_finders {
    use crate::PlaneType;

    // Label building function
    pub fn get_label(plane_type: PlaneType) -> (&'static str, &'static str) {
        (
            "plane_type",
            match plane_type {
                PlaneType::Induction => "induction",
                PlaneType::Collection => "collection",
            },
        )
    }
}
