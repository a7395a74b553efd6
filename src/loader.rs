use crate::error::EngineResult;
use crate::model::ProjectData;

/// External data access boundary (spec §6): the engine never knows where a
/// project's tables live, only that a conforming implementation can fetch
/// them. Implementations should wrap infrastructure failures (timeouts,
/// connection errors, missing projects) as `EngineError::DataSourceUnavailable`
/// rather than letting them escape as panics.
pub trait LoadProject {
    fn load(&self, project_id: &str) -> EngineResult<ProjectData>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;

    struct AlwaysFails;
    impl LoadProject for AlwaysFails {
        fn load(&self, project_id: &str) -> EngineResult<ProjectData> {
            Err(EngineError::DataSourceUnavailable(format!(
                "no such project: {project_id}"
            )))
        }
    }

    #[test]
    fn loader_errors_surface_as_data_source_unavailable() {
        let loader = AlwaysFails;
        let err = loader.load("p-1").unwrap_err();
        assert_eq!(err.code(), "DATA_SOURCE_UNAVAILABLE");
    }
}
