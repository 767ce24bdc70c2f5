pub(crate) mod attempt_flow;
pub(crate) mod enrollment;
pub(crate) mod generator;
pub(crate) mod job_store;
pub(crate) mod question_import;
pub(crate) mod quiz_cache;
pub(crate) mod shuffle;
pub(crate) mod time_window;
