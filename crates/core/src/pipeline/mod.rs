pub mod encode_listener;
pub mod encode_pipeline;
pub mod encode_session;
pub mod infrastructure;
pub mod pipeline_failure;
pub mod pipeline_logger;

#[cfg(test)]
pub(crate) mod test_support;
