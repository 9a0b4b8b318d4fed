mod handoff_test;
mod pipeline_test;
