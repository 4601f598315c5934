pub mod discovery;
pub mod sys_paths;
