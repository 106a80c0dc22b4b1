pub mod core;
pub mod history;
pub mod intent;
pub mod llm;
pub mod pipeline;
pub mod prompt;
pub mod rag;
pub mod server;
pub mod state;
pub mod vector_math;

#[cfg(test)]
pub mod test_util;
