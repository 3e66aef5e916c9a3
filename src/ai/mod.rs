pub mod client;
pub mod http_client;
pub mod json;
pub mod prompts;

pub use client::*;
pub use json::{extract_json_object, filter_thinking};
pub use prompts::{PromptContext, PromptTemplate};
