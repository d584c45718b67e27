mod openai_enhancer;

pub use openai_enhancer::OpenAiEnhancer;
