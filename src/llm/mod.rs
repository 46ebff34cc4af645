pub mod gemini;
pub mod media;

#[cfg(test)]
pub mod mock;
