//! Gemini Generation Module
//!
//! Image generation and editing through the Gemini `generateContent` API.
//!
//! API Documentation: https://ai.google.dev/gemini-api/docs/image-generation

mod client;
mod models;

pub use client::GeminiGenerator;
