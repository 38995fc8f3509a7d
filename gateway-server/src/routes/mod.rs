pub mod audio;
pub mod chat;
pub mod embeddings;
pub mod health;
pub mod models;
pub mod realtime;
