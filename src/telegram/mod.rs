pub mod client;

pub use client::{ParseMode, TelegramClient, TelegramError};
