//! Chat pagination and ordering engine.

pub mod controller;
pub mod view;
pub mod window;

pub use controller::{ChatController, ChatSettings};
pub use view::{
    reveal, ChatEntry, ChatView, DisplayMessage, ElementBounds, ScrollAction, TranscriptView,
    Viewport,
};
pub use window::{ChatWindow, LoadGate, PaginationState};
