// API wrappers
// Thin data-access layer over the LexMedica backend, routed through the
// request coordinator

mod chat;
mod session;

pub use chat::ChatApi;
pub use session::SessionApi;
