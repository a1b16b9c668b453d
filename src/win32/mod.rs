//! Windows backends: the WGL extension driver, the GL loader and the
//! event pair over Win32 event objects.

mod events;
mod wgl;

pub use events::Win32DesktopEvents;
pub use wgl::{has_current_context, load_opengl, proc_address, WglDesktopDriver};
