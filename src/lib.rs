/*
 * author: Humi@bass_clef_ <bassclef.nico@gmail.com>
 */

#![cfg_attr(feature = "docs-features", feature(doc_cfg))]

//! # doppcapture
//! `doppcapture` is a library for capturing the desktop as an OpenGL texture
//! through the AMD desktop duplication driver on Windows.
//!
//! A [`Capture`] binds one desktop, blits it into one of [`NUM_TARGETS`]
//! present textures on request, and hands the texture name to whatever
//! renders or encodes next. Desktop changes can be ignored, polled, or
//! waited for.
//!
//! # Examples
//! ```no_run
//! use doppcapture::{Capture, CaptureError, CaptureOptions, DesktopDriver, Graphics};
//!
//! fn stream<G: Graphics, D: DesktopDriver>(mut capture: Capture<G, D>) -> Result<(), CaptureError> {
//!     capture.initialize(&CaptureOptions::new(1920, 1080).blocking(true))?;
//!
//!     let mut index = 0;
//!     // returns false once another thread calls release_event.
//!     while capture.process_desktop(index)? {
//!         let texture = capture.get_presented_texture(index).unwrap();
//!         // hand texture to the encoder
//!         index = (index + 1) % doppcapture::NUM_TARGETS;
//!     }
//!     Ok(())
//! }
//! ```
//!
//! On Windows, [`win32::load_opengl`] and [`win32::WglDesktopDriver`] provide
//! the graphics and driver halves for the context current on the calling thread.
//!
//! [Read more with image](`Capture::get_img_frame`)

pub mod capture;
pub mod desktop;
pub mod driver;
pub mod graphics;
pub mod sync;

pub use capture::*;
pub use desktop::{DesktopId, DesktopSurface};
pub use driver::{DesktopDriver, DriverControl};
pub use graphics::*;
pub use sync::{DesktopEvents, ExclusivityGuard, SignalPair, Wake};

#[cfg(windows)]
#[cfg_attr(feature = "docs-features", doc(cfg(windows)))]
pub mod win32;
