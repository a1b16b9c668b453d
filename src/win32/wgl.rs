use std::ffi::{c_void, CString};

use winapi::um::{
    libloaderapi::{
        GetModuleHandleA,
        GetProcAddress,
    },
    wingdi::{
        wglGetCurrentContext,
        wglGetProcAddress,
    },
};

use crate::driver::DesktopDriver;
use crate::graphics::{OpenGl, TextureId};

type DesktopTargetAmd = unsafe extern "system" fn(desktop: u32) -> u8;
type GetDesktopTextureAmd = unsafe extern "system" fn() -> u32;
type EnablePostProcessAmd = unsafe extern "system" fn(enable: bool);
type GenPresentTextureAmd = unsafe extern "system" fn() -> u32;
type PresentTextureToVideoAmd = unsafe extern "system" fn(texture: u32, attribs: *const u32) -> u32;

/// Resolves a GL or WGL function for the current context.
pub fn proc_address(name: &str) -> *const c_void {
    let name = match CString::new(name) {
        Ok(name) => name,
        Err(_) => return std::ptr::null(),
    };

    unsafe {
        let address = wglGetProcAddress(name.as_ptr()) as isize;
        // Failure is reported as 0, 1, 2, 3 or -1. GL 1.1 functions are
        // never returned and live in opengl32.dll itself.
        if !matches!(address, -1..=3) {
            return address as *const c_void;
        }

        let module = GetModuleHandleA(b"opengl32.dll\0".as_ptr() as *const i8);
        if module.is_null() {
            return std::ptr::null();
        }

        GetProcAddress(module, name.as_ptr()) as *const c_void
    }
}

pub fn has_current_context() -> bool {
    unsafe { !wglGetCurrentContext().is_null() }
}

/// Loads the GL function table for the context current on this thread.
pub fn load_opengl() -> OpenGl {
    OpenGl::load_with(proc_address, has_current_context)
}

fn resolve<T: Copy>(name: &'static str) -> Result<T, String> {
    let address = proc_address(name);
    if address.is_null() {
        return Err(format!("{} is not exported by the driver", name));
    }

    Ok(unsafe { std::mem::transmute_copy::<*const c_void, T>(&address) })
}

#[derive(Clone, Copy)]
struct EntryPoints {
    desktop_target: DesktopTargetAmd,
    get_desktop_texture: GetDesktopTextureAmd,
    enable_post_process: EnablePostProcessAmd,
}

/// [`DesktopDriver`] over the AMD WGL desktop duplication extension.
#[derive(Default)]
pub struct WglDesktopDriver {
    entry_points: Option<EntryPoints>,
}
impl WglDesktopDriver {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DesktopDriver for WglDesktopDriver {
    fn load_entry_points(&mut self) -> Result<(), String> {
        let entry_points = EntryPoints {
            get_desktop_texture: resolve::<GetDesktopTextureAmd>("wglGetDesktopTextureAMD")?,
            enable_post_process: resolve::<EnablePostProcessAmd>("wglEnablePostProcessAMD")?,
            desktop_target: resolve::<DesktopTargetAmd>("wglDesktopTargetAMD")?,
        };
        // Not used for capture, but their absence means a driver without
        // full desktop duplication support.
        resolve::<PresentTextureToVideoAmd>("wglPresentTextureToVideoAMD")?;
        resolve::<GenPresentTextureAmd>("wglGenPresentTextureAMD")?;

        self.entry_points = Some(entry_points);

        Ok(())
    }

    fn select_desktop(&self, desktop_id: u32) -> bool {
        match self.entry_points {
            Some(e) => unsafe { (e.desktop_target)(desktop_id) != 0 },
            None => false,
        }
    }

    fn desktop_texture(&self) -> TextureId {
        match self.entry_points {
            Some(e) => TextureId(unsafe { (e.get_desktop_texture)() }),
            None => TextureId::default(),
        }
    }

    fn enable_post_process(&self, enable: bool) {
        if let Some(e) = self.entry_points {
            unsafe { (e.enable_post_process)(enable) };
        }
    }
}
