//! X11 Screen capture
//!
//! Grabs RandR monitors off the root window using XShm when the server
//! supports it and plain GetImage otherwise.

use crate::capture::capturer::{CaptureError, CaptureTarget, FrameSource};
use crate::capture::frame::{FrameStats, PixelLayout, RawFrame, BYTES_PER_PIXEL};
use chrono::Local;
use log::{debug, info, warn};
use std::ffi::CString;
use std::time::Instant;
use x11rb::connection::Connection;
use x11rb::protocol::randr::ConnectionExt as _;
use x11rb::protocol::shm;
use x11rb::protocol::xproto::*;
use x11rb::xcb_ffi::XCBConnection;

/// Only 32bpp Z-pixmaps map onto a 4-channel frame
const SUPPORTED_BITS_PER_PIXEL: u8 = 32;

/// Shared memory segment attached to the X server
struct ShmSegment {
    /// Server-side segment id
    seg: u32,

    /// SysV shm id
    id: i32,

    /// Local mapping
    addr: *mut u8,

    /// Mapping size in bytes
    size: usize,
}

/// Frame source backed by an X11 display
pub struct X11Source {
    /// XCB connection
    conn: XCBConnection,

    /// Root window
    root: Window,

    /// Root depth
    depth: u8,

    /// Bits per pixel for `depth`
    bits_per_pixel: u8,

    /// Scanline pad in bits for `depth`
    scanline_pad: u8,

    /// Channel order delivered by the server
    layout: PixelLayout,

    /// Targets enumerated at connect time
    targets: Vec<CaptureTarget>,

    /// XShm segment, if the extension works
    shm: Option<ShmSegment>,

    /// Frame stats
    stats: FrameStats,
}

impl X11Source {
    /// Connect to `display` (or `$DISPLAY` when `None`) and enumerate monitors.
    pub fn connect(display: Option<&str>, use_shm: bool) -> Result<Self, CaptureError> {
        let display_cstr = display
            .map(CString::new)
            .transpose()
            .map_err(|e| CaptureError::Connect(format!("invalid display string: {}", e)))?;

        let (conn, screen_num) = XCBConnection::connect(display_cstr.as_deref())
            .map_err(|e| CaptureError::Connect(e.to_string()))?;

        let screen = &conn.setup().roots[screen_num];
        let root = screen.root;
        let depth = screen.root_depth;
        let (root_width, root_height) = (screen.width_in_pixels, screen.height_in_pixels);
        let layout = PixelLayout::from_byte_order(u8::from(conn.setup().image_byte_order));
        let (bits_per_pixel, scanline_pad) = pixmap_format(&conn, depth);

        info!(
            "Connected to X display {} (screen {}, {}x{}, depth {}, {} bpp)",
            display.unwrap_or("$DISPLAY"),
            screen_num,
            root_width,
            root_height,
            depth,
            bits_per_pixel
        );

        let targets = match randr_monitors(&conn, root) {
            Ok(targets) if !targets.is_empty() => targets,
            Ok(_) => {
                debug!("RandR reported no active monitors, using the root window");
                vec![root_target(root_width, root_height)]
            }
            Err(e) => {
                debug!("RandR monitor query failed ({}), using the root window", e);
                vec![root_target(root_width, root_height)]
            }
        };

        let mut source = Self {
            conn,
            root,
            depth,
            bits_per_pixel,
            scanline_pad,
            layout,
            targets,
            shm: None,
            stats: FrameStats::default(),
        };

        if use_shm {
            let size = source.bytes_per_line(root_width) * root_height as usize;
            source.shm = source.try_init_shm(size);
        }

        Ok(source)
    }

    fn try_init_shm(&self, size: usize) -> Option<ShmSegment> {
        match shm::query_version(&self.conn).map(|cookie| cookie.reply()) {
            Ok(Ok(_)) => {}
            _ => {
                debug!("XShm not available, using XGetImage");
                return None;
            }
        }

        let seg = self.conn.generate_id().ok()?;

        let id = unsafe { libc::shmget(libc::IPC_PRIVATE, size, libc::IPC_CREAT | 0o600) };
        if id < 0 {
            debug!("shmget failed, using XGetImage");
            return None;
        }

        let addr = unsafe { libc::shmat(id, std::ptr::null(), 0) };
        if addr as isize == -1 {
            unsafe {
                libc::shmctl(id, libc::IPC_RMID, std::ptr::null_mut());
            }
            debug!("shmat failed, using XGetImage");
            return None;
        }

        let attached = shm::attach(&self.conn, seg, id as u32, false)
            .map_err(|e| e.to_string())
            .and_then(|cookie| cookie.check().map_err(|e| e.to_string()));
        if let Err(e) = attached {
            unsafe {
                libc::shmdt(addr);
                libc::shmctl(id, libc::IPC_RMID, std::ptr::null_mut());
            }
            debug!("XShm attach failed ({}), using XGetImage", e);
            return None;
        }

        debug!("Using XShm capture ({} byte segment)", size);
        Some(ShmSegment {
            seg,
            id,
            addr: addr as *mut u8,
            size,
        })
    }

    /// Padded row length for a grab `width` pixels wide
    fn bytes_per_line(&self, width: u16) -> usize {
        padded_row_bytes(width, self.bits_per_pixel, self.scanline_pad)
    }

    /// Fail when the target no longer fits on the root window
    fn check_target(&self, target: &CaptureTarget) -> Result<(), CaptureError> {
        if !self.targets.iter().any(|t| t == target) {
            return Err(CaptureError::TargetUnavailable(target.index));
        }

        let geometry = self.conn.get_geometry(self.root)?.reply()?;
        let right = target.x as i32 + target.width as i32;
        let bottom = target.y as i32 + target.height as i32;
        if target.x < 0
            || target.y < 0
            || right > geometry.width as i32
            || bottom > geometry.height as i32
        {
            return Err(CaptureError::TargetUnavailable(target.index));
        }
        Ok(())
    }
}

impl FrameSource for X11Source {
    fn list_targets(&self) -> Vec<CaptureTarget> {
        self.targets.clone()
    }

    fn capture(&mut self, target: &CaptureTarget) -> Result<RawFrame, CaptureError> {
        let start = Instant::now();

        if self.bits_per_pixel != SUPPORTED_BITS_PER_PIXEL {
            return Err(CaptureError::UnsupportedFormat {
                depth: self.depth,
                bits_per_pixel: self.bits_per_pixel,
            });
        }
        self.check_target(target)?;

        let (width, height) = (target.width, target.height);
        let bytes_per_line = self.bytes_per_line(width);
        let image_size = bytes_per_line * height as usize;
        let format = u8::from(ImageFormat::Z_PIXMAP);

        let data = match &self.shm {
            Some(segment) if image_size <= segment.size => {
                shm::get_image(
                    &self.conn,
                    self.root,
                    target.x,
                    target.y,
                    width,
                    height,
                    u32::MAX,
                    format,
                    segment.seg,
                    0,
                )?
                .reply()?;
                let src =
                    unsafe { std::slice::from_raw_parts(segment.addr as *const u8, image_size) };
                pack_rows(src, width, height, bytes_per_line)?
            }
            _ => {
                if self.shm.is_some() {
                    debug!("Grab larger than XShm segment, using XGetImage");
                }
                let image = self
                    .conn
                    .get_image(
                        ImageFormat::Z_PIXMAP,
                        self.root,
                        target.x,
                        target.y,
                        width,
                        height,
                        u32::MAX,
                    )?
                    .reply()?;
                pack_rows(&image.data, width, height, bytes_per_line)?
            }
        };

        let capture_time_us = start.elapsed().as_micros() as u64;
        self.stats.record_capture(data.len(), capture_time_us);
        debug!(
            "Grabbed {}x{} from monitor {} in {}us (avg {}us over {} frames)",
            width,
            height,
            target.index,
            capture_time_us,
            self.stats.average_capture_time_us(),
            self.stats.total_frames
        );

        Ok(RawFrame {
            width: width as u32,
            height: height as u32,
            data,
            layout: self.layout,
            captured_at: Local::now(),
        })
    }
}

impl Drop for X11Source {
    fn drop(&mut self) {
        if let Some(segment) = self.shm.take() {
            let _ = shm::detach(&self.conn, segment.seg);
            let _ = self.conn.flush();
            unsafe {
                libc::shmdt(segment.addr as *const libc::c_void);
                libc::shmctl(segment.id, libc::IPC_RMID, std::ptr::null_mut());
            }
        }
    }
}

/// Active RandR monitors in server order
fn randr_monitors(conn: &XCBConnection, root: Window) -> Result<Vec<CaptureTarget>, CaptureError> {
    let version = conn.randr_query_version(1, 5)?.reply()?;
    if (version.major_version, version.minor_version) < (1, 5) {
        return Err(CaptureError::Backend(format!(
            "RandR {}.{} has no monitor list",
            version.major_version, version.minor_version
        )));
    }

    let reply = conn.randr_get_monitors(root, true)?.reply()?;
    let mut targets = Vec::with_capacity(reply.monitors.len());
    for (i, monitor) in reply.monitors.iter().enumerate() {
        let label = match conn.get_atom_name(monitor.name)?.reply() {
            Ok(name) => String::from_utf8_lossy(&name.name).into_owned(),
            Err(e) => {
                warn!("Could not resolve monitor name atom {}: {}", monitor.name, e);
                format!("monitor-{}", i + 1)
            }
        };
        targets.push(CaptureTarget {
            index: i + 1,
            label,
            x: monitor.x,
            y: monitor.y,
            width: monitor.width,
            height: monitor.height,
        });
    }
    Ok(targets)
}

fn root_target(width: u16, height: u16) -> CaptureTarget {
    CaptureTarget {
        index: 1,
        label: "root".to_string(),
        x: 0,
        y: 0,
        width,
        height,
    }
}

/// Bits per pixel and scanline pad for `depth`
fn pixmap_format(conn: &XCBConnection, depth: u8) -> (u8, u8) {
    conn.setup()
        .pixmap_formats
        .iter()
        .find(|format| format.depth == depth)
        .map(|format| (format.bits_per_pixel, format.scanline_pad))
        .unwrap_or((SUPPORTED_BITS_PER_PIXEL, SUPPORTED_BITS_PER_PIXEL))
}

fn padded_row_bytes(width: u16, bits_per_pixel: u8, scanline_pad: u8) -> usize {
    let bits = width as usize * bits_per_pixel as usize;
    let pad = (scanline_pad as usize).max(8);
    ((bits + pad - 1) / pad) * pad / 8
}

/// Copy `height` rows of `width * 4` bytes out of a padded image
fn pack_rows(
    src: &[u8],
    width: u16,
    height: u16,
    bytes_per_line: usize,
) -> Result<Vec<u8>, CaptureError> {
    let row = width as usize * BYTES_PER_PIXEL;
    let needed = bytes_per_line * (height as usize).saturating_sub(1) + row;
    if height > 0 && src.len() < needed {
        return Err(CaptureError::ShortImage {
            expected: needed,
            actual: src.len(),
        });
    }

    if bytes_per_line == row {
        return Ok(src[..row * height as usize].to_vec());
    }

    let mut dst = Vec::with_capacity(row * height as usize);
    for y in 0..height as usize {
        let start = y * bytes_per_line;
        dst.extend_from_slice(&src[start..start + row]);
    }
    Ok(dst)
}
